//! `pickflow-core`: shared domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! the error model, record identifiers and the aggregate/event traits the
//! picking workflow is built on.

pub mod aggregate;
pub mod error;
pub mod event;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot};
pub use error::{DomainError, DomainResult};
pub use event::Event;
pub use id::{BatchId, LocationId, MessageId, MoveLineId, PickingId, ProductId, SessionId};
