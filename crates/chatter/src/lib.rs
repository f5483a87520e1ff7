//! Chatter log mining.
//!
//! Turns the free-text narration attached to a batch into structured facts
//! and folds them into per-batch statistics. Parsing is lenient and pure:
//! unrecognised messages are dropped, nothing here returns an error.

pub mod duration;
pub mod fact;
pub mod markup;
pub mod message;
pub mod parser;
pub mod stats;

pub use duration::{duration_minutes, parse_duration};
pub use fact::{ChatterFact, FactKind, MessageMeta};
pub use markup::strip_markup;
pub use message::ChatterMessage;
pub use parser::{ChatterParser, MarkerParser, MarkerSet, parse_chatter};
pub use stats::BatchStats;
