//! Zone-based picking domain.
//!
//! Warehouse topology, batch and operation model, scan verification and the
//! picking state machine. Pure domain logic: no IO, no clock reads inside
//! transitions, no storage.

pub mod batch;
pub mod config;
pub mod location;
pub mod operation;
pub mod scan;
pub mod session;
pub mod view;
pub mod zone;

pub use batch::{Batch, BatchState, parse_scheduled_date};
pub use config::{Feedback, PickingConfig, Tone};
pub use location::Location;
pub use operation::{MoveLine, Operation, Product, all_completed, completion_percentage};
pub use scan::{ScanResult, Verification, VerifyReason, manual_entry_allowed, verify};
pub use session::{
    PendingConfirmation, PickingAction, PickingCommand, PickingEvent, PickingEventKind,
    PickingPhase, PickingSession, QuantityUpdate, Selection, Transition, transition,
};
pub use view::{LocationView, WorkStats, ZoneView, location_views, work_stats, zone_views};
pub use zone::{ZONES, Zone, ZoneId, resolve_zone};
