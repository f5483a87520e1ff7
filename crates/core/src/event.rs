use chrono::{DateTime, Utc};

/// Something that happened during picking, handed to UI collaborators
/// (sound, vibration, list redraw) after a transition.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Dotted name such as `"picking.zone.completed"`.
    fn event_type(&self) -> &'static str;

    /// Payload layout version for this event type.
    fn version(&self) -> u32;

    /// Command time the event was produced at.
    fn occurred_at(&self) -> DateTime<Utc>;
}
