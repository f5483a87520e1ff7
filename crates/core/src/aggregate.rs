//! State-machine traits shared by picking sessions.

/// Anything with a stable identity and a count of applied events.
pub trait AggregateRoot {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Number of events applied since creation.
    fn version(&self) -> u64;
}

/// Decide/evolve split for a pure state machine.
///
/// `handle` inspects the state and a command and returns the events it
/// implies, or a rejection. `apply` folds one event into the state. Neither
/// touches IO; the caller writes whatever the events imply to the outside.
pub trait Aggregate: AggregateRoot + Clone {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    /// Fold one event into the state; bumps `version()` by one.
    fn apply(&mut self, event: &Self::Event);

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// `(state, command) -> (state', events)` without touching `self`.
    fn step(&self, command: &Self::Command) -> Result<(Self, Vec<Self::Event>), Self::Error> {
        let events = self.handle(command)?;
        let mut next = self.clone();
        for event in &events {
            next.apply(event);
        }
        Ok((next, events))
    }
}
