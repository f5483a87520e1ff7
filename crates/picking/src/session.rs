//! Picking state machine.
//!
//! A [`PickingSession`] is the explicit, serializable context of one operator
//! device: the loaded batch, its operations and the current
//! zone/location/operation selection. It evolves only through
//! [`transition`], which is pure: `(session, command) -> (session', events)`.
//!
//! Operations are shared with other operators through the record store.
//! Completion of the batch is therefore always recomputed from the full
//! operation set, never cached.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pickflow_core::{
    Aggregate, AggregateRoot, DomainError, Event, LocationId, MoveLineId, SessionId,
};

use crate::batch::{Batch, BatchState};
use crate::config::{Feedback, PickingConfig};
use crate::location::Location;
use crate::operation::{MoveLine, Operation, all_completed, completion_percentage, same_quantity};
use crate::scan::{ScanResult, Verification, VerifyReason, manual_entry_allowed, verify};
use crate::zone::ZoneId;

/// Where the operator currently is in the workflow (derived, never stored).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickingPhase {
    NoBatchSelected,
    BatchSelected,
    ZoneSelected,
    LocationSelected,
    OperationInProgress,
    OperationComplete,
    ZoneComplete,
    BatchComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Selection {
    pub zone: Option<ZoneId>,
    pub location: Option<LocationId>,
    pub operation: Option<MoveLineId>,
}

/// A condition the operator must explicitly accept or reject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingConfirmation {
    /// The entered quantity exceeds the required quantity.
    OverPick {
        operation_id: MoveLineId,
        quantity: f64,
    },
    /// The entered quantity is lower than what is already recorded.
    Regression {
        operation_id: MoveLineId,
        from: f64,
        to: f64,
    },
    /// A product scan matched an operation outside the selected location.
    CrossLocationCredit {
        operation_id: MoveLineId,
        selected_location: Option<LocationId>,
    },
    /// A product scan matched only operations that are already done.
    AlreadyComplete { operation_id: MoveLineId },
}

impl PendingConfirmation {
    pub fn operation_id(&self) -> MoveLineId {
        match self {
            PendingConfirmation::OverPick { operation_id, .. }
            | PendingConfirmation::Regression { operation_id, .. }
            | PendingConfirmation::CrossLocationCredit { operation_id, .. }
            | PendingConfirmation::AlreadyComplete { operation_id } => *operation_id,
        }
    }
}

/// Input to the state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickingCommand {
    pub action: PickingAction,
    pub occurred_at: DateTime<Utc>,
}

impl PickingCommand {
    pub fn new(action: PickingAction, occurred_at: DateTime<Utc>) -> Self {
        Self {
            action,
            occurred_at,
        }
    }

    pub fn now(action: PickingAction) -> Self {
        Self::new(action, Utc::now())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PickingAction {
    /// Load a batch and the move lines it is made of.
    SelectBatch { batch: Batch, lines: Vec<MoveLine> },
    ClearBatch,
    Configure { config: PickingConfig },
    SelectZone { zone: ZoneId },
    /// Show or hide a collapsed (completed) zone.
    InspectZone { zone: ZoneId },
    SelectLocation { location_id: LocationId },
    SelectOperation { operation_id: MoveLineId },
    Scan { scan: ScanResult },
    /// Set (not add) the done quantity of an operation.
    RegisterQuantity {
        operation_id: MoveLineId,
        quantity: f64,
    },
    ConfirmPending,
    RejectPending,
    /// Merge done quantities read back from the record store (last write wins).
    RefreshOperations { lines: Vec<MoveLine> },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantityUpdate {
    pub operation_id: MoveLineId,
    pub quantity_done: f64,
}

/// Output of the state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickingEvent {
    pub kind: PickingEventKind,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PickingEventKind {
    BatchSelected {
        batch: Batch,
        operations: Vec<Operation>,
    },
    BatchCleared,
    ConfigChanged {
        config: PickingConfig,
    },
    ZoneSelected {
        zone: ZoneId,
    },
    ZoneInspectionToggled {
        zone: ZoneId,
        inspected: bool,
    },
    LocationSelected {
        location_id: LocationId,
    },
    OperationSelected {
        operation_id: MoveLineId,
    },
    ScanVerified {
        operation_id: MoveLineId,
        verification: Verification,
        feedback: Feedback,
    },
    ScanRejected {
        operation_id: Option<MoveLineId>,
        verification: Verification,
        feedback: Feedback,
    },
    LotRecorded {
        operation_id: MoveLineId,
        lot: String,
    },
    EntryRejected {
        operation_id: MoveLineId,
        verification: Verification,
        feedback: Feedback,
    },
    QuantityRegistered {
        operation_id: MoveLineId,
        previous: f64,
        quantity: f64,
    },
    OperationCompleted {
        operation_id: MoveLineId,
        feedback: Feedback,
    },
    OperationReopened {
        operation_id: MoveLineId,
    },
    ZoneCompleted {
        zone: ZoneId,
    },
    BatchCompleted,
    ConfirmationRequested {
        confirmation: PendingConfirmation,
        feedback: Feedback,
    },
    ConfirmationResolved {
        confirmation: PendingConfirmation,
        accepted: bool,
    },
    CrossLocationCredited {
        operation_id: MoveLineId,
        selected_location: Option<LocationId>,
    },
    OperationsRefreshed {
        updates: Vec<QuantityUpdate>,
    },
}

impl Event for PickingEvent {
    fn event_type(&self) -> &'static str {
        match &self.kind {
            PickingEventKind::BatchSelected { .. } => "picking.batch.selected",
            PickingEventKind::BatchCleared => "picking.batch.cleared",
            PickingEventKind::ConfigChanged { .. } => "picking.config.changed",
            PickingEventKind::ZoneSelected { .. } => "picking.zone.selected",
            PickingEventKind::ZoneInspectionToggled { .. } => "picking.zone.inspection_toggled",
            PickingEventKind::LocationSelected { .. } => "picking.location.selected",
            PickingEventKind::OperationSelected { .. } => "picking.operation.selected",
            PickingEventKind::ScanVerified { .. } => "picking.scan.verified",
            PickingEventKind::ScanRejected { .. } => "picking.scan.rejected",
            PickingEventKind::LotRecorded { .. } => "picking.operation.lot_recorded",
            PickingEventKind::EntryRejected { .. } => "picking.entry.rejected",
            PickingEventKind::QuantityRegistered { .. } => "picking.operation.quantity_registered",
            PickingEventKind::OperationCompleted { .. } => "picking.operation.completed",
            PickingEventKind::OperationReopened { .. } => "picking.operation.reopened",
            PickingEventKind::ZoneCompleted { .. } => "picking.zone.completed",
            PickingEventKind::BatchCompleted => "picking.batch.completed",
            PickingEventKind::ConfirmationRequested { .. } => "picking.confirmation.requested",
            PickingEventKind::ConfirmationResolved { .. } => "picking.confirmation.resolved",
            PickingEventKind::CrossLocationCredited { .. } => "picking.operation.cross_location_credited",
            PickingEventKind::OperationsRefreshed { .. } => "picking.operations.refreshed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Aggregate root: one operator's picking session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickingSession {
    id: SessionId,
    version: u64,
    config: PickingConfig,
    batch: Option<Batch>,
    /// Sorted by operation id.
    operations: Vec<Operation>,
    selection: Selection,
    inspected: BTreeSet<ZoneId>,
    /// Zones with nothing left to pick when the batch was selected.
    #[serde(default)]
    complete_at_load: BTreeSet<ZoneId>,
    pending: Option<PendingConfirmation>,
    started_at: Option<DateTime<Utc>>,
}

impl PickingSession {
    pub fn new(config: PickingConfig) -> Self {
        Self::with_id(SessionId::new(), config)
    }

    pub fn with_id(id: SessionId, config: PickingConfig) -> Self {
        Self {
            id,
            version: 0,
            config,
            batch: None,
            operations: Vec::new(),
            selection: Selection::default(),
            inspected: BTreeSet::new(),
            complete_at_load: BTreeSet::new(),
            pending: None,
            started_at: None,
        }
    }

    pub fn config(&self) -> &PickingConfig {
        &self.config
    }

    pub fn batch(&self) -> Option<&Batch> {
        self.batch.as_ref()
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn operation(&self, id: MoveLineId) -> Option<&Operation> {
        self.operations
            .binary_search_by_key(&id, |op| op.id)
            .ok()
            .map(|idx| &self.operations[idx])
    }

    fn operation_mut(&mut self, id: MoveLineId) -> Option<&mut Operation> {
        self.operations
            .binary_search_by_key(&id, |op| op.id)
            .ok()
            .map(|idx| &mut self.operations[idx])
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn selected_operation(&self) -> Option<&Operation> {
        self.selection.operation.and_then(|id| self.operation(id))
    }

    pub fn pending_confirmation(&self) -> Option<&PendingConfirmation> {
        self.pending.as_ref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn is_inspected(&self, zone: ZoneId) -> bool {
        self.inspected.contains(&zone)
    }

    pub fn was_complete_at_load(&self, zone: ZoneId) -> bool {
        self.complete_at_load.contains(&zone)
    }

    /// Recomputed from the full operation set on every call.
    pub fn is_batch_complete(&self) -> bool {
        all_completed(&self.operations)
    }

    pub fn completion_percentage(&self) -> u8 {
        completion_percentage(&self.operations)
    }

    /// Zones that carry at least one operation, in walking order.
    pub fn zones(&self) -> Vec<ZoneId> {
        let zones: BTreeSet<ZoneId> = self.operations.iter().filter_map(|op| op.zone).collect();
        let mut zones: Vec<ZoneId> = zones.into_iter().collect();
        zones.sort_by_key(|z| z.rank());
        zones
    }

    pub fn zone_operations(&self, zone: ZoneId) -> impl Iterator<Item = &Operation> {
        self.operations
            .iter()
            .filter(move |op| op.zone == Some(zone))
    }

    pub fn is_zone_complete(&self, zone: ZoneId) -> bool {
        let mut ops = self.zone_operations(zone).peekable();
        ops.peek().is_some() && ops.all(|op| op.is_completed)
    }

    /// Locations of a zone, ordered by complete name.
    pub fn zone_locations(&self, zone: ZoneId) -> Vec<&Location> {
        let mut seen = BTreeSet::new();
        let mut locations: Vec<&Location> = self
            .zone_operations(zone)
            .filter(|op| seen.insert(op.location.id))
            .map(|op| &op.location)
            .collect();
        locations.sort_by(|a, b| {
            a.complete_name
                .cmp(&b.complete_name)
                .then_with(|| a.id.cmp(&b.id))
        });
        locations
    }

    pub fn location(&self, id: LocationId) -> Option<&Location> {
        self.operations
            .iter()
            .find(|op| op.location.id == id)
            .map(|op| &op.location)
    }

    /// Operations picked from a location, ordered by id.
    pub fn location_operations(&self, id: LocationId) -> Vec<&Operation> {
        self.operations
            .iter()
            .filter(|op| op.location.id == id)
            .collect()
    }

    pub fn is_location_complete(&self, id: LocationId) -> bool {
        let ops = self.location_operations(id);
        !ops.is_empty() && ops.iter().all(|op| op.is_completed)
    }

    /// Operations whose location resolves to no zone.
    pub fn unzoned_operations(&self) -> Vec<&Operation> {
        self.operations.iter().filter(|op| op.zone.is_none()).collect()
    }

    pub fn phase(&self) -> PickingPhase {
        if self.batch.is_none() {
            return PickingPhase::NoBatchSelected;
        }
        if self.is_batch_complete() {
            return PickingPhase::BatchComplete;
        }
        if let Some(zone) = self.selection.zone {
            if self.is_zone_complete(zone) {
                return PickingPhase::ZoneComplete;
            }
        }
        if let Some(op) = self.selected_operation() {
            return if op.is_completed {
                PickingPhase::OperationComplete
            } else {
                PickingPhase::OperationInProgress
            };
        }
        if self.selection.location.is_some() {
            return PickingPhase::LocationSelected;
        }
        if self.selection.zone.is_some() {
            return PickingPhase::ZoneSelected;
        }
        PickingPhase::BatchSelected
    }
}

impl AggregateRoot for PickingSession {
    type Id = SessionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Result of one pure state transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub session: PickingSession,
    pub events: Vec<PickingEvent>,
}

impl Transition {
    /// Verification outcome of the last scan or entry in this transition, if any.
    pub fn verification(&self) -> Option<Verification> {
        self.events.iter().rev().find_map(|e| match &e.kind {
            PickingEventKind::ScanVerified { verification, .. }
            | PickingEventKind::ScanRejected { verification, .. }
            | PickingEventKind::EntryRejected { verification, .. } => Some(*verification),
            PickingEventKind::QuantityRegistered { .. } => {
                Some(Verification::accept(VerifyReason::ManualEntry))
            }
            _ => None,
        })
    }

    /// Done quantities the record store must be told about.
    pub fn quantity_writes(&self) -> Vec<QuantityUpdate> {
        self.events
            .iter()
            .filter_map(|e| match &e.kind {
                PickingEventKind::QuantityRegistered {
                    operation_id,
                    quantity,
                    ..
                } => Some(QuantityUpdate {
                    operation_id: *operation_id,
                    quantity_done: *quantity,
                }),
                _ => None,
            })
            .collect()
    }

    pub fn confirmation_requested(&self) -> Option<&PendingConfirmation> {
        self.events.iter().find_map(|e| match &e.kind {
            PickingEventKind::ConfirmationRequested { confirmation, .. } => Some(confirmation),
            _ => None,
        })
    }
}

/// Apply one command to a session without touching it.
pub fn transition(
    session: &PickingSession,
    command: &PickingCommand,
) -> Result<Transition, DomainError> {
    let (session, events) = session.step(command)?;
    Ok(Transition { session, events })
}

impl Aggregate for PickingSession {
    type Command = PickingCommand;
    type Event = PickingEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match &event.kind {
            PickingEventKind::BatchSelected { batch, operations } => {
                let same_batch = self.batch.as_ref().map(|b| b.id) == Some(batch.id);
                if !same_batch || self.started_at.is_none() {
                    self.started_at = Some(event.occurred_at);
                }
                self.batch = Some(batch.clone());
                self.operations = operations.clone();
                self.operations.sort_by_key(|op| op.id);
                self.selection = Selection::default();
                self.inspected.clear();
                self.complete_at_load = self
                    .zones()
                    .into_iter()
                    .filter(|zone| self.is_zone_complete(*zone))
                    .collect();
                self.pending = None;
            }
            PickingEventKind::BatchCleared => {
                self.batch = None;
                self.operations.clear();
                self.selection = Selection::default();
                self.inspected.clear();
                self.complete_at_load.clear();
                self.pending = None;
                self.started_at = None;
            }
            PickingEventKind::ConfigChanged { config } => {
                self.config = *config;
                for op in self.operations.iter_mut().filter(|op| !op.scanned) {
                    op.needs_verification = config.verification_required;
                }
            }
            PickingEventKind::ZoneSelected { zone } => {
                self.selection = Selection {
                    zone: Some(*zone),
                    location: None,
                    operation: None,
                };
            }
            PickingEventKind::ZoneInspectionToggled { zone, inspected } => {
                if *inspected {
                    self.inspected.insert(*zone);
                } else {
                    self.inspected.remove(zone);
                }
            }
            PickingEventKind::LocationSelected { location_id } => {
                let zone = self.location(*location_id).and_then(Location::zone);
                self.selection = Selection {
                    zone: zone.or(self.selection.zone),
                    location: Some(*location_id),
                    operation: None,
                };
            }
            PickingEventKind::OperationSelected { operation_id } => {
                if let Some(op) = self.operation(*operation_id) {
                    let (zone, location) = (op.zone, op.location.id);
                    self.selection = Selection {
                        zone: zone.or(self.selection.zone),
                        location: Some(location),
                        operation: Some(*operation_id),
                    };
                }
            }
            PickingEventKind::ScanVerified {
                operation_id,
                verification,
                ..
            } => {
                if verification.verifies_operation() {
                    if let Some(op) = self.operation_mut(*operation_id) {
                        op.scanned = true;
                    }
                }
            }
            PickingEventKind::LotRecorded { operation_id, lot } => {
                if let Some(op) = self.operation_mut(*operation_id) {
                    op.lot = Some(lot.clone());
                }
            }
            PickingEventKind::QuantityRegistered {
                operation_id,
                quantity,
                ..
            } => {
                if let Some(op) = self.operation_mut(*operation_id) {
                    op.quantity_done = *quantity;
                    op.is_completed = op.reaches_required(*quantity);
                }
            }
            PickingEventKind::ConfirmationRequested { confirmation, .. } => {
                self.pending = Some(confirmation.clone());
            }
            PickingEventKind::ConfirmationResolved { .. } => {
                self.pending = None;
            }
            PickingEventKind::CrossLocationCredited { operation_id, .. } => {
                if let Some(op) = self.operation_mut(*operation_id) {
                    op.scanned = true;
                }
            }
            PickingEventKind::OperationsRefreshed { updates } => {
                for update in updates {
                    if let Some(op) = self.operation_mut(update.operation_id) {
                        op.quantity_done = update.quantity_done;
                        op.is_completed = op.reaches_required(update.quantity_done);
                    }
                }
            }
            PickingEventKind::ScanRejected { .. }
            | PickingEventKind::EntryRejected { .. }
            | PickingEventKind::OperationCompleted { .. }
            | PickingEventKind::OperationReopened { .. }
            | PickingEventKind::ZoneCompleted { .. }
            | PickingEventKind::BatchCompleted => {}
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let at = command.occurred_at;
        match &command.action {
            PickingAction::SelectBatch { batch, lines } => self.handle_select_batch(at, batch, lines),
            PickingAction::ClearBatch => self.handle_clear(at),
            PickingAction::Configure { config } => self.handle_configure(at, config),
            PickingAction::SelectZone { zone } => self.handle_select_zone(at, *zone),
            PickingAction::InspectZone { zone } => self.handle_inspect_zone(at, *zone),
            PickingAction::SelectLocation { location_id } => {
                self.handle_select_location(at, *location_id)
            }
            PickingAction::SelectOperation { operation_id } => {
                self.handle_select_operation(at, *operation_id)
            }
            PickingAction::Scan { scan } => self.handle_scan(at, scan),
            PickingAction::RegisterQuantity {
                operation_id,
                quantity,
            } => self.handle_register(at, *operation_id, *quantity),
            PickingAction::ConfirmPending => self.handle_confirm(at),
            PickingAction::RejectPending => self.handle_reject(at),
            PickingAction::RefreshOperations { lines } => self.handle_refresh(at, lines),
        }
    }
}

/// Collects events while applying them to a scratch copy, so later decisions
/// in the same command see earlier effects.
struct Emitter {
    scratch: PickingSession,
    events: Vec<PickingEvent>,
    at: DateTime<Utc>,
}

impl Emitter {
    fn new(session: &PickingSession, at: DateTime<Utc>) -> Self {
        Self {
            scratch: session.clone(),
            events: Vec::new(),
            at,
        }
    }

    fn state(&self) -> &PickingSession {
        &self.scratch
    }

    fn feedback(&self, success: bool) -> Feedback {
        self.scratch.config.feedback(success)
    }

    fn emit(&mut self, kind: PickingEventKind) {
        let event = PickingEvent {
            kind,
            occurred_at: self.at,
        };
        self.scratch.apply(&event);
        self.events.push(event);
    }

    /// Move the selection onto an operation, announcing zone and location changes.
    fn navigate_to(&mut self, operation_id: MoveLineId) {
        let Some((zone, location)) = self
            .scratch
            .operation(operation_id)
            .map(|op| (op.zone, op.location.id))
        else {
            return;
        };

        let selection = self.scratch.selection;
        if let Some(zone) = zone {
            if selection.zone != Some(zone) {
                self.emit(PickingEventKind::ZoneSelected { zone });
            }
        }
        if self.scratch.selection.location != Some(location) {
            self.emit(PickingEventKind::LocationSelected {
                location_id: location,
            });
        }
        if self.scratch.selection.operation != Some(operation_id) {
            self.emit(PickingEventKind::OperationSelected { operation_id });
        }
    }

    /// Set a done quantity and run the completion and auto-advance policy.
    fn register_quantity(&mut self, operation_id: MoveLineId, quantity: f64) {
        let Some(before) = self.scratch.operation(operation_id).cloned() else {
            return;
        };
        self.emit(PickingEventKind::QuantityRegistered {
            operation_id,
            previous: before.quantity_done,
            quantity,
        });
        let Some(after) = self.scratch.operation(operation_id).cloned() else {
            return;
        };

        if before.is_completed && !after.is_completed {
            self.emit(PickingEventKind::OperationReopened { operation_id });
            return;
        }
        if before.is_completed || !after.is_completed {
            return;
        }

        let feedback = self.feedback(true);
        self.emit(PickingEventKind::OperationCompleted {
            operation_id,
            feedback,
        });
        if let Some(zone) = after.zone {
            if self.scratch.is_zone_complete(zone) {
                self.emit(PickingEventKind::ZoneCompleted { zone });
            }
        }
        if self.scratch.is_batch_complete() {
            self.emit(PickingEventKind::BatchCompleted);
            return;
        }
        if self.scratch.config.auto_next {
            self.advance_from(&after);
        }
    }

    fn advance_from(&mut self, done: &Operation) {
        if let Some(id) = next_pending(&self.scratch, done) {
            self.navigate_to(id);
        }
    }

    fn finish(self) -> Vec<PickingEvent> {
        self.events
    }
}

/// Next pending operation after `done`: same location, else next location of
/// the zone, else next zone in walking order.
fn next_pending(state: &PickingSession, done: &Operation) -> Option<MoveLineId> {
    if let Some(id) = first_pending_at(state, done.location.id) {
        return Some(id);
    }

    let zone = done.zone?;
    let locations: Vec<LocationId> = state.zone_locations(zone).iter().map(|l| l.id).collect();
    if let Some(location) = next_after(&locations, done.location.id, |l| {
        !state.is_location_complete(*l)
    }) {
        return first_pending_at(state, location);
    }

    let zones = state.zones();
    let next_zone = next_after(&zones, zone, |z| !state.is_zone_complete(*z))?;
    state
        .zone_locations(next_zone)
        .into_iter()
        .find(|l| !state.is_location_complete(l.id))
        .and_then(|l| first_pending_at(state, l.id))
}

fn first_pending_at(session: &PickingSession, location: LocationId) -> Option<MoveLineId> {
    session
        .location_operations(location)
        .into_iter()
        .find(|op| op.is_pending())
        .map(|op| op.id)
}

/// First item after `current` matching `pred`, wrapping around; `current` itself is skipped.
fn next_after<T: Copy + PartialEq>(
    ordered: &[T],
    current: T,
    pred: impl Fn(&T) -> bool,
) -> Option<T> {
    let start = ordered
        .iter()
        .position(|item| *item == current)
        .map(|idx| idx + 1)
        .unwrap_or(0);
    ordered[start..]
        .iter()
        .chain(ordered[..start].iter())
        .filter(|item| **item != current)
        .find(|item| pred(*item))
        .copied()
}

impl PickingSession {
    fn ensure_batch(&self) -> Result<(), DomainError> {
        if self.batch.is_none() {
            return Err(DomainError::validation("no batch selected"));
        }
        Ok(())
    }

    fn ensure_no_pending(&self) -> Result<(), DomainError> {
        if let Some(pending) = &self.pending {
            return Err(DomainError::conflict(format!(
                "confirmation pending for operation {}",
                pending.operation_id()
            )));
        }
        Ok(())
    }

    fn require_operation(&self, id: MoveLineId) -> Result<&Operation, DomainError> {
        self.operation(id)
            .ok_or_else(|| DomainError::not_found(format!("operation {id}")))
    }

    fn handle_select_batch(
        &self,
        at: DateTime<Utc>,
        batch: &Batch,
        lines: &[MoveLine],
    ) -> Result<Vec<PickingEvent>, DomainError> {
        self.ensure_no_pending()?;
        if batch.state == BatchState::Cancel {
            return Err(DomainError::validation(format!(
                "batch {} is cancelled",
                batch.id
            )));
        }

        let mut seen = BTreeSet::new();
        for line in lines {
            if !seen.insert(line.id) {
                return Err(DomainError::validation(format!(
                    "duplicate move line {} in batch {}",
                    line.id, batch.id
                )));
            }
        }

        let same_batch = self.batch.as_ref().map(|b| b.id) == Some(batch.id);
        let mut operations = lines
            .iter()
            .cloned()
            .map(|line| Operation::from_move_line(line, self.config.verification_required))
            .collect::<Result<Vec<_>, _>>()?;
        if same_batch {
            // Reloading keeps what this session already verified.
            for op in &mut operations {
                op.scanned = self.operation(op.id).is_some_and(|prev| prev.scanned);
            }
        }

        let mut em = Emitter::new(self, at);
        em.emit(PickingEventKind::BatchSelected {
            batch: batch.clone(),
            operations,
        });
        Ok(em.finish())
    }

    fn handle_clear(&self, at: DateTime<Utc>) -> Result<Vec<PickingEvent>, DomainError> {
        self.ensure_no_pending()?;
        if self.batch.is_none() {
            return Ok(Vec::new());
        }
        let mut em = Emitter::new(self, at);
        em.emit(PickingEventKind::BatchCleared);
        Ok(em.finish())
    }

    fn handle_configure(
        &self,
        at: DateTime<Utc>,
        config: &PickingConfig,
    ) -> Result<Vec<PickingEvent>, DomainError> {
        if *config == self.config {
            return Ok(Vec::new());
        }
        let mut em = Emitter::new(self, at);
        em.emit(PickingEventKind::ConfigChanged { config: *config });
        Ok(em.finish())
    }

    fn handle_select_zone(
        &self,
        at: DateTime<Utc>,
        zone: ZoneId,
    ) -> Result<Vec<PickingEvent>, DomainError> {
        self.ensure_batch()?;
        if self.zone_operations(zone).next().is_none() {
            return Err(DomainError::not_found(format!(
                "zone {zone} has no operations in this batch"
            )));
        }
        let current = self.selection;
        if current.zone == Some(zone) && current.location.is_none() && current.operation.is_none()
        {
            return Ok(Vec::new());
        }
        let mut em = Emitter::new(self, at);
        em.emit(PickingEventKind::ZoneSelected { zone });
        Ok(em.finish())
    }

    fn handle_inspect_zone(
        &self,
        at: DateTime<Utc>,
        zone: ZoneId,
    ) -> Result<Vec<PickingEvent>, DomainError> {
        self.ensure_batch()?;
        if self.zone_operations(zone).next().is_none() {
            return Err(DomainError::not_found(format!(
                "zone {zone} has no operations in this batch"
            )));
        }
        let mut em = Emitter::new(self, at);
        em.emit(PickingEventKind::ZoneInspectionToggled {
            zone,
            inspected: !self.is_inspected(zone),
        });
        Ok(em.finish())
    }

    fn handle_select_location(
        &self,
        at: DateTime<Utc>,
        location_id: LocationId,
    ) -> Result<Vec<PickingEvent>, DomainError> {
        self.ensure_batch()?;
        let location = self
            .location(location_id)
            .ok_or_else(|| DomainError::not_found(format!("location {location_id}")))?;
        if self.selection.location == Some(location_id) && self.selection.operation.is_none() {
            return Ok(Vec::new());
        }

        let mut em = Emitter::new(self, at);
        if let Some(zone) = location.zone() {
            if self.selection.zone != Some(zone) {
                em.emit(PickingEventKind::ZoneSelected { zone });
            }
        }
        em.emit(PickingEventKind::LocationSelected { location_id });
        Ok(em.finish())
    }

    fn handle_select_operation(
        &self,
        at: DateTime<Utc>,
        operation_id: MoveLineId,
    ) -> Result<Vec<PickingEvent>, DomainError> {
        self.ensure_batch()?;
        self.require_operation(operation_id)?;
        let mut em = Emitter::new(self, at);
        em.navigate_to(operation_id);
        Ok(em.finish())
    }

    fn handle_scan(
        &self,
        at: DateTime<Utc>,
        scan: &ScanResult,
    ) -> Result<Vec<PickingEvent>, DomainError> {
        self.ensure_batch()?;
        self.ensure_no_pending()?;

        let mut em = Emitter::new(self, at);
        if scan.code().trim().is_empty() {
            let feedback = em.feedback(false);
            em.emit(PickingEventKind::ScanRejected {
                operation_id: self.selection.operation,
                verification: Verification::reject(VerifyReason::EmptyCode),
                feedback,
            });
            return Ok(em.finish());
        }

        match scan {
            ScanResult::Product(code) => self.scan_product(&mut em, scan, code),
            ScanResult::Location(code) => self.scan_location(&mut em, scan, code),
            ScanResult::Lot(code) => self.scan_lot(&mut em, scan, code)?,
        }
        Ok(em.finish())
    }

    fn in_scope(&self, op: &Operation) -> bool {
        match (self.selection.location, self.selection.zone) {
            (Some(location), _) => op.location.id == location,
            (None, Some(zone)) => op.zone == Some(zone),
            (None, None) => true,
        }
    }

    fn scan_product(&self, em: &mut Emitter, scan: &ScanResult, code: &str) {
        if let Some(op) = self.selected_operation().filter(|op| op.is_pending()) {
            let verification = verify(scan, op);
            if verification.accepted {
                let feedback = em.feedback(true);
                em.emit(PickingEventKind::ScanVerified {
                    operation_id: op.id,
                    verification,
                    feedback,
                });
                return;
            }
        }

        let pending_match = |op: &&Operation| op.is_pending() && op.product.matches_code(code);

        if let Some(op) = self
            .operations
            .iter()
            .filter(|op| self.in_scope(op))
            .find(pending_match)
        {
            let id = op.id;
            em.navigate_to(id);
            let feedback = em.feedback(true);
            em.emit(PickingEventKind::ScanVerified {
                operation_id: id,
                verification: Verification::accept(VerifyReason::ProductMatched),
                feedback,
            });
            return;
        }

        if let Some(op) = self.operations.iter().find(pending_match) {
            // Stock found elsewhere: only an explicit confirmation may credit it.
            let feedback = em.feedback(false);
            em.emit(PickingEventKind::ScanRejected {
                operation_id: Some(op.id),
                verification: Verification::reject(VerifyReason::ProductMismatch),
                feedback,
            });
            em.emit(PickingEventKind::ConfirmationRequested {
                confirmation: PendingConfirmation::CrossLocationCredit {
                    operation_id: op.id,
                    selected_location: self.selection.location,
                },
                feedback,
            });
            return;
        }

        let product_match = |op: &&Operation| op.product.matches_code(code);
        let done = self
            .operations
            .iter()
            .filter(|op| self.in_scope(op))
            .find(product_match)
            .or_else(|| self.operations.iter().find(product_match));
        if let Some(op) = done {
            // Reopening finished work goes through a confirmation.
            let feedback = em.feedback(false);
            em.emit(PickingEventKind::ScanRejected {
                operation_id: Some(op.id),
                verification: Verification::reject(VerifyReason::AlreadyComplete),
                feedback,
            });
            em.emit(PickingEventKind::ConfirmationRequested {
                confirmation: PendingConfirmation::AlreadyComplete {
                    operation_id: op.id,
                },
                feedback,
            });
            return;
        }

        let feedback = em.feedback(false);
        em.emit(PickingEventKind::ScanRejected {
            operation_id: self.selection.operation,
            verification: Verification::reject(VerifyReason::ProductMismatch),
            feedback,
        });
    }

    fn scan_location(&self, em: &mut Emitter, scan: &ScanResult, code: &str) {
        if let Some(op) = self.selected_operation() {
            let verification = verify(scan, op);
            if verification.accepted {
                let feedback = em.feedback(true);
                em.emit(PickingEventKind::ScanVerified {
                    operation_id: op.id,
                    verification,
                    feedback,
                });
                return;
            }
        }

        if let Some(op) = self
            .operations
            .iter()
            .find(|op| op.is_pending() && op.location.matches_code(code))
        {
            let id = op.id;
            em.navigate_to(id);
            let feedback = em.feedback(true);
            em.emit(PickingEventKind::ScanVerified {
                operation_id: id,
                verification: Verification::accept(VerifyReason::LocationMatched),
                feedback,
            });
            return;
        }

        let feedback = em.feedback(false);
        em.emit(PickingEventKind::ScanRejected {
            operation_id: self.selection.operation,
            verification: Verification::reject(VerifyReason::LocationMismatch),
            feedback,
        });
    }

    fn scan_lot(&self, em: &mut Emitter, scan: &ScanResult, code: &str) -> Result<(), DomainError> {
        let op = self
            .selected_operation()
            .ok_or_else(|| DomainError::validation("lot scan requires a selected operation"))?;
        let verification = verify(scan, op);
        let feedback = em.feedback(verification.accepted);

        if !verification.accepted {
            em.emit(PickingEventKind::ScanRejected {
                operation_id: Some(op.id),
                verification,
                feedback,
            });
            return Ok(());
        }

        em.emit(PickingEventKind::ScanVerified {
            operation_id: op.id,
            verification,
            feedback,
        });
        if verification.reason == VerifyReason::LotRecorded {
            em.emit(PickingEventKind::LotRecorded {
                operation_id: op.id,
                lot: code.trim().to_string(),
            });
        }
        Ok(())
    }

    fn handle_register(
        &self,
        at: DateTime<Utc>,
        operation_id: MoveLineId,
        quantity: f64,
    ) -> Result<Vec<PickingEvent>, DomainError> {
        self.ensure_batch()?;
        self.ensure_no_pending()?;
        if !quantity.is_finite() || quantity < 0.0 {
            return Err(DomainError::validation(format!(
                "quantity must be a non-negative number, got {quantity}"
            )));
        }
        let op = self.require_operation(operation_id)?;

        // A set, not an increment: re-sending the same value is a no-op.
        if same_quantity(op.quantity_done, quantity) {
            return Ok(Vec::new());
        }

        let mut em = Emitter::new(self, at);

        if op.reaches_required(quantity) {
            let verdict = manual_entry_allowed(op, self.config.verification_required);
            if !verdict.accepted {
                let feedback = em.feedback(false);
                em.emit(PickingEventKind::EntryRejected {
                    operation_id,
                    verification: verdict,
                    feedback,
                });
                return Ok(em.finish());
            }
        }

        let confirmation = if op.exceeds_required(quantity) {
            Some(PendingConfirmation::OverPick {
                operation_id,
                quantity,
            })
        } else if quantity < op.quantity_done {
            Some(PendingConfirmation::Regression {
                operation_id,
                from: op.quantity_done,
                to: quantity,
            })
        } else {
            None
        };

        match confirmation {
            Some(confirmation) => {
                let feedback = em.feedback(false);
                em.emit(PickingEventKind::ConfirmationRequested {
                    confirmation,
                    feedback,
                });
            }
            None => em.register_quantity(operation_id, quantity),
        }
        Ok(em.finish())
    }

    fn handle_confirm(&self, at: DateTime<Utc>) -> Result<Vec<PickingEvent>, DomainError> {
        let pending = self
            .pending
            .clone()
            .ok_or_else(|| DomainError::conflict("no confirmation pending"))?;

        let mut em = Emitter::new(self, at);
        em.emit(PickingEventKind::ConfirmationResolved {
            confirmation: pending.clone(),
            accepted: true,
        });

        match pending {
            PendingConfirmation::OverPick {
                operation_id,
                quantity,
            }
            | PendingConfirmation::Regression {
                operation_id,
                to: quantity,
                ..
            } => em.register_quantity(operation_id, quantity),
            PendingConfirmation::CrossLocationCredit {
                operation_id,
                selected_location,
            } => {
                em.emit(PickingEventKind::CrossLocationCredited {
                    operation_id,
                    selected_location,
                });
                em.navigate_to(operation_id);
            }
            PendingConfirmation::AlreadyComplete { operation_id } => {
                em.navigate_to(operation_id);
            }
        }
        Ok(em.finish())
    }

    fn handle_reject(&self, at: DateTime<Utc>) -> Result<Vec<PickingEvent>, DomainError> {
        let pending = self
            .pending
            .clone()
            .ok_or_else(|| DomainError::conflict("no confirmation pending"))?;
        let mut em = Emitter::new(self, at);
        em.emit(PickingEventKind::ConfirmationResolved {
            confirmation: pending,
            accepted: false,
        });
        Ok(em.finish())
    }

    fn handle_refresh(
        &self,
        at: DateTime<Utc>,
        lines: &[MoveLine],
    ) -> Result<Vec<PickingEvent>, DomainError> {
        self.ensure_batch()?;
        let updates: Vec<QuantityUpdate> = lines
            .iter()
            .filter_map(|line| {
                let op = self.operation(line.id)?;
                (!same_quantity(op.quantity_done, line.quantity_done)).then_some(QuantityUpdate {
                    operation_id: line.id,
                    quantity_done: line.quantity_done,
                })
            })
            .collect();
        if updates.is_empty() {
            return Ok(Vec::new());
        }
        let mut em = Emitter::new(self, at);
        em.emit(PickingEventKind::OperationsRefreshed { updates });
        Ok(em.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Product;
    use pickflow_core::{BatchId, ProductId};

    fn test_time() -> DateTime<Utc> {
        DateTime::from_timestamp(1_714_550_400, 0).unwrap()
    }

    fn line(id: u64, location: (u64, &str), qty: f64) -> MoveLine {
        MoveLine {
            id: MoveLineId::new(id),
            picking_id: None,
            product: Product::new(ProductId::new(100 + id), format!("Product {id}"))
                .with_barcode(format!("EAN{id}")),
            location: Location::new(LocationId::new(location.0), location.1)
                .with_barcode(format!("LOC{}", location.0)),
            location_dest: None,
            lot: None,
            expiry: None,
            package: None,
            quantity: qty,
            quantity_done: 0.0,
        }
    }

    /// Two zones, two operations each; the dry operations sit in two locations.
    fn batch_lines() -> Vec<MoveLine> {
        vec![
            line(1, (10, "WH/Dry/A-01"), 2.0),
            line(2, (11, "WH/Dry/A-02"), 1.0),
            line(3, (20, "WH/Frozen/F-01"), 3.0),
            line(4, (20, "WH/Frozen/F-01"), 1.0),
        ]
    }

    fn cmd(action: PickingAction) -> PickingCommand {
        PickingCommand::new(action, test_time())
    }

    fn run(session: &PickingSession, action: PickingAction) -> Transition {
        transition(session, &cmd(action)).unwrap()
    }

    fn loaded(config: PickingConfig) -> PickingSession {
        let batch = Batch::new(BatchId::new(7), "BATCH/0007", BatchState::InProgress);
        run(
            &PickingSession::new(config),
            PickingAction::SelectBatch {
                batch,
                lines: batch_lines(),
            },
        )
        .session
    }

    fn select_op(session: &PickingSession, id: u64) -> PickingSession {
        run(
            session,
            PickingAction::SelectOperation {
                operation_id: MoveLineId::new(id),
            },
        )
        .session
    }

    fn register(session: &PickingSession, id: u64, quantity: f64) -> Transition {
        run(
            session,
            PickingAction::RegisterQuantity {
                operation_id: MoveLineId::new(id),
                quantity,
            },
        )
    }

    fn scan(session: &PickingSession, scan: ScanResult) -> Transition {
        run(session, PickingAction::Scan { scan })
    }

    fn kinds(t: &Transition) -> Vec<&'static str> {
        t.events.iter().map(|e| e.event_type()).collect()
    }

    #[test]
    fn selecting_a_batch_groups_operations_by_zone() {
        let session = loaded(PickingConfig::default());
        assert_eq!(session.phase(), PickingPhase::BatchSelected);
        assert_eq!(session.zones(), vec![ZoneId::Dry, ZoneId::Frozen]);
        assert_eq!(session.zone_operations(ZoneId::Frozen).count(), 2);
        assert_eq!(session.zone_locations(ZoneId::Dry).len(), 2);
        assert!(session.started_at().is_some());
        assert_eq!(session.version(), 1);
    }

    #[test]
    fn selection_walks_through_phases() {
        let session = loaded(PickingConfig::default());
        let zone = run(&session, PickingAction::SelectZone { zone: ZoneId::Dry }).session;
        assert_eq!(zone.phase(), PickingPhase::ZoneSelected);

        let location = run(
            &zone,
            PickingAction::SelectLocation {
                location_id: LocationId::new(10),
            },
        )
        .session;
        assert_eq!(location.phase(), PickingPhase::LocationSelected);

        let op = select_op(&location, 1);
        assert_eq!(op.phase(), PickingPhase::OperationInProgress);
        assert_eq!(op.selection().zone, Some(ZoneId::Dry));
    }

    #[test]
    fn selecting_unknown_records_fails_without_mutation() {
        let session = loaded(PickingConfig::default());
        let err = transition(
            &session,
            &cmd(PickingAction::SelectZone {
                zone: ZoneId::Refrigerated,
            }),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        let err = transition(
            &PickingSession::new(PickingConfig::default()),
            &cmd(PickingAction::SelectZone { zone: ZoneId::Dry }),
        )
        .unwrap_err();
        assert_eq!(err, DomainError::validation("no batch selected"));
    }

    #[test]
    fn cancelled_batch_is_rejected() {
        let batch = Batch::new(BatchId::new(7), "BATCH/0007", BatchState::Cancel);
        let err = transition(
            &PickingSession::new(PickingConfig::default()),
            &cmd(PickingAction::SelectBatch {
                batch,
                lines: batch_lines(),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("cancelled")));
    }

    #[test]
    fn done_batch_loads_for_review() {
        let batch = Batch::new(BatchId::new(7), "BATCH/0007", BatchState::Done);
        let lines = batch_lines()
            .into_iter()
            .map(|mut line| {
                line.quantity_done = line.quantity;
                line
            })
            .collect();
        let session = run(
            &PickingSession::new(PickingConfig::default()),
            PickingAction::SelectBatch { batch, lines },
        )
        .session;
        assert_eq!(session.phase(), PickingPhase::BatchComplete);
        assert!(session.was_complete_at_load(ZoneId::Dry));
        assert!(session.was_complete_at_load(ZoneId::Frozen));
    }

    #[test]
    fn manual_entry_needs_a_scan_when_verification_is_required() {
        let session = select_op(
            &loaded(PickingConfig::default().with_verification_required(true)),
            1,
        );

        let rejected = register(&session, 1, 2.0);
        assert_eq!(
            rejected.verification(),
            Some(Verification::reject(VerifyReason::ScanRequired))
        );
        assert_eq!(kinds(&rejected), vec!["picking.entry.rejected"]);
        assert_eq!(rejected.session.operation(MoveLineId::new(1)).unwrap().quantity_done, 0.0);
        assert!(rejected.quantity_writes().is_empty());

        let scanned = scan(&rejected.session, ScanResult::Product("EAN1".into()));
        assert_eq!(
            scanned.verification(),
            Some(Verification::accept(VerifyReason::ProductMatched))
        );
        assert!(scanned.session.operation(MoveLineId::new(1)).unwrap().scanned);

        let done = register(&scanned.session, 1, 2.0);
        assert!(done.verification().unwrap().accepted);
        assert_eq!(
            done.quantity_writes(),
            vec![QuantityUpdate {
                operation_id: MoveLineId::new(1),
                quantity_done: 2.0
            }]
        );
        // Same zone, next location.
        assert_eq!(done.session.selection().operation, Some(MoveLineId::new(2)));
        assert_eq!(done.session.selection().zone, Some(ZoneId::Dry));
        assert_eq!(done.session.phase(), PickingPhase::OperationInProgress);
    }

    #[test]
    fn partial_manual_entry_is_allowed_without_scan() {
        let session = select_op(
            &loaded(PickingConfig::default().with_verification_required(true)),
            3,
        );
        let t = register(&session, 3, 1.0);
        assert_eq!(kinds(&t), vec!["picking.operation.quantity_registered"]);
        assert!(t.session.operation(MoveLineId::new(3)).unwrap().is_pending());
    }

    #[test]
    fn registering_the_same_quantity_twice_is_a_no_op() {
        let session = select_op(&loaded(PickingConfig::default()), 3);
        let first = register(&session, 3, 3.0);
        assert!(first.session.operation(MoveLineId::new(3)).unwrap().is_completed);

        let second = register(&first.session, 3, 3.0);
        assert!(second.events.is_empty());
        assert_eq!(second.session, first.session);
    }

    #[test]
    fn completion_advances_within_location_then_zone_then_next_zone() {
        let session = select_op(&loaded(PickingConfig::default()), 3);

        let t = register(&session, 3, 3.0);
        assert_eq!(t.session.selection().operation, Some(MoveLineId::new(4)));

        let t = register(&t.session, 4, 1.0);
        assert!(kinds(&t).contains(&"picking.zone.completed"));
        // Frozen done: wraps to the first pending dry location.
        assert_eq!(t.session.selection().zone, Some(ZoneId::Dry));
        assert_eq!(t.session.selection().operation, Some(MoveLineId::new(1)));
    }

    #[test]
    fn auto_next_disabled_keeps_completed_operation_selected() {
        let session = select_op(&loaded(PickingConfig::default().with_auto_next(false)), 1);
        let t = register(&session, 1, 2.0);
        assert_eq!(t.session.selection().operation, Some(MoveLineId::new(1)));
        assert_eq!(t.session.phase(), PickingPhase::OperationComplete);
    }

    #[test]
    fn finishing_every_operation_completes_the_batch() {
        let mut session = loaded(PickingConfig::default());
        for (id, qty) in [(1, 2.0), (2, 1.0), (3, 3.0), (4, 1.0)] {
            session = register(&session, id, qty).session;
        }
        assert!(session.is_batch_complete());
        assert_eq!(session.phase(), PickingPhase::BatchComplete);
        assert_eq!(session.completion_percentage(), 100);
    }

    #[test]
    fn last_operation_emits_batch_completed() {
        let mut session = loaded(PickingConfig::default());
        for (id, qty) in [(1, 2.0), (2, 1.0), (3, 3.0)] {
            session = register(&session, id, qty).session;
        }
        let t = register(&session, 4, 1.0);
        assert_eq!(
            kinds(&t),
            vec![
                "picking.operation.quantity_registered",
                "picking.operation.completed",
                "picking.zone.completed",
                "picking.batch.completed",
            ]
        );
    }

    #[test]
    fn over_pick_requires_confirmation() {
        let session = select_op(&loaded(PickingConfig::default()), 2);
        let t = register(&session, 2, 5.0);
        assert_eq!(
            t.confirmation_requested(),
            Some(&PendingConfirmation::OverPick {
                operation_id: MoveLineId::new(2),
                quantity: 5.0
            })
        );
        assert_eq!(t.session.operation(MoveLineId::new(2)).unwrap().quantity_done, 0.0);

        // Nothing else goes through while the prompt is open.
        let err = transition(
            &t.session,
            &cmd(PickingAction::RegisterQuantity {
                operation_id: MoveLineId::new(1),
                quantity: 1.0,
            }),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let rejected = run(&t.session, PickingAction::RejectPending).session;
        assert!(rejected.pending_confirmation().is_none());
        assert_eq!(rejected.operation(MoveLineId::new(2)).unwrap().quantity_done, 0.0);

        let confirmed = run(&t.session, PickingAction::ConfirmPending);
        let op = confirmed.session.operation(MoveLineId::new(2)).unwrap();
        assert_eq!(op.quantity_done, 5.0);
        assert!(op.is_completed);
        assert_eq!(confirmed.quantity_writes().len(), 1);
    }

    #[test]
    fn lowering_a_completed_quantity_requires_confirmation() {
        let session = register(&select_op(&loaded(PickingConfig::default()), 1), 1, 2.0).session;
        let t = register(&session, 1, 1.0);
        assert!(matches!(
            t.confirmation_requested(),
            Some(PendingConfirmation::Regression { .. })
        ));

        let confirmed = run(&t.session, PickingAction::ConfirmPending);
        assert!(kinds(&confirmed).contains(&"picking.operation.reopened"));
        assert!(confirmed.session.operation(MoveLineId::new(1)).unwrap().is_pending());
    }

    #[test]
    fn confirming_without_prompt_is_a_conflict() {
        let err = transition(&loaded(PickingConfig::default()), &cmd(PickingAction::ConfirmPending))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn product_from_another_location_is_a_confirmable_mismatch() {
        let session = run(
            &loaded(PickingConfig::default().with_verification_required(true)),
            PickingAction::SelectLocation {
                location_id: LocationId::new(10),
            },
        )
        .session;

        let t = scan(&session, ScanResult::Product("EAN3".into()));
        assert_eq!(
            t.verification(),
            Some(Verification::reject(VerifyReason::ProductMismatch))
        );
        assert_eq!(
            t.confirmation_requested(),
            Some(&PendingConfirmation::CrossLocationCredit {
                operation_id: MoveLineId::new(3),
                selected_location: Some(LocationId::new(10)),
            })
        );
        assert!(!t.session.operation(MoveLineId::new(3)).unwrap().scanned);

        let confirmed = run(&t.session, PickingAction::ConfirmPending).session;
        assert!(confirmed.operation(MoveLineId::new(3)).unwrap().scanned);
        assert_eq!(confirmed.selection().operation, Some(MoveLineId::new(3)));
        assert_eq!(confirmed.selection().zone, Some(ZoneId::Frozen));

        let rejected = run(&t.session, PickingAction::RejectPending).session;
        assert!(!rejected.operation(MoveLineId::new(3)).unwrap().scanned);
        assert_eq!(rejected.selection().location, Some(LocationId::new(10)));
    }

    #[test]
    fn scanning_finished_work_asks_before_reopening_it() {
        let session = register(&loaded(PickingConfig::default()), 2, 1.0).session;
        assert!(session.operation(MoveLineId::new(2)).unwrap().is_completed);
        assert_eq!(session.selection().operation, Some(MoveLineId::new(1)));

        let t = scan(&session, ScanResult::Product("EAN2".into()));
        assert_eq!(
            t.verification(),
            Some(Verification::reject(VerifyReason::AlreadyComplete))
        );
        assert_eq!(
            t.confirmation_requested(),
            Some(&PendingConfirmation::AlreadyComplete {
                operation_id: MoveLineId::new(2),
            })
        );
        assert!(t.quantity_writes().is_empty());

        let rejected = run(&t.session, PickingAction::RejectPending).session;
        assert!(rejected.pending_confirmation().is_none());
        assert_eq!(rejected.selection().operation, Some(MoveLineId::new(1)));

        let confirmed = run(&t.session, PickingAction::ConfirmPending).session;
        assert!(confirmed.pending_confirmation().is_none());
        assert_eq!(confirmed.selection().operation, Some(MoveLineId::new(2)));
        assert_eq!(confirmed.selection().location, Some(LocationId::new(11)));
        assert_eq!(confirmed.phase(), PickingPhase::OperationComplete);
        assert_eq!(confirmed.operation(MoveLineId::new(2)).unwrap().quantity_done, 1.0);
    }

    #[test]
    fn product_scan_inside_location_selects_matching_operation() {
        let session = run(
            &loaded(PickingConfig::default()),
            PickingAction::SelectLocation {
                location_id: LocationId::new(20),
            },
        )
        .session;
        let t = scan(&session, ScanResult::Product("EAN4".into()));
        assert_eq!(t.session.selection().operation, Some(MoveLineId::new(4)));
        assert!(t.session.operation(MoveLineId::new(4)).unwrap().scanned);
    }

    #[test]
    fn unknown_product_is_rejected() {
        let session = select_op(&loaded(PickingConfig::default()), 1);
        let t = scan(&session, ScanResult::Product("NOPE".into()));
        assert_eq!(
            t.verification(),
            Some(Verification::reject(VerifyReason::ProductMismatch))
        );
        assert!(t.session.pending_confirmation().is_none());
    }

    #[test]
    fn location_scan_navigates_and_verifies() {
        let session = loaded(PickingConfig::default().with_verification_required(true));
        let t = scan(&session, ScanResult::Location("LOC20".into()));
        assert_eq!(t.session.selection().location, Some(LocationId::new(20)));
        assert_eq!(t.session.selection().operation, Some(MoveLineId::new(3)));
        assert_eq!(
            t.verification(),
            Some(Verification::accept(VerifyReason::LocationMatched))
        );
        // Verified by location: manual completion is now allowed.
        let done = register(&t.session, 3, 3.0);
        assert!(done.session.operation(MoveLineId::new(3)).unwrap().is_completed);
    }

    #[test]
    fn lot_scan_is_recorded_when_none_expected() {
        let session = select_op(&loaded(PickingConfig::default()), 1);
        let t = scan(&session, ScanResult::Lot("LOT-42".into()));
        assert_eq!(
            t.session.operation(MoveLineId::new(1)).unwrap().lot.as_deref(),
            Some("LOT-42")
        );
        // A lot scan alone does not verify the operation.
        assert!(!t.session.operation(MoveLineId::new(1)).unwrap().scanned);

        let err = transition(
            &loaded(PickingConfig::default()),
            &cmd(PickingAction::Scan {
                scan: ScanResult::Lot("LOT-42".into()),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn reentering_a_completed_zone_only_shows_history() {
        let mut session = loaded(PickingConfig::default());
        for (id, qty) in [(3, 3.0), (4, 1.0)] {
            session = register(&session, id, qty).session;
        }
        let before = session.operations().to_vec();
        let t = run(
            &session,
            PickingAction::SelectZone {
                zone: ZoneId::Frozen,
            },
        );
        assert_eq!(t.session.phase(), PickingPhase::ZoneComplete);
        assert_eq!(t.session.operations(), before.as_slice());

        let again = run(
            &t.session,
            PickingAction::SelectZone {
                zone: ZoneId::Frozen,
            },
        );
        assert!(again.events.is_empty());
    }

    #[test]
    fn refresh_applies_external_quantities_last_write_wins() {
        let session = loaded(PickingConfig::default());
        let mut lines = batch_lines();
        for line in &mut lines {
            line.quantity_done = line.quantity;
        }
        let t = run(&session, PickingAction::RefreshOperations { lines });
        assert_eq!(kinds(&t), vec!["picking.operations.refreshed"]);
        assert!(t.session.is_batch_complete());

        let mut partial = batch_lines();
        partial[0].quantity_done = 1.0;
        let back = run(&t.session, PickingAction::RefreshOperations { lines: partial });
        assert!(!back.session.is_batch_complete());
        assert_eq!(back.session.completion_percentage(), 0);
    }

    #[test]
    fn reloading_the_same_batch_keeps_scans() {
        let session = select_op(
            &loaded(PickingConfig::default().with_verification_required(true)),
            1,
        );
        let scanned = scan(&session, ScanResult::Product("EAN1".into())).session;
        let batch = scanned.batch().cloned().unwrap();
        let reloaded = run(
            &scanned,
            PickingAction::SelectBatch {
                batch,
                lines: batch_lines(),
            },
        )
        .session;
        assert!(reloaded.operation(MoveLineId::new(1)).unwrap().scanned);
        assert_eq!(reloaded.started_at(), scanned.started_at());
    }

    #[test]
    fn enabling_verification_mid_session_applies_to_unscanned_operations() {
        let session = select_op(&loaded(PickingConfig::default()), 1);
        let strict = run(
            &session,
            PickingAction::Configure {
                config: PickingConfig::default().with_verification_required(true),
            },
        )
        .session;
        let t = register(&strict, 1, 2.0);
        assert_eq!(
            t.verification(),
            Some(Verification::reject(VerifyReason::ScanRequired))
        );
    }

    #[test]
    fn transition_does_not_mutate_its_input() {
        let session = select_op(&loaded(PickingConfig::default()), 1);
        let snapshot = session.clone();
        let t1 = register(&session, 1, 2.0);
        let t2 = register(&session, 1, 2.0);
        assert_eq!(session, snapshot);
        assert_eq!(t1.events, t2.events);
        assert_eq!(t1.session.version(), session.version() + t1.events.len() as u64);
    }

    #[test]
    fn session_round_trips_through_json() {
        let session = register(&select_op(&loaded(PickingConfig::default()), 1), 1, 1.0).session;
        let json = serde_json::to_string(&session).unwrap();
        let back: PickingSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
    }

    #[test]
    fn clearing_resets_the_session() {
        let session = select_op(&loaded(PickingConfig::default()), 1);
        let cleared = run(&session, PickingAction::ClearBatch).session;
        assert_eq!(cleared.phase(), PickingPhase::NoBatchSelected);
        assert!(cleared.operations().is_empty());
        assert!(cleared.started_at().is_none());
    }
}
