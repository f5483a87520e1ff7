//! Read-side projections of a picking session for the UI collaborator.

use chrono::{DateTime, Utc};
use serde::Serialize;

use pickflow_core::{LocationId, MoveLineId};

use crate::operation::{Operation, completion_percentage};
use crate::session::PickingSession;
use crate::zone::Zone;
use crate::zone::ZoneId;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneView {
    pub zone: Zone,
    pub operations_total: usize,
    pub operations_completed: usize,
    pub completion_percentage: u8,
    pub is_complete: bool,
    pub is_selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationView {
    pub location_id: LocationId,
    pub complete_name: String,
    pub short_name: String,
    pub pending_operations: Vec<MoveLineId>,
    pub operations_total: usize,
    pub is_complete: bool,
    pub is_selected: bool,
}

/// Zones of the active view, in walking order.
///
/// Zones without operations never appear, and neither do zones that had
/// nothing pending when the batch was selected. With `collapse_on_complete`,
/// zones finished during the session are hidden too. Inspecting a zone
/// always shows it.
pub fn zone_views(session: &PickingSession) -> Vec<ZoneView> {
    let collapse = session.config().collapse_on_complete;
    let selected = session.selection().zone;

    session
        .zones()
        .into_iter()
        .filter_map(|zone| {
            let ops: Vec<Operation> = session.zone_operations(zone).cloned().collect();
            let completed = ops.iter().filter(|op| op.is_completed).count();
            let is_complete = completed == ops.len();
            let hidden = collapse || session.was_complete_at_load(zone);
            if is_complete && hidden && !session.is_inspected(zone) {
                return None;
            }
            Some(ZoneView {
                zone: *zone.zone(),
                operations_total: ops.len(),
                operations_completed: completed,
                completion_percentage: completion_percentage(&ops),
                is_complete,
                is_selected: selected == Some(zone),
            })
        })
        .collect()
}

/// Locations of a zone, ordered by complete name, with their pending operations.
pub fn location_views(session: &PickingSession, zone: ZoneId) -> Vec<LocationView> {
    let collapse = session.config().collapse_on_complete && !session.is_inspected(zone);
    let selected = session.selection().location;

    session
        .zone_locations(zone)
        .into_iter()
        .filter_map(|location| {
            let ops = session.location_operations(location.id);
            let pending: Vec<MoveLineId> = ops
                .iter()
                .filter(|op| op.is_pending())
                .map(|op| op.id)
                .collect();
            let is_complete = pending.is_empty();
            if is_complete && collapse {
                return None;
            }
            Some(LocationView {
                location_id: location.id,
                complete_name: location.complete_name.clone(),
                short_name: location.short_name().to_string(),
                pending_operations: pending,
                operations_total: ops.len(),
                is_complete,
                is_selected: selected == Some(location.id),
            })
        })
        .collect()
}

/// Per-session progress snapshot. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkStats {
    pub zones_total: usize,
    pub zones_completed: usize,
    pub operations_total: usize,
    pub operations_completed: usize,
    pub completion_percentage: u8,
    pub elapsed_seconds: i64,
    pub operations_per_hour: Option<f64>,
}

pub fn work_stats(session: &PickingSession, now: DateTime<Utc>) -> WorkStats {
    let zones = session.zones();
    let zones_completed = zones
        .iter()
        .filter(|z| session.is_zone_complete(**z))
        .count();
    let operations_completed = session
        .operations()
        .iter()
        .filter(|op| op.is_completed)
        .count();
    let elapsed_seconds = session
        .started_at()
        .map(|start| (now - start).num_seconds().max(0))
        .unwrap_or(0);
    let operations_per_hour = (elapsed_seconds > 0)
        .then(|| operations_completed as f64 * 3600.0 / elapsed_seconds as f64);

    WorkStats {
        zones_total: zones.len(),
        zones_completed,
        operations_total: session.operations().len(),
        operations_completed,
        completion_percentage: session.completion_percentage(),
        elapsed_seconds,
        operations_per_hour,
    }
}
