use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use pickflow_core::{BatchId, DomainError, DomainResult, MoveLineId, PickingId};

/// Batch lifecycle, owned by warehouse staff in the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Draft,
    InProgress,
    Done,
    Cancel,
}

impl BatchState {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchState::Draft => "draft",
            BatchState::InProgress => "in_progress",
            BatchState::Done => "done",
            BatchState::Cancel => "cancel",
        }
    }

    pub fn parse(raw: &str) -> DomainResult<Self> {
        match raw.trim() {
            "draft" => Ok(BatchState::Draft),
            "in_progress" => Ok(BatchState::InProgress),
            "done" => Ok(BatchState::Done),
            "cancel" => Ok(BatchState::Cancel),
            other => Err(DomainError::validation(format!("unknown batch state: {other:?}"))),
        }
    }
}

impl core::fmt::Display for BatchState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A grouped set of deliveries for one driver/route and day.
///
/// Read-only here: the record store owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub name: String,
    pub state: BatchState,
    pub scheduled_date: Option<NaiveDateTime>,
    /// Driver or vehicle the batch is assigned to.
    pub assignee: Option<String>,
    #[serde(default)]
    pub picking_ids: Vec<PickingId>,
    #[serde(default)]
    pub move_line_ids: Vec<MoveLineId>,
}

impl Batch {
    pub fn new(id: BatchId, name: impl Into<String>, state: BatchState) -> Self {
        Self {
            id,
            name: name.into(),
            state,
            scheduled_date: None,
            assignee: None,
            picking_ids: Vec::new(),
            move_line_ids: Vec::new(),
        }
    }
}

/// Parse a scheduled date as the record store formats it.
///
/// Accepts `YYYY-MM-DD HH:MM:SS` (optionally with fractional seconds or a `T`
/// separator) and bare `YYYY-MM-DD`, which maps to midnight.
pub fn parse_scheduled_date(raw: &str) -> DomainResult<NaiveDateTime> {
    let raw = raw.trim();
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| DomainError::validation(format!("malformed scheduled date: {raw:?}")))
}
