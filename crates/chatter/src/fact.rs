use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use pickflow_core::MessageId;

/// Where a fact came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMeta {
    pub id: MessageId,
    pub date: Option<NaiveDateTime>,
    pub author: Option<String>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
    PickSession,
    ControlSession,
    VideoEvent,
    ProblemReport,
}

/// A chatter message, classified once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatterFact {
    PickSession {
        meta: MessageMeta,
        operator: Option<String>,
        duration_minutes: Option<u32>,
    },
    ControlSession {
        meta: MessageMeta,
        operator: Option<String>,
        errors: Vec<String>,
    },
    VideoEvent {
        meta: MessageMeta,
        operator: Option<String>,
        media_ref: Option<String>,
    },
    ProblemReport {
        meta: MessageMeta,
        operator: Option<String>,
        description: String,
    },
}

impl ChatterFact {
    pub fn kind(&self) -> FactKind {
        match self {
            Self::PickSession { .. } => FactKind::PickSession,
            Self::ControlSession { .. } => FactKind::ControlSession,
            Self::VideoEvent { .. } => FactKind::VideoEvent,
            Self::ProblemReport { .. } => FactKind::ProblemReport,
        }
    }

    pub fn meta(&self) -> &MessageMeta {
        match self {
            Self::PickSession { meta, .. }
            | Self::ControlSession { meta, .. }
            | Self::VideoEvent { meta, .. }
            | Self::ProblemReport { meta, .. } => meta,
        }
    }

    pub fn operator(&self) -> Option<&str> {
        match self {
            Self::PickSession { operator, .. }
            | Self::ControlSession { operator, .. }
            | Self::VideoEvent { operator, .. }
            | Self::ProblemReport { operator, .. } => operator.as_deref(),
        }
    }
}
