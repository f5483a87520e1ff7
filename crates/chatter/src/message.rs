use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use pickflow_core::MessageId;

/// One chatter entry as stored alongside a batch. `body` is raw markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatterMessage {
    pub id: MessageId,
    pub body: String,
    pub date: Option<NaiveDateTime>,
    pub author: Option<String>,
}

impl ChatterMessage {
    pub fn new(id: MessageId, body: impl Into<String>) -> Self {
        Self {
            id,
            body: body.into(),
            date: None,
            author: None,
        }
    }

    pub fn with_date(mut self, date: NaiveDateTime) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}
