//! Boundary to the external record store.
//!
//! The store owns batches, move lines and chatter. This crate only reads them
//! and writes back done quantities; authentication and persistence are the
//! store's business. Every call is a fallible async call with no internal
//! retries.

use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;

use pickflow_chatter::ChatterMessage;
use pickflow_core::{BatchId, DomainError, MoveLineId};
use pickflow_picking::{Batch, BatchState, MoveLine};

pub mod in_memory;
pub mod json_rpc;

pub use in_memory::InMemoryRecordStore;
pub use json_rpc::JsonRpcStore;

/// Record store operation error.
///
/// Connectivity and authentication failures are surfaced as-is; callers decide
/// whether to retry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("record store unreachable: {0}")]
    Connectivity(String),

    #[error("record store rejected credentials: {0}")]
    Authentication(String),

    #[error("record not found: {0}")]
    NotFound(String),

    /// A record came back in a shape the domain cannot accept.
    #[error("malformed record: {0}")]
    Decode(String),

    #[error("record store error: {0}")]
    Remote(String),
}

impl From<DomainError> for StoreError {
    fn from(value: DomainError) -> Self {
        StoreError::Decode(value.to_string())
    }
}

/// Filter for batch listings. Empty query lists every batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchQuery {
    pub state: Option<BatchState>,
    /// Calendar day of the scheduled date.
    pub scheduled_on: Option<NaiveDate>,
    pub limit: Option<usize>,
}

impl BatchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(mut self, state: BatchState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn scheduled_on(mut self, day: NaiveDate) -> Self {
        self.scheduled_on = Some(day);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, batch: &Batch) -> bool {
        if self.state.is_some_and(|state| state != batch.state) {
            return false;
        }
        match self.scheduled_on {
            Some(day) => batch.scheduled_date.is_some_and(|d| d.date() == day),
            None => true,
        }
    }
}

/// Read/write surface of the external record store.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Batches matching `query`, ordered by scheduled date then id.
    async fn search_batches(&self, query: &BatchQuery) -> Result<Vec<Batch>, StoreError>;

    async fn read_batch(&self, id: BatchId) -> Result<Batch, StoreError>;

    /// Move lines with product and location detail resolved. Unknown ids are skipped.
    async fn read_move_lines(&self, ids: &[MoveLineId]) -> Result<Vec<MoveLine>, StoreError>;

    /// Chatter of a batch, oldest first.
    async fn read_messages(&self, batch: BatchId) -> Result<Vec<ChatterMessage>, StoreError>;

    async fn count_pickings(&self, batch: BatchId) -> Result<usize, StoreError>;

    async fn count_move_lines(&self, batch: BatchId) -> Result<usize, StoreError>;

    async fn write_quantity_done(&self, line: MoveLineId, quantity: f64) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl<T> RecordStore for Arc<T>
where
    T: RecordStore + ?Sized,
{
    async fn search_batches(&self, query: &BatchQuery) -> Result<Vec<Batch>, StoreError> {
        (**self).search_batches(query).await
    }

    async fn read_batch(&self, id: BatchId) -> Result<Batch, StoreError> {
        (**self).read_batch(id).await
    }

    async fn read_move_lines(&self, ids: &[MoveLineId]) -> Result<Vec<MoveLine>, StoreError> {
        (**self).read_move_lines(ids).await
    }

    async fn read_messages(&self, batch: BatchId) -> Result<Vec<ChatterMessage>, StoreError> {
        (**self).read_messages(batch).await
    }

    async fn count_pickings(&self, batch: BatchId) -> Result<usize, StoreError> {
        (**self).count_pickings(batch).await
    }

    async fn count_move_lines(&self, batch: BatchId) -> Result<usize, StoreError> {
        (**self).count_move_lines(batch).await
    }

    async fn write_quantity_done(&self, line: MoveLineId, quantity: f64) -> Result<(), StoreError> {
        (**self).write_quantity_done(line, quantity).await
    }
}
