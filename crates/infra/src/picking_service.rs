//! Picking orchestration: the record store on one side, the pure picking
//! state machine on the other.
//!
//! ```text
//! action
//!   ↓
//! 1. transition(session, command)   (pure, may be rejected)
//!   ↓
//! 2. write registered done quantities back to the store
//!   ↓
//! 3. hand the new session to the caller
//! ```
//!
//! If a write fails the caller keeps its previous session, so the local view
//! never runs ahead of the store.

use thiserror::Error;
use tracing::{debug, info};

use pickflow_core::{BatchId, DomainError, Event};
use pickflow_picking::{PickingAction, PickingCommand, PickingSession, Transition, transition};

use crate::record_store::{RecordStore, StoreError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

pub struct PickingService<S> {
    store: S,
}

impl<S> PickingService<S>
where
    S: RecordStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read a batch with its move lines and select it in `session`.
    pub async fn load_batch(
        &self,
        session: &PickingSession,
        batch_id: BatchId,
    ) -> Result<Transition, ServiceError> {
        let batch = self.store.read_batch(batch_id).await?;
        let lines = self.store.read_move_lines(&batch.move_line_ids).await?;
        info!(batch = %batch_id, lines = lines.len(), "loaded batch for picking");
        self.execute(session, PickingAction::SelectBatch { batch, lines })
            .await
    }

    /// Run one action and persist the quantities it registered.
    pub async fn execute(
        &self,
        session: &PickingSession,
        action: PickingAction,
    ) -> Result<Transition, ServiceError> {
        self.apply(session, PickingCommand::now(action)).await
    }

    /// Like [`execute`](Self::execute) with a caller-supplied command timestamp.
    pub async fn apply(
        &self,
        session: &PickingSession,
        command: PickingCommand,
    ) -> Result<Transition, ServiceError> {
        let next = transition(session, &command)?;
        for event in &next.events {
            debug!(event = event.event_type(), "picking event");
        }
        for write in next.quantity_writes() {
            self.store
                .write_quantity_done(write.operation_id, write.quantity_done)
                .await?;
            info!(
                move_line = %write.operation_id,
                quantity_done = write.quantity_done,
                "done quantity written"
            );
        }
        Ok(next)
    }

    /// Merge done quantities other operators wrote since the batch was loaded.
    pub async fn refresh(&self, session: &PickingSession) -> Result<Transition, ServiceError> {
        let Some(batch) = session.batch() else {
            return Err(DomainError::validation("no batch selected").into());
        };
        let lines = self.store.read_move_lines(&batch.move_line_ids).await?;
        self.execute(session, PickingAction::RefreshOperations { lines })
            .await
    }
}
