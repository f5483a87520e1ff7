use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use pickflow_chatter::ChatterMessage;
use pickflow_core::{BatchId, MoveLineId};
use pickflow_picking::{Batch, MoveLine};

use super::{BatchQuery, RecordStore, StoreError};

#[derive(Debug, Default)]
struct Inner {
    batches: BTreeMap<BatchId, Batch>,
    lines: BTreeMap<MoveLineId, MoveLine>,
    messages: BTreeMap<BatchId, Vec<ChatterMessage>>,
    faults: Faults,
}

/// Injected failures, per batch or store-wide.
#[derive(Debug, Default)]
struct Faults {
    unreachable: bool,
    messages: BTreeSet<BatchId>,
    counts: BTreeSet<BatchId>,
}

/// In-memory record store.
///
/// Intended for tests/dev. Supports failure injection so degradation paths can
/// be exercised without a network.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    inner: RwLock<Inner>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::Remote("lock poisoned".to_string()))?;
        if inner.faults.unreachable {
            return Err(StoreError::Connectivity("store marked unreachable".to_string()));
        }
        Ok(inner)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Remote("lock poisoned".to_string()))
    }

    pub fn insert_batch(&self, batch: Batch) -> Result<(), StoreError> {
        self.write()?.batches.insert(batch.id, batch);
        Ok(())
    }

    pub fn insert_move_line(&self, line: MoveLine) -> Result<(), StoreError> {
        self.write()?.lines.insert(line.id, line);
        Ok(())
    }

    pub fn insert_message(&self, batch: BatchId, message: ChatterMessage) -> Result<(), StoreError> {
        self.write()?.messages.entry(batch).or_default().push(message);
        Ok(())
    }

    /// Make every call fail with a connectivity error.
    pub fn set_unreachable(&self, unreachable: bool) -> Result<(), StoreError> {
        self.write()?.faults.unreachable = unreachable;
        Ok(())
    }

    pub fn fail_messages_for(&self, batch: BatchId) -> Result<(), StoreError> {
        self.write()?.faults.messages.insert(batch);
        Ok(())
    }

    pub fn fail_counts_for(&self, batch: BatchId) -> Result<(), StoreError> {
        self.write()?.faults.counts.insert(batch);
        Ok(())
    }

    /// Current done quantity of a line, as last written.
    pub fn quantity_done(&self, line: MoveLineId) -> Option<f64> {
        self.read()
            .ok()
            .and_then(|inner| inner.lines.get(&line).map(|l| l.quantity_done))
    }

    fn batch(inner: &Inner, id: BatchId) -> Result<&Batch, StoreError> {
        inner
            .batches
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(format!("batch {id}")))
    }

    fn check_counts(inner: &Inner, id: BatchId) -> Result<(), StoreError> {
        if inner.faults.counts.contains(&id) {
            return Err(StoreError::Remote(format!("count failed for batch {id}")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn search_batches(&self, query: &BatchQuery) -> Result<Vec<Batch>, StoreError> {
        let inner = self.read()?;
        let mut batches: Vec<Batch> = inner
            .batches
            .values()
            .filter(|b| query.matches(b))
            .cloned()
            .collect();
        batches.sort_by_key(|b| (b.scheduled_date, b.id));
        if let Some(limit) = query.limit {
            batches.truncate(limit);
        }
        Ok(batches)
    }

    async fn read_batch(&self, id: BatchId) -> Result<Batch, StoreError> {
        let inner = self.read()?;
        Self::batch(&inner, id).cloned()
    }

    async fn read_move_lines(&self, ids: &[MoveLineId]) -> Result<Vec<MoveLine>, StoreError> {
        let inner = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| inner.lines.get(id).cloned())
            .collect())
    }

    async fn read_messages(&self, batch: BatchId) -> Result<Vec<ChatterMessage>, StoreError> {
        let inner = self.read()?;
        if inner.faults.messages.contains(&batch) {
            return Err(StoreError::Remote(format!(
                "chatter unavailable for batch {batch}"
            )));
        }
        let mut messages = inner.messages.get(&batch).cloned().unwrap_or_default();
        messages.sort_by_key(|m| (m.date, m.id));
        Ok(messages)
    }

    async fn count_pickings(&self, batch: BatchId) -> Result<usize, StoreError> {
        let inner = self.read()?;
        Self::check_counts(&inner, batch)?;
        Ok(Self::batch(&inner, batch)?.picking_ids.len())
    }

    async fn count_move_lines(&self, batch: BatchId) -> Result<usize, StoreError> {
        let inner = self.read()?;
        Self::check_counts(&inner, batch)?;
        Ok(Self::batch(&inner, batch)?.move_line_ids.len())
    }

    async fn write_quantity_done(&self, line: MoveLineId, quantity: f64) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if inner.faults.unreachable {
            return Err(StoreError::Connectivity("store marked unreachable".to_string()));
        }
        let record = inner
            .lines
            .get_mut(&line)
            .ok_or_else(|| StoreError::NotFound(format!("move line {line}")))?;
        record.quantity_done = quantity;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pickflow_chatter::ChatterMessage;
    use pickflow_core::{LocationId, MessageId, PickingId, ProductId};
    use pickflow_picking::{BatchState, Location, Product};

    fn line(id: u64) -> MoveLine {
        MoveLine {
            id: MoveLineId::new(id),
            picking_id: Some(PickingId::new(1)),
            product: Product::new(ProductId::new(id), "Milk"),
            location: Location::new(LocationId::new(1), "WH/Refrigerated/R-01"),
            location_dest: None,
            lot: None,
            expiry: None,
            package: None,
            quantity: 2.0,
            quantity_done: 0.0,
        }
    }

    #[tokio::test]
    async fn reads_and_writes_round_trip() {
        let store = InMemoryRecordStore::new();
        store.insert_move_line(line(1)).unwrap();

        store.write_quantity_done(MoveLineId::new(1), 2.0).await.unwrap();
        assert_eq!(store.quantity_done(MoveLineId::new(1)), Some(2.0));

        let lines = store
            .read_move_lines(&[MoveLineId::new(1), MoveLineId::new(99)])
            .await
            .unwrap();
        assert_eq!(lines.len(), 1);

        let err = store
            .write_quantity_done(MoveLineId::new(99), 1.0)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn messages_come_back_oldest_first() {
        let store = InMemoryRecordStore::new();
        let batch = BatchId::new(1);
        let at = |h| NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(h, 0, 0).unwrap();
        store
            .insert_message(batch, ChatterMessage::new(MessageId::new(2), "late").with_date(at(10)))
            .unwrap();
        store
            .insert_message(batch, ChatterMessage::new(MessageId::new(1), "early").with_date(at(8)))
            .unwrap();

        let messages = store.read_messages(batch).await.unwrap();
        let bodies: Vec<&str> = messages.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["early", "late"]);
    }

    #[tokio::test]
    async fn search_orders_by_schedule_and_limits() {
        let store = InMemoryRecordStore::new();
        for (id, hour) in [(1u64, 12), (2, 8), (3, 10)] {
            let mut batch = Batch::new(BatchId::new(id), format!("B{id}"), BatchState::InProgress);
            batch.scheduled_date = NaiveDate::from_ymd_opt(2024, 5, 1).and_then(|d| d.and_hms_opt(hour, 0, 0));
            store.insert_batch(batch).unwrap();
        }
        let found = store
            .search_batches(&BatchQuery::new().with_limit(2))
            .await
            .unwrap();
        let ids: Vec<u64> = found.iter().map(|b| b.id.get()).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn unreachable_store_fails_every_call() {
        let store = InMemoryRecordStore::new();
        store.set_unreachable(true).unwrap();
        let err = store.read_batch(BatchId::new(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Connectivity(_)));
        let err = store
            .write_quantity_done(MoveLineId::new(1), 1.0)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Connectivity(_)));
    }
}
