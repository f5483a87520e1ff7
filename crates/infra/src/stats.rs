//! Batch statistics aggregation.
//!
//! For each batch: picking and move-line counts, the full chatter once, the
//! parsed facts folded into [`BatchStats`]. Failures degrade per batch and
//! never abort a listing.

use chrono::NaiveDateTime;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use pickflow_chatter::{BatchStats, ChatterParser, MarkerParser};
use pickflow_core::BatchId;
use pickflow_picking::{Batch, BatchState};

use crate::config::DEFAULT_MAX_IN_FLIGHT;
use crate::record_store::{BatchQuery, RecordStore, StoreError};

/// One row of the batch report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub id: BatchId,
    pub name: String,
    pub state: BatchState,
    pub scheduled_date: Option<NaiveDateTime>,
    pub picking_count: usize,
    pub move_line_count: usize,
    pub stats: BatchStats,
}

pub struct StatsAggregator<S, P = MarkerParser> {
    store: S,
    parser: P,
    max_in_flight: usize,
}

impl<S> StatsAggregator<S, MarkerParser>
where
    S: RecordStore,
{
    pub fn new(store: S) -> Self {
        Self::with_parser(store, MarkerParser::default())
    }
}

impl<S, P> StatsAggregator<S, P>
where
    S: RecordStore,
    P: ChatterParser + Sync,
{
    pub fn with_parser(store: S, parser: P) -> Self {
        Self {
            store,
            parser,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    /// Bound on batches processed at once; `0` is treated as `1`.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Chatter statistics of one batch; all zero when the chatter cannot be read.
    pub async fn batch_stats(&self, batch: BatchId) -> BatchStats {
        match self.store.read_messages(batch).await {
            Ok(messages) => BatchStats::from_facts(&self.parser.parse(&messages)),
            Err(err) => {
                warn!(batch = %batch, error = %err, "chatter unavailable; reporting zero stats");
                BatchStats::zeroed()
            }
        }
    }

    pub async fn batch_report(&self, batch: &Batch) -> BatchReport {
        let (pickings, lines, stats) = tokio::join!(
            self.store.count_pickings(batch.id),
            self.store.count_move_lines(batch.id),
            self.batch_stats(batch.id),
        );

        BatchReport {
            id: batch.id,
            name: batch.name.clone(),
            state: batch.state,
            scheduled_date: batch.scheduled_date,
            picking_count: count_or_fallback(batch.id, "pickings", pickings, batch.picking_ids.len()),
            move_line_count: count_or_fallback(
                batch.id,
                "move lines",
                lines,
                batch.move_line_ids.len(),
            ),
            stats,
        }
    }

    /// Reports for `batches`, in input order, at most `max_in_flight` at a time.
    pub async fn reports(&self, batches: &[Batch]) -> Vec<BatchReport> {
        let mut indexed: Vec<(usize, BatchReport)> = stream::iter(batches.iter().enumerate())
            .map(|(idx, batch)| async move { (idx, self.batch_report(batch).await) })
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await;

        // Sort by index to keep the caller's order.
        indexed.sort_by_key(|(idx, _)| *idx);
        indexed.into_iter().map(|(_, report)| report).collect()
    }

    /// Search, then report. Only the search itself can fail.
    pub async fn report_for_query(&self, query: &BatchQuery) -> Result<Vec<BatchReport>, StoreError> {
        let batches = self.store.search_batches(query).await?;
        info!(batches = batches.len(), max_in_flight = self.max_in_flight, "aggregating batch statistics");
        Ok(self.reports(&batches).await)
    }
}

fn count_or_fallback(
    batch: BatchId,
    what: &str,
    count: Result<usize, StoreError>,
    fallback: usize,
) -> usize {
    match count {
        Ok(n) => n,
        Err(err) => {
            warn!(batch = %batch, error = %err, "counting {what} failed; using the batch's own id list");
            fallback
        }
    }
}
