//! Command implementations, generic over the record store.

use chrono::Utc;
use serde::Serialize;

use pickflow_core::BatchId;
use pickflow_infra::{BatchQuery, BatchReport, PickingService, RecordStore, StatsAggregator};
use pickflow_picking::{
    LocationView, PickingAction, PickingConfig, PickingPhase, PickingSession, WorkStats,
    ZoneView, location_views, work_stats, zone_views,
};

pub async fn report<S: RecordStore>(
    store: S,
    query: &BatchQuery,
    max_in_flight: usize,
) -> anyhow::Result<Vec<BatchReport>> {
    let reports = StatsAggregator::new(store)
        .with_max_in_flight(max_in_flight)
        .report_for_query(query)
        .await?;
    Ok(reports)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneOverview {
    pub batch_id: BatchId,
    pub batch_name: String,
    pub phase: PickingPhase,
    pub work: WorkStats,
    pub zones: Vec<ZoneSummary>,
    /// Operations whose location maps to no zone.
    pub unzoned_operations: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSummary {
    #[serde(flatten)]
    pub zone: ZoneView,
    pub locations: Vec<LocationView>,
}

/// Zone overview of `batch`; `inspect_all` opens every zone, finished ones included.
pub async fn zones<S: RecordStore>(
    store: S,
    batch: BatchId,
    config: PickingConfig,
    inspect_all: bool,
) -> anyhow::Result<ZoneOverview> {
    let service = PickingService::new(store);
    let mut session = service
        .load_batch(&PickingSession::new(config), batch)
        .await?
        .session;
    if inspect_all {
        for zone in session.zones() {
            session = service
                .execute(&session, PickingAction::InspectZone { zone })
                .await?
                .session;
        }
    }

    let zones = zone_views(&session)
        .into_iter()
        .map(|zone| ZoneSummary {
            locations: location_views(&session, zone.zone.id),
            zone,
        })
        .collect();
    let batch_name = session
        .batch()
        .map(|b| b.name.clone())
        .unwrap_or_default();

    Ok(ZoneOverview {
        batch_id: batch,
        batch_name,
        phase: session.phase(),
        work: work_stats(&session, Utc::now()),
        zones,
        unzoned_operations: session.unzoned_operations().len(),
    })
}
