//! Infrastructure layer: record store access, statistics aggregation,
//! picking orchestration and configuration.

pub mod config;
pub mod picking_service;
pub mod record_store;
pub mod stats;


pub use config::{AppConfig, ConfigError, StoreConfig};
pub use picking_service::{PickingService, ServiceError};
pub use record_store::{BatchQuery, InMemoryRecordStore, JsonRpcStore, RecordStore, StoreError};
pub use stats::{BatchReport, StatsAggregator};
