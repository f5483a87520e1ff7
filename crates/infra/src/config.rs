//! Configuration loading and representation.
//!
//! Everything comes from `PICKFLOW_*` environment variables. Command-line
//! flags are applied on top by the binary.

use thiserror::Error;
use tracing::warn;

use pickflow_picking::PickingConfig;

pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Connection settings of the external record store.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub url: String,
    pub database: String,
    pub uid: i64,
    pub api_key: String,
}

impl core::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("url", &self.url)
            .field("database", &self.database)
            .field("uid", &self.uid)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// `None` when no store URL is configured.
    pub store: Option<StoreConfig>,
    /// Upper bound on batches aggregated concurrently.
    pub max_in_flight: usize,
    pub picking: PickingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: None,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            picking: PickingConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup; `from_env` with the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let store = match get("PICKFLOW_STORE_URL") {
            Some(url) => Some(StoreConfig {
                url,
                database: get("PICKFLOW_STORE_DB").ok_or(ConfigError::Missing("PICKFLOW_STORE_DB"))?,
                uid: parse_uid(get("PICKFLOW_STORE_UID"))?,
                api_key: get("PICKFLOW_STORE_API_KEY")
                    .ok_or(ConfigError::Missing("PICKFLOW_STORE_API_KEY"))?,
            }),
            None => {
                warn!("PICKFLOW_STORE_URL not set; no record store configured");
                None
            }
        };

        let max_in_flight = match get("PICKFLOW_MAX_IN_FLIGHT") {
            Some(raw) => parse_max_in_flight(&raw)?,
            None => DEFAULT_MAX_IN_FLIGHT,
        };

        let defaults = PickingConfig::default();
        let flag = |var: &'static str, default: bool| match get(var) {
            Some(raw) => parse_flag(var, &raw),
            None => Ok(default),
        };
        let picking = PickingConfig {
            verification_required: flag(
                "PICKFLOW_VERIFICATION_REQUIRED",
                defaults.verification_required,
            )?,
            collapse_on_complete: flag(
                "PICKFLOW_COLLAPSE_ON_COMPLETE",
                defaults.collapse_on_complete,
            )?,
            auto_next: flag("PICKFLOW_AUTO_NEXT", defaults.auto_next)?,
            audio_feedback: flag("PICKFLOW_AUDIO_FEEDBACK", defaults.audio_feedback)?,
            vibration_feedback: flag("PICKFLOW_VIBRATION_FEEDBACK", defaults.vibration_feedback)?,
        };

        Ok(Self {
            store,
            max_in_flight,
            picking,
        })
    }

    pub fn require_store(&self) -> Result<&StoreConfig, ConfigError> {
        self.store
            .as_ref()
            .ok_or(ConfigError::Missing("PICKFLOW_STORE_URL"))
    }
}

fn parse_uid(raw: Option<String>) -> Result<i64, ConfigError> {
    let raw = raw.ok_or(ConfigError::Missing("PICKFLOW_STORE_UID"))?;
    match raw.trim().parse::<i64>() {
        Ok(uid) if uid > 0 => Ok(uid),
        _ => Err(ConfigError::Invalid {
            var: "PICKFLOW_STORE_UID",
            value: raw,
            reason: "expected a positive user id".to_string(),
        }),
    }
}

pub fn parse_max_in_flight(raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::Invalid {
            var: "PICKFLOW_MAX_IN_FLIGHT",
            value: raw.to_string(),
            reason: "expected a positive integer".to_string(),
        }),
    }
}

fn parse_flag(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
