use serde::{Deserialize, Serialize};

use pickflow_core::LocationId;

use crate::zone::{ZoneId, resolve_zone};

/// Stock location as read from the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    /// Hierarchical name, e.g. `WH/Stock/Frozen/F-03`.
    pub complete_name: String,
    pub barcode: Option<String>,
    pub parent_id: Option<LocationId>,
    #[serde(default)]
    pub child_ids: Vec<LocationId>,
}

impl Location {
    pub fn new(id: LocationId, complete_name: impl Into<String>) -> Self {
        Self {
            id,
            complete_name: complete_name.into(),
            barcode: None,
            parent_id: None,
            child_ids: Vec::new(),
        }
    }

    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    /// Zone inferred from the complete name; `None` when unzoned.
    pub fn zone(&self) -> Option<ZoneId> {
        resolve_zone(&self.complete_name)
    }

    /// Last path segment, used as a compact label.
    pub fn short_name(&self) -> &str {
        self.complete_name
            .rsplit('/')
            .next()
            .map(str::trim)
            .unwrap_or(&self.complete_name)
    }

    /// Whether a scanned code designates this location (barcode or complete name).
    pub fn matches_code(&self, code: &str) -> bool {
        let code = code.trim();
        if code.is_empty() {
            return false;
        }
        self.barcode.as_deref().is_some_and(|b| b.trim() == code)
            || self.complete_name.trim().eq_ignore_ascii_case(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_is_last_segment() {
        let loc = Location::new(LocationId::new(1), "WH/Stock/Frozen/F-03");
        assert_eq!(loc.short_name(), "F-03");
        assert_eq!(loc.zone(), Some(ZoneId::Frozen));
    }

    #[test]
    fn matches_barcode_or_complete_name() {
        let loc = Location::new(LocationId::new(1), "WH/Stock/Dry/A-01").with_barcode("LOC-A01");
        assert!(loc.matches_code("LOC-A01"));
        assert!(loc.matches_code(" wh/stock/dry/a-01 "));
        assert!(!loc.matches_code("A-01"));
        assert!(!loc.matches_code(""));
    }
}
