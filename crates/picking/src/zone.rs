//! Warehouse topology: the static zone table and location → zone resolution.

use serde::{Deserialize, Serialize};

/// Physical warehouse area.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneId {
    Dry,
    DryHigh,
    Frozen,
    Refrigerated,
}

/// Display metadata for a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Zone {
    pub id: ZoneId,
    pub name: &'static str,
    /// CSS-style hex color used by UI collaborators.
    pub color: &'static str,
    /// Walking order through the warehouse (ascending).
    pub rank: u8,
}

/// Every zone, in walking order.
pub const ZONES: [Zone; 4] = [
    Zone {
        id: ZoneId::Dry,
        name: "Dry",
        color: "#d97706",
        rank: 1,
    },
    Zone {
        id: ZoneId::DryHigh,
        name: "Dry (high racks)",
        color: "#92400e",
        rank: 2,
    },
    Zone {
        id: ZoneId::Refrigerated,
        name: "Refrigerated",
        color: "#0284c7",
        rank: 3,
    },
    Zone {
        id: ZoneId::Frozen,
        name: "Frozen",
        color: "#4f46e5",
        rank: 4,
    },
];

impl ZoneId {
    /// Stable identifier, also the token matched inside location names.
    pub fn as_str(self) -> &'static str {
        match self {
            ZoneId::Dry => "dry",
            ZoneId::DryHigh => "dry_high",
            ZoneId::Frozen => "frozen",
            ZoneId::Refrigerated => "refrigerated",
        }
    }

    pub fn zone(self) -> &'static Zone {
        // ZONES holds every variant exactly once.
        ZONES
            .iter()
            .find(|z| z.id == self)
            .unwrap_or(&ZONES[0])
    }

    pub fn rank(self) -> u8 {
        self.zone().rank
    }
}

impl core::fmt::Display for ZoneId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve a location's complete name to its zone.
///
/// The compound `dry` + `high` rule must run before the plain `dry` rule,
/// otherwise high-rack locations land in the base dry zone. `None` means the
/// location is unzoned, which is a valid answer.
pub fn resolve_zone(location_name: &str) -> Option<ZoneId> {
    let name = location_name.to_lowercase();

    if name.contains("dry") {
        if name.contains("high") {
            return Some(ZoneId::DryHigh);
        }
        return Some(ZoneId::Dry);
    }

    [ZoneId::Frozen, ZoneId::Refrigerated]
        .into_iter()
        .find(|zone| name.contains(zone.as_str()))
}
