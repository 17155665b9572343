//! Pin entity: a geographic location the user marked on the map.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Coordinate;

/// Page a freshly dropped pin starts fetching from.
pub const DEFAULT_PAGE_NUMBER: u32 = 1;

fn default_page_number() -> u32 {
    DEFAULT_PAGE_NUMBER
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PinId(pub u64);

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    pub id: PinId,
    pub latitude: f64,
    pub longitude: f64,
    /// Pagination cursor into the remote photo source.
    #[serde(default = "default_page_number")]
    pub page_number: u32,
    /// When the pin's photo set was last replaced by a successful fetch.
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,
}

impl Pin {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// Exact coordinate match, the way a tapped map marker finds its pin.
    pub fn is_at(&self, coordinate: Coordinate) -> bool {
        self.latitude == coordinate.latitude && self.longitude == coordinate.longitude
    }

    /// Minutes since the last successful sync, if there has been one.
    pub fn sync_age_minutes(&self) -> Option<i64> {
        self.synced_at.map(|at| (Utc::now() - at).num_minutes())
    }
}
