//! Streaming platform identities.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A platform row as persisted in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformIdentity {
    pub id: i32,
    pub name: String,
    /// Hex color used by dashboards.
    pub color: String,
    pub logo_url: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Name to identity table resolved once per orchestrator invocation.
///
/// Drivers whose feed mixes several platforms map items through this table
/// instead of querying the store themselves.
#[derive(Debug, Clone, Default)]
pub struct PlatformLookup {
    by_name: HashMap<String, PlatformIdentity>,
}

impl PlatformLookup {
    pub fn new(platforms: impl IntoIterator<Item = PlatformIdentity>) -> Self {
        Self {
            by_name: platforms
                .into_iter()
                .map(|p| (p.name.clone(), p))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&PlatformIdentity> {
        self.by_name.get(name)
    }

    pub fn id_of(&self, name: &str) -> Option<i32> {
        self.by_name.get(name).map(|p| p.id)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Aggregated viewing totals for one platform over a time window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformStats {
    pub platform_id: i32,
    pub name: String,
    pub color: String,
    pub total_minutes: i64,
    pub total_records: i64,
    pub last_watched: Option<DateTime<Utc>>,
}
