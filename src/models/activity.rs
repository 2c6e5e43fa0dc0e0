//! Viewing activity records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One normalized viewing event.
///
/// `(platform_id, title, watched_at)` identifies the event. Writing a second
/// record with the same key refreshes the duration, episode, thumbnail and
/// genre fields instead of adding a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub platform_id: i32,
    pub title: String,
    /// Episode or context label (e.g. "Season 1: Chapter One", "S01E05").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_info: Option<String>,
    pub watched_at: DateTime<Utc>,
    pub duration_minutes: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
}

impl ActivityRecord {
    /// Create a record with no thumbnail or genre.
    pub fn new(
        platform_id: i32,
        title: impl Into<String>,
        episode_info: Option<String>,
        watched_at: DateTime<Utc>,
        duration_minutes: i32,
    ) -> Self {
        Self {
            platform_id,
            title: title.into(),
            episode_info: episode_info.filter(|e| !e.is_empty()),
            watched_at,
            duration_minutes,
            thumbnail_url: None,
            genre: None,
        }
    }

    /// Episode label, empty when absent.
    pub fn episode_label(&self) -> &str {
        self.episode_info.as_deref().unwrap_or("")
    }
}

/// An activity record as read back from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredActivity {
    pub id: i32,
    #[serde(flatten)]
    pub record: ActivityRecord,
    pub created_at: DateTime<Utc>,
}
