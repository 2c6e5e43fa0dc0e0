//! Harvest run audit entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final status of one harvest invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("unknown run status: {}", s)),
        }
    }
}

/// Append-only record of a single harvest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub platform_id: i32,
    /// Platform name, carried for display.
    pub platform: String,
    pub started_at: DateTime<Utc>,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Records actually persisted by the run.
    pub items_scraped: i32,
}

impl RunOutcome {
    pub fn success(
        platform_id: i32,
        platform: &str,
        started_at: DateTime<Utc>,
        items_scraped: i32,
    ) -> Self {
        Self {
            platform_id,
            platform: platform.to_string(),
            started_at,
            status: RunStatus::Success,
            error_message: None,
            items_scraped,
        }
    }

    pub fn failed(
        platform_id: i32,
        platform: &str,
        started_at: DateTime<Utc>,
        error: impl std::fmt::Display,
    ) -> Self {
        Self {
            platform_id,
            platform: platform.to_string(),
            started_at,
            status: RunStatus::Failed,
            error_message: Some(error.to_string()),
            items_scraped: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}
