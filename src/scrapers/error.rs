//! Error types for the harvest pipeline.

use std::time::Duration;

use thiserror::Error;

/// Failures of the browser capability.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("Browser support not compiled. Rebuild with: cargo build --features browser")]
    Unsupported,

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Timed out after {timeout:?} waiting for {selector}")]
    WaitTimeout { selector: String, timeout: Duration },

    #[error("Element not found: {0}")]
    NotFound(String),

    #[error("Cookie {name} rejected: {reason}")]
    Cookie { name: String, reason: String },

    #[error("Page script failed: {0}")]
    Script(String),
}

/// Errors that abort a single platform run.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Platform disabled or missing authentication material.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No authentication token could be injected.
    #[error("Session error: {0}")]
    Session(String),

    /// The history page never became reachable or ready.
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// The run exceeded its deadline and the session was torn down.
    #[error("Run exceeded its {0:?} deadline")]
    Timeout(Duration),

    #[error("No driver registered for {0}")]
    NotRegistered(String),

    #[error("Platform not found in store: {0}")]
    PlatformNotFound(String),

    #[error("A run for {0} is already in progress")]
    AlreadyRunning(String),

    #[error("Database error: {0}")]
    Store(#[from] diesel::result::Error),
}

impl HarvestError {
    /// Whether this kind aborts a platform run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::Session(_)
                | Self::Navigation(_)
                | Self::Store(_)
                | Self::Timeout(_)
        )
    }

    /// Short machine-readable kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Session(_) => "session",
            Self::Navigation(_) => "navigation",
            Self::Timeout(_) => "timeout",
            Self::NotRegistered(_) => "not_registered",
            Self::PlatformNotFound(_) => "platform_not_found",
            Self::AlreadyRunning(_) => "already_running",
            Self::Store(_) => "store",
        }
    }
}

/// Per-item problems. These are logged and recovered from; they never
/// abort a run or an import.
#[derive(Debug, Error)]
pub enum ItemError {
    /// An item's required fields were unreadable; the item is dropped.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Date or duration text was unparsable; a default is substituted.
    #[error("Parse error: {0}")]
    Parse(String),

    /// One record's upsert failed; the batch continues.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Metadata lookup failed or was ambiguous; the heuristic is used.
    #[error("Enrichment error: {0}")]
    Enrichment(String),
}
