//! Page accessor capability.
//!
//! Drivers talk to the browser only through these traits, so extraction and
//! pagination logic run unchanged against Chromium or a canned page.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::PageError;

/// A cookie to install in a browsing context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSpec {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    pub expires: Option<DateTime<Utc>>,
}

/// Narrow view of one open browser page.
#[async_trait]
pub trait PageAccessor: Send + Sync {
    /// Load a URL and wait for the navigation to finish.
    async fn navigate(&self, url: &str) -> Result<(), PageError>;

    /// Wait until at least one element matches `selector`.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), PageError>;

    /// Number of elements matching `selector`.
    async fn count(&self, selector: &str) -> Result<usize, PageError>;

    /// Text content of the first element matching `selector`.
    async fn text(&self, selector: &str) -> Result<Option<String>, PageError>;

    /// Attribute of the first element matching `selector`.
    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>, PageError>;

    async fn click(&self, selector: &str) -> Result<(), PageError>;

    async fn scroll_to_bottom(&self) -> Result<(), PageError>;

    /// Snapshot of the rendered document as HTML.
    async fn content(&self) -> Result<String, PageError>;

    async fn set_cookie(&self, cookie: &CookieSpec) -> Result<(), PageError>;

    /// Tear the session down. Dropping the page does the same, forcibly.
    async fn close(&self);
}

/// Opens a fresh, isolated browsing session per run.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn PageAccessor>, PageError>;
}
