//! Canned pages for driver and pagination tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};

use super::error::PageError;
use super::page::{CookieSpec, PageAccessor, SessionLauncher};

/// Shared record of what a fake page was asked to do.
#[derive(Debug, Default)]
pub struct FakeState {
    pub visited: Vec<String>,
    pub cookies: Vec<CookieSpec>,
    pub clicks: usize,
    pub scrolls: usize,
    pub closed: bool,
}

/// A page serving successive HTML snapshots.
///
/// Each click or scroll advances to the next snapshot; the last one repeats.
#[derive(Clone)]
pub struct FakePage {
    snapshots: Arc<Vec<String>>,
    cursor: Arc<Mutex<usize>>,
    pub state: Arc<Mutex<FakeState>>,
    reject_cookies: Arc<Vec<String>>,
    unreachable: Arc<Vec<String>>,
}

impl FakePage {
    pub fn new(snapshots: Vec<String>) -> Self {
        Self {
            snapshots: Arc::new(snapshots),
            cursor: Arc::new(Mutex::new(0)),
            state: Arc::new(Mutex::new(FakeState::default())),
            reject_cookies: Arc::new(Vec::new()),
            unreachable: Arc::new(Vec::new()),
        }
    }

    /// Reject cookies whose domain is in `domains`; `"*"` rejects all.
    pub fn rejecting_cookies(mut self, domains: &[&str]) -> Self {
        self.reject_cookies = Arc::new(domains.iter().map(|d| d.to_string()).collect());
        self
    }

    pub fn unreachable(mut self, urls: &[&str]) -> Self {
        self.unreachable = Arc::new(urls.iter().map(|u| u.to_string()).collect());
        self
    }

    fn current(&self) -> String {
        let cursor = *self.cursor.lock().unwrap();
        self.snapshots
            .get(cursor.min(self.snapshots.len().saturating_sub(1)))
            .cloned()
            .unwrap_or_default()
    }

    fn advance(&self) {
        let mut cursor = self.cursor.lock().unwrap();
        if *cursor + 1 < self.snapshots.len() {
            *cursor += 1;
        }
    }

    fn select<T>(&self, selector: &str, f: impl FnOnce(Vec<scraper::ElementRef>) -> T) -> Result<T, PageError> {
        let html = Html::parse_document(&self.current());
        let sel = Selector::parse(selector).map_err(|e| PageError::Script(format!("{:?}", e)))?;
        Ok(f(html.select(&sel).collect()))
    }
}

#[async_trait]
impl PageAccessor for FakePage {
    async fn navigate(&self, url: &str) -> Result<(), PageError> {
        if self.unreachable.iter().any(|u| u == url) {
            return Err(PageError::Navigation {
                url: url.to_string(),
                reason: "unreachable".to_string(),
            });
        }
        self.state.lock().unwrap().visited.push(url.to_string());
        Ok(())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), PageError> {
        if self.count(selector).await? > 0 {
            Ok(())
        } else {
            Err(PageError::WaitTimeout {
                selector: selector.to_string(),
                timeout,
            })
        }
    }

    async fn count(&self, selector: &str) -> Result<usize, PageError> {
        self.select(selector, |els| els.len())
    }

    async fn text(&self, selector: &str) -> Result<Option<String>, PageError> {
        self.select(selector, |els| els.first().map(|e| e.text().collect::<String>()))
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>, PageError> {
        self.select(selector, |els| {
            els.first()
                .and_then(|e| e.value().attr(name))
                .map(|v| v.to_string())
        })
    }

    async fn click(&self, selector: &str) -> Result<(), PageError> {
        if self.count(selector).await? == 0 {
            return Err(PageError::NotFound(selector.to_string()));
        }
        self.state.lock().unwrap().clicks += 1;
        self.advance();
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> Result<(), PageError> {
        self.state.lock().unwrap().scrolls += 1;
        self.advance();
        Ok(())
    }

    async fn content(&self) -> Result<String, PageError> {
        Ok(self.current())
    }

    async fn set_cookie(&self, cookie: &CookieSpec) -> Result<(), PageError> {
        if self
            .reject_cookies
            .iter()
            .any(|d| d == "*" || *d == cookie.domain)
        {
            return Err(PageError::Cookie {
                name: cookie.name.clone(),
                reason: "rejected".to_string(),
            });
        }
        self.state.lock().unwrap().cookies.push(cookie.clone());
        Ok(())
    }

    async fn close(&self) {
        self.state.lock().unwrap().closed = true;
    }
}

/// Launcher whose every launch returns a clone of one prepared page.
pub struct FakeLauncher {
    page: FakePage,
}

impl FakeLauncher {
    pub fn new(page: FakePage) -> Self {
        Self { page }
    }
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn PageAccessor>, PageError> {
        Ok(Box::new(self.page.clone()))
    }
}

/// Launcher that always fails, for drivers that must not touch a browser.
pub struct FailingLauncher;

#[async_trait]
impl SessionLauncher for FailingLauncher {
    async fn launch(&self) -> Result<Box<dyn PageAccessor>, PageError> {
        Err(PageError::Launch("no browser in tests".to_string()))
    }
}
