//! Chromium-backed page accessor.
//!
//! Each launch starts (or connects to) a browser, opens one page with a
//! realistic user agent and stealth patches, and hands it to the driver.
//! Dropping the page aborts the CDP handler task and the browser process
//! goes with it.

mod config;
#[cfg(feature = "browser")]
mod stealth;

pub use config::BrowserEngineConfig;

#[cfg(feature = "browser")]
pub use chromium::{ChromiumLauncher, ChromiumPage};

#[cfg(not(feature = "browser"))]
pub use stub::ChromiumLauncher;

#[cfg(feature = "browser")]
mod chromium {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chromiumoxide::cdp::browser_protocol::network::{
        CookieParam, SetUserAgentOverrideParams, TimeSinceEpoch,
    };
    use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
    use chromiumoxide::{Browser, BrowserConfig, Page};
    use futures::StreamExt;
    use tokio::sync::Mutex;
    use tokio::task::JoinHandle;
    use tracing::{debug, info, warn};

    use super::config::BrowserEngineConfig;
    use super::stealth;
    use crate::scrapers::error::PageError;
    use crate::scrapers::page::{CookieSpec, PageAccessor, SessionLauncher};

    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &[&str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];

    const CHROME_COMMANDS: &[&str] = &[
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ];

    const POLL_INTERVAL: Duration = Duration::from_millis(250);

    fn find_chrome() -> Result<PathBuf, PageError> {
        for path in CHROME_PATHS {
            let p = Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in CHROME_COMMANDS {
            if let Ok(path) = which::which(cmd) {
                info!("Found Chrome in PATH: {}", path.display());
                return Ok(path);
            }
        }

        Err(PageError::Launch(
            "Chrome/Chromium not found. Install chromium or google-chrome, \
             or set scraper.remote_url to an existing DevTools endpoint"
                .to_string(),
        ))
    }

    fn script_error(e: impl std::fmt::Display) -> PageError {
        PageError::Script(e.to_string())
    }

    /// Launches one isolated Chromium session per run.
    pub struct ChromiumLauncher {
        config: BrowserEngineConfig,
    }

    impl ChromiumLauncher {
        pub fn new(config: BrowserEngineConfig) -> Self {
            Self { config }
        }

        async fn start_browser(&self) -> Result<(Browser, JoinHandle<()>), PageError> {
            let (browser, mut handler) = match self.config.remote_url.as_deref() {
                Some(url) => self.connect_remote(url).await?,
                None => {
                    info!("Launching browser (headless={})", self.config.headless);
                    let mut builder = BrowserConfig::builder().chrome_executable(find_chrome()?);

                    // with_head means NOT headless
                    if !self.config.headless {
                        builder = builder.with_head();
                    }

                    builder = builder
                        .arg("--disable-blink-features=AutomationControlled")
                        .arg("--disable-infobars")
                        .arg("--disable-dev-shm-usage")
                        .arg("--no-first-run")
                        .arg("--no-default-browser-check")
                        .arg("--no-sandbox")
                        .arg("--disable-gpu");

                    for arg in &self.config.chrome_args {
                        builder = builder.arg(arg);
                    }

                    let config = builder.build().map_err(PageError::Launch)?;
                    Browser::launch(config)
                        .await
                        .map_err(|e| PageError::Launch(e.to_string()))?
                }
            };

            let handle = tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });

            Ok((browser, handle))
        }

        async fn connect_remote(
            &self,
            url: &str,
        ) -> Result<(Browser, chromiumoxide::Handler), PageError> {
            info!("Connecting to remote browser at {}", url);

            // The WebSocket URL comes from the /json/version endpoint
            let http_url = url
                .replace("ws://", "http://")
                .replace("wss://", "https://");
            let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

            let resp: serde_json::Value = reqwest::Client::new()
                .get(&version_url)
                .send()
                .await
                .map_err(|e| PageError::Launch(format!("remote browser unreachable: {}", e)))?
                .json()
                .await
                .map_err(|e| PageError::Launch(format!("bad version info: {}", e)))?;

            let ws_url = resp
                .get("webSocketDebuggerUrl")
                .and_then(|v| v.as_str())
                .ok_or_else(|| PageError::Launch("no webSocketDebuggerUrl in response".into()))?;

            let handler_config = chromiumoxide::handler::HandlerConfig {
                request_timeout: Duration::from_secs(self.config.timeout),
                ..Default::default()
            };

            Browser::connect_with_config(ws_url, handler_config)
                .await
                .map_err(|e| PageError::Launch(e.to_string()))
        }
    }

    #[async_trait]
    impl SessionLauncher for ChromiumLauncher {
        async fn launch(&self) -> Result<Box<dyn PageAccessor>, PageError> {
            let (browser, handler) = self.start_browser().await?;

            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| PageError::Launch(e.to_string()))?;

            page.execute(SetUserAgentOverrideParams::new(self.config.user_agent.clone()))
                .await
                .map_err(|e| PageError::Launch(e.to_string()))?;

            if let Err(e) = page
                .execute(AddScriptToEvaluateOnNewDocumentParams::new(stealth::combined()))
                .await
            {
                debug!("Stealth script installation skipped: {}", e);
            }

            Ok(Box::new(ChromiumPage {
                browser: Arc::new(Mutex::new(browser)),
                page,
                handler,
                timeout: Duration::from_secs(self.config.timeout),
            }))
        }
    }

    /// One page in a launched browser.
    pub struct ChromiumPage {
        browser: Arc<Mutex<Browser>>,
        page: Page,
        handler: JoinHandle<()>,
        timeout: Duration,
    }

    impl ChromiumPage {
        async fn eval<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T, PageError> {
            self.page
                .evaluate(script)
                .await
                .map_err(script_error)?
                .into_value()
                .map_err(script_error)
        }
    }

    /// JSON-quote a selector for embedding in a script.
    fn quoted(selector: &str) -> String {
        serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string())
    }

    #[async_trait]
    impl PageAccessor for ChromiumPage {
        async fn navigate(&self, url: &str) -> Result<(), PageError> {
            info!("Navigating to {}", url);
            let navigation_error = |e: chromiumoxide::error::CdpError| PageError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            };

            match tokio::time::timeout(self.timeout, async {
                self.page.goto(url).await.map_err(navigation_error)?;
                self.page
                    .wait_for_navigation()
                    .await
                    .map_err(navigation_error)?;
                Ok::<(), PageError>(())
            })
            .await
            {
                Ok(result) => result,
                Err(_) => Err(PageError::Navigation {
                    url: url.to_string(),
                    reason: format!("timed out after {:?}", self.timeout),
                }),
            }
        }

        async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), PageError> {
            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                if self.page.find_element(selector).await.is_ok() {
                    return Ok(());
                }
                if tokio::time::Instant::now() >= deadline {
                    return Err(PageError::WaitTimeout {
                        selector: selector.to_string(),
                        timeout,
                    });
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }

        async fn count(&self, selector: &str) -> Result<usize, PageError> {
            self.eval(format!(
                "document.querySelectorAll({}).length",
                quoted(selector)
            ))
            .await
        }

        // Lookups return a zero- or one-element array; a bare null does not
        // survive the CDP round trip as a value.
        async fn text(&self, selector: &str) -> Result<Option<String>, PageError> {
            let found: Vec<String> = self
                .eval(format!(
                    "(() => {{ const el = document.querySelector({}); return el ? [el.textContent] : []; }})()",
                    quoted(selector)
                ))
                .await?;
            Ok(found.into_iter().next())
        }

        async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>, PageError> {
            let found: Vec<String> = self
                .eval(format!(
                    "(() => {{ const el = document.querySelector({}); const v = el && el.getAttribute({}); return v === null || v === undefined ? [] : [v]; }})()",
                    quoted(selector),
                    quoted(name)
                ))
                .await?;
            Ok(found.into_iter().next())
        }

        async fn click(&self, selector: &str) -> Result<(), PageError> {
            let element = self
                .page
                .find_element(selector)
                .await
                .map_err(|_| PageError::NotFound(selector.to_string()))?;
            element.click().await.map_err(script_error)?;
            Ok(())
        }

        async fn scroll_to_bottom(&self) -> Result<(), PageError> {
            self.page
                .evaluate("window.scrollTo(0, document.body.scrollHeight)")
                .await
                .map_err(script_error)?;
            Ok(())
        }

        async fn content(&self) -> Result<String, PageError> {
            self.page.content().await.map_err(script_error)
        }

        async fn set_cookie(&self, cookie: &CookieSpec) -> Result<(), PageError> {
            let mut builder = CookieParam::builder()
                .name(cookie.name.clone())
                .value(cookie.value.clone())
                .domain(cookie.domain.clone())
                .path(cookie.path.clone())
                .secure(cookie.secure)
                .http_only(cookie.http_only);
            if let Some(expires) = cookie.expires {
                builder = builder.expires(TimeSinceEpoch::new(expires.timestamp() as f64));
            }

            let param = builder.build().map_err(|reason| PageError::Cookie {
                name: cookie.name.clone(),
                reason,
            })?;

            self.page
                .set_cookie(param)
                .await
                .map_err(|e| PageError::Cookie {
                    name: cookie.name.clone(),
                    reason: e.to_string(),
                })?;
            Ok(())
        }

        async fn close(&self) {
            if let Err(e) = self.page.clone().close().await {
                debug!("Page close failed: {}", e);
            }
            if let Err(e) = self.browser.lock().await.close().await {
                warn!("Browser close failed: {}", e);
            }
            self.handler.abort();
        }
    }

    impl Drop for ChromiumPage {
        fn drop(&mut self) {
            self.handler.abort();
        }
    }
}

#[cfg(not(feature = "browser"))]
mod stub {
    use async_trait::async_trait;

    use super::config::BrowserEngineConfig;
    use crate::scrapers::error::PageError;
    use crate::scrapers::page::{PageAccessor, SessionLauncher};

    /// Stand-in when browser support is compiled out. Every launch fails.
    pub struct ChromiumLauncher {
        #[allow(dead_code)]
        config: BrowserEngineConfig,
    }

    impl ChromiumLauncher {
        pub fn new(config: BrowserEngineConfig) -> Self {
            Self { config }
        }
    }

    #[async_trait]
    impl SessionLauncher for ChromiumLauncher {
        async fn launch(&self) -> Result<Box<dyn PageAccessor>, PageError> {
            Err(PageError::Unsupported)
        }
    }
}
