//! Amazon Video watch-history driver.
//!
//! The history page renders date sections holding one container per show;
//! watched episodes are listed inside the container. More sections appear
//! as the page is scrolled.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveTime};
use tracing::info;

use super::driver::{DriverSetup, HarvestContext, HarvestDriver};
use super::error::{HarvestError, PageError};
use super::extract::{self, RawItem};
use super::normalize::{estimate_duration, timestamp_or_default, DateNormalizer};
use super::page::PageAccessor;
use super::pagination::{paginate, Feed, Observation};
use super::session::{CookieScope, HttpOnly, SessionPlan};
use crate::config::CookieConfig;
use crate::models::ActivityRecord;

pub const PLATFORM_NAME: &str = "Amazon Video";

const HISTORY_URL: &str = "https://www.amazon.com/gp/video/settings/watch-history";
const READY_SELECTOR: &str = "body";
const READY_TIMEOUT: Duration = Duration::from_secs(30);

const SESSION: SessionPlan = SessionPlan {
    landing_url: "https://www.amazon.com",
    scopes: &[CookieScope {
        domain: ".amazon.com",
        secure: true,
        http_only: HttpOnly::Never,
        expires_in_days: Some(365),
    }],
};

pub struct AmazonDriver {
    setup: DriverSetup,
}

impl AmazonDriver {
    pub fn new(setup: DriverSetup) -> Self {
        Self { setup }
    }

    async fn collect(
        &self,
        page: &dyn PageAccessor,
        cookies: &[CookieConfig],
        ctx: &HarvestContext<'_>,
    ) -> Result<Vec<ActivityRecord>, HarvestError> {
        SESSION.bootstrap(page, cookies).await?;

        page.navigate(HISTORY_URL).await.map_err(navigation)?;
        page.wait_for(READY_SELECTOR, READY_TIMEOUT)
            .await
            .map_err(navigation)?;

        let feed = AmazonFeed {
            ctx,
            normalizer: self.setup.normalizer(),
        };
        let summary = paginate(page, &feed, &self.setup.policy()).await;

        let html = page.content().await.map_err(navigation)?;
        let extraction = extract::amazon_sections(&html);
        info!(
            "Amazon Video: {} entries rendered, {} records, {} dropped ({:?})",
            extraction.rendered,
            extraction.items.len(),
            extraction.dropped,
            summary.reason
        );

        let records = extraction.items.iter().map(|item| feed.record(item)).collect();
        Ok(self.setup.cap(records))
    }
}

fn navigation(e: PageError) -> HarvestError {
    HarvestError::Navigation(e.to_string())
}

#[async_trait]
impl HarvestDriver for AmazonDriver {
    fn identify(&self) -> &str {
        PLATFORM_NAME
    }

    async fn harvest(&self, ctx: &HarvestContext<'_>) -> Result<Vec<ActivityRecord>, HarvestError> {
        let cookies = self.setup.require_ready(PLATFORM_NAME)?;
        let page = self.setup.open_session().await?;
        let result = self.collect(page.as_ref(), cookies, ctx).await;
        page.close().await;
        result
    }
}

struct AmazonFeed<'a> {
    ctx: &'a HarvestContext<'a>,
    normalizer: DateNormalizer,
}

impl AmazonFeed<'_> {
    /// Episodes are stored as "Show - Episode" with the episode as label.
    fn record(&self, item: &RawItem) -> ActivityRecord {
        let title = match &item.episode {
            Some(episode) => format!("{} - {}", item.title, episode),
            None => item.title.clone(),
        };
        let parsed = self
            .normalizer
            .parse_date(item.date_text.as_deref().unwrap_or_default())
            .map(|d| d.and_time(NaiveTime::MIN));
        let watched_at = timestamp_or_default(parsed, &title);
        let duration = estimate_duration(item.episode.as_deref());
        ActivityRecord::new(
            self.ctx.platform.id,
            title,
            item.episode.clone(),
            watched_at,
            duration,
        )
    }
}

#[async_trait]
impl Feed for AmazonFeed<'_> {
    /// Scrolling is always possible; stability decides when the feed ends.
    async fn load_more(&self, page: &dyn PageAccessor) -> Result<bool, PageError> {
        page.scroll_to_bottom().await?;
        Ok(true)
    }

    async fn observe(&self, page: &dyn PageAccessor) -> Result<Observation, PageError> {
        let html = page.content().await?;
        let extraction = extract::amazon_sections(&html);

        let mut obs = Observation {
            rendered: extraction.rendered,
            ..Default::default()
        };
        if let Some(last) = extraction.last() {
            obs.last_year = last
                .date_text
                .as_deref()
                .and_then(|d| self.normalizer.parse_date(d).ok())
                .map(|d| d.year());
            obs.last_known = self.ctx.is_known(&self.record(last)).await;
        }
        Ok(obs)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{NaiveDate, TimeZone, Utc};

    use super::*;
    use crate::config::{PlatformConfig, ScraperSettings};
    use crate::models::PlatformLookup;
    use crate::repository::{DbContext, HistoryStore};
    use crate::scrapers::testing::{FailingLauncher, FakeLauncher, FakePage};

    fn section(date: &str, containers: &[(&str, &[&str])]) -> String {
        let body: String = containers
            .iter()
            .map(|(title, episodes)| {
                let eps: String = episodes
                    .iter()
                    .map(|e| format!(r#"<li><p class="vTfuZU">{}</p></li>"#, e))
                    .collect();
                format!(
                    r#"<div class="_6YbHut"><a class="_1NNx6V ZrYV9r" href="/detail">{}</a><ul>{}</ul></div>"#,
                    title, eps
                )
            })
            .collect();
        format!(r#"<div class="RdNoU_ j98KWz"><h3>{}</h3>{}</div>"#, date, body)
    }

    fn page() -> FakePage {
        let first = section("March 3, 2025", &[("The Boys", &["Season 4, Ep. 1", "Season 4, Ep. 2"])]);
        let second = section("February 27, 2025", &[("Saltburn", &[])]);
        FakePage::new(vec![
            format!("<html><body>{}</body></html>", first),
            format!("<html><body>{}{}</body></html>", first, second),
        ])
    }

    fn setup(page: FakePage, enabled: bool) -> DriverSetup {
        let config = PlatformConfig {
            enabled,
            cookies: vec![CookieConfig {
                name: "session-id".to_string(),
                value: "123".to_string(),
            }],
            ..Default::default()
        };
        let settings = ScraperSettings {
            settle_ms: 0,
            ..Default::default()
        };
        let now = NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        DriverSetup::new(config, settings, Arc::new(FakeLauncher::new(page))).with_clock(now)
    }

    #[tokio::test]
    async fn test_episodes_expand_to_records() {
        let dir = tempfile::tempdir().unwrap();
        let db = DbContext::new(&dir.path().join("test.db"));
        db.init_schema().await.unwrap();
        let repo = db.history();
        let platform = repo.find_platform(PLATFORM_NAME).await.unwrap().unwrap();
        let lookup = PlatformLookup::new(repo.list_platforms().await.unwrap());

        let page = page();
        let ctx = HarvestContext {
            store: &repo,
            platforms: &lookup,
            platform: &platform,
        };
        let records = AmazonDriver::new(setup(page.clone(), true))
            .harvest(&ctx)
            .await
            .unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].title, "The Boys - Season 4, Ep. 1");
        assert_eq!(records[0].episode_info.as_deref(), Some("Season 4, Ep. 1"));
        assert_eq!(records[0].duration_minutes, 40);
        assert_eq!(records[2].title, "Saltburn");
        assert_eq!(records[2].duration_minutes, 105);
        assert_eq!(
            records[2].watched_at,
            Utc.with_ymd_and_hms(2025, 2, 27, 0, 0, 0).unwrap()
        );

        let state = page.state.lock().unwrap();
        let cookie = &state.cookies[0];
        assert_eq!(cookie.domain, ".amazon.com");
        assert!(cookie.secure);
        assert!(!cookie.http_only);
        assert!(cookie.expires.is_some());
        assert!(state.scrolls >= 4);
    }

    #[tokio::test]
    async fn test_configuration_checked_before_launch() {
        let dir = tempfile::tempdir().unwrap();
        let db = DbContext::new(&dir.path().join("test.db"));
        db.init_schema().await.unwrap();
        let repo = db.history();
        let platform = repo.find_platform(PLATFORM_NAME).await.unwrap().unwrap();
        let lookup = PlatformLookup::default();

        let mut s = setup(page(), false);
        // A launch would fail with a session error; the config check comes first.
        s.launcher = Arc::new(FailingLauncher);
        let ctx = HarvestContext {
            store: &repo,
            platforms: &lookup,
            platform: &platform,
        };
        let err = AmazonDriver::new(s).harvest(&ctx).await.unwrap_err();
        assert!(matches!(err, HarvestError::Configuration(_)));
    }
}
