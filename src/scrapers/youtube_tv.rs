//! YouTube TV driver, fed from Google My Activity.
//!
//! The YouTube activity feed mixes YouTube TV and regular YouTube entries.
//! Each item carries a product label; the label alone decides which
//! platform an item is stored under.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Datelike;
use tracing::{info, warn};

use super::driver::{report, DriverSetup, HarvestContext, HarvestDriver};
use super::error::{HarvestError, ItemError, PageError};
use super::extract::{self, RawItem};
use super::normalize::{timestamp_or_default, DateNormalizer, DurationHeuristic};
use super::page::PageAccessor;
use super::pagination::{paginate, Feed, Observation};
use super::session::{CookieScope, HttpOnly, SessionPlan};
use crate::config::CookieConfig;
use crate::models::ActivityRecord;

pub const PLATFORM_NAME: &str = "YouTube TV";
pub const YOUTUBE_PLATFORM_NAME: &str = "YouTube";

const HISTORY_URL: &str = "https://myactivity.google.com/product/youtube";
const READY_SELECTOR: &str = "body";
const READY_TIMEOUT: Duration = Duration::from_secs(30);

const GOOGLE_SCOPES: &[CookieScope] = &[
    CookieScope {
        domain: ".google.com",
        secure: true,
        http_only: HttpOnly::UnlessNameContains("APISID"),
        expires_in_days: None,
    },
    CookieScope {
        domain: ".accounts.google.com",
        secure: true,
        http_only: HttpOnly::UnlessNameContains("APISID"),
        expires_in_days: None,
    },
];

const SESSION: SessionPlan = SessionPlan {
    landing_url: "https://myactivity.google.com",
    scopes: GOOGLE_SCOPES,
};

/// Product label on a My Activity item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedLabel {
    YouTubeTv,
    YouTube,
}

impl FeedLabel {
    /// Exact label match. Anything else is not ours to store.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim() {
            "YouTube TV" => Some(Self::YouTubeTv),
            "YouTube" => Some(Self::YouTube),
            _ => None,
        }
    }

    /// Stored platform name for items with this label.
    pub fn platform_name(self) -> &'static str {
        match self {
            Self::YouTubeTv => PLATFORM_NAME,
            Self::YouTube => YOUTUBE_PLATFORM_NAME,
        }
    }
}

pub struct YouTubeTvDriver {
    setup: DriverSetup,
}

impl YouTubeTvDriver {
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

        if let Ok(Some(body)) = page.text("body").await {
            if body.contains("Sign in") {
                warn!("My Activity shows a sign-in prompt; cookies may have expired");
            }
        }

        let feed = ActivityFeed {
            ctx,
            normalizer: self.setup.normalizer(),
        };
        let summary = paginate(page, &feed, &self.setup.policy()).await;

        let html = page.content().await.map_err(navigation)?;
        let extraction = extract::activity_feed(&html);

        let records: Vec<ActivityRecord> = extraction
            .items
            .iter()
            .filter_map(|item| match feed.record(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    report(e);
                    None
                }
            })
            .collect();

        info!(
            "YouTube: {} items rendered, {} records, {} dropped ({:?})",
            extraction.rendered,
            records.len(),
            extraction.rendered - records.len(),
            summary.reason
        );

        Ok(self.setup.cap(records))
    }
}

fn navigation(e: PageError) -> HarvestError {
    HarvestError::Navigation(e.to_string())
}

#[async_trait]
impl HarvestDriver for YouTubeTvDriver {
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

struct ActivityFeed<'a> {
    ctx: &'a HarvestContext<'a>,
    normalizer: DateNormalizer,
}

impl ActivityFeed<'_> {
    /// Map an item to a record under the platform its label names.
    ///
    /// The label is kept as the episode field. It describes the source, not
    /// an episode, so the duration estimate ignores it.
    fn record(&self, item: &RawItem) -> Result<ActivityRecord, ItemError> {
        let label = item.label.as_deref().unwrap_or_default();
        let target = FeedLabel::parse(label).ok_or_else(|| {
            ItemError::Extraction(format!(
                "'{}' has unknown platform label '{}'",
                item.title, label
            ))
        })?;
        let platform_id = self
            .ctx
            .platforms
            .id_of(target.platform_name())
            .ok_or_else(|| {
                ItemError::Extraction(format!(
                    "platform {} is not in the store",
                    target.platform_name()
                ))
            })?;

        let parsed = self.normalizer.parse_date_and_time(
            item.date_text.as_deref().unwrap_or_default(),
            item.time_text.as_deref().unwrap_or_default(),
        );
        let watched_at = timestamp_or_default(parsed, &item.title);

        Ok(ActivityRecord::new(
            platform_id,
            item.title.clone(),
            Some(label.trim().to_string()),
            watched_at,
            DurationHeuristic::SHORT_FORM.estimate(None),
        ))
    }
}

#[async_trait]
impl Feed for ActivityFeed<'_> {
    async fn load_more(&self, page: &dyn PageAccessor) -> Result<bool, PageError> {
        page.scroll_to_bottom().await?;
        Ok(true)
    }

    async fn observe(&self, page: &dyn PageAccessor) -> Result<Observation, PageError> {
        let html = page.content().await?;
        let extraction = extract::activity_feed(&html);

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
            if let Ok(record) = self.record(last) {
                obs.last_known = self.ctx.is_known(&record).await;
            }
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
    use crate::scrapers::testing::{FakeLauncher, FakePage};

    fn item(title: &str, label: &str, time: &str) -> String {
        format!(
            r#"<div jsname="MFYZYe"><div class="QTGV3c"><span class="hJ7x8b">{}</span></div><a class="l8sGWb" href="https://youtube.com/watch">{}</a><div class="wlgrwd">{} • Details</div></div>"#,
            label, title, time
        )
    }

    fn feed_html() -> String {
        format!(
            r#"<html><body><div class="rp10kf">Yesterday</div>{}{}<div class="rp10kf">Oct 27</div>{}</body></html>"#,
            item("NBA Finals Game 7", "YouTube TV", "9:15 PM"),
            item("Rust in 100 Seconds", "YouTube", "6:00 PM"),
            item("Some Podcast", "YouTube Music", "8:00 AM"),
        )
    }

    #[test]
    fn test_feed_label_is_closed() {
        assert_eq!(FeedLabel::parse("YouTube TV"), Some(FeedLabel::YouTubeTv));
        assert_eq!(FeedLabel::parse(" YouTube "), Some(FeedLabel::YouTube));
        assert_eq!(FeedLabel::parse("YouTube Music"), None);
        assert_eq!(FeedLabel::parse(""), None);
    }

    #[tokio::test]
    async fn test_items_routed_by_label() {
        let dir = tempfile::tempdir().unwrap();
        let db = DbContext::new(&dir.path().join("test.db"));
        db.init_schema().await.unwrap();
        let repo = db.history();
        let platform = repo.find_platform(PLATFORM_NAME).await.unwrap().unwrap();
        let lookup = PlatformLookup::new(repo.list_platforms().await.unwrap());

        let page = FakePage::new(vec![feed_html()]);
        let config = PlatformConfig {
            enabled: true,
            cookies: vec![
                CookieConfig {
                    name: "SID".to_string(),
                    value: "x".to_string(),
                },
                CookieConfig {
                    name: "SAPISID".to_string(),
                    value: "y".to_string(),
                },
            ],
            ..Default::default()
        };
        let settings = ScraperSettings {
            settle_ms: 0,
            ..Default::default()
        };
        let now = NaiveDate::from_ymd_opt(2025, 11, 5)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let setup =
            DriverSetup::new(config, settings, Arc::new(FakeLauncher::new(page.clone()))).with_clock(now);

        let ctx = HarvestContext {
            store: &repo,
            platforms: &lookup,
            platform: &platform,
        };
        let records = YouTubeTvDriver::new(setup).harvest(&ctx).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].platform_id, platform.id);
        assert_eq!(records[0].episode_info.as_deref(), Some("YouTube TV"));
        assert_eq!(records[0].duration_minutes, 60);
        assert_eq!(
            records[0].watched_at,
            Utc.with_ymd_and_hms(2025, 11, 4, 21, 15, 0).unwrap()
        );
        assert_eq!(records[1].platform_id, lookup.id_of("YouTube").unwrap());
        assert_ne!(records[1].platform_id, platform.id);

        let state = page.state.lock().unwrap();
        assert_eq!(state.cookies.len(), 4);
        assert!(state.cookies.iter().any(|c| c.name == "SAPISID" && !c.http_only));
        assert!(state.cookies.iter().any(|c| c.domain == ".accounts.google.com"));
    }
}
