//! Netflix viewing-activity driver.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveTime};
use tracing::info;

use super::driver::{DriverSetup, HarvestContext, HarvestDriver};
use super::error::{HarvestError, PageError};
use super::extract::{self, RawItem};
use super::normalize::{
    estimate_duration, normalize_episode_code, split_title, timestamp_or_default, DateNormalizer,
};
use super::page::PageAccessor;
use super::pagination::{paginate, Feed, Observation};
use super::session::{CookieScope, HttpOnly, SessionPlan};
use crate::config::CookieConfig;
use crate::models::ActivityRecord;

pub const PLATFORM_NAME: &str = "Netflix";

const HISTORY_URL: &str = "https://www.netflix.com/viewingactivity";
const ROW: &str = ".retableRow";
const SHOW_MORE: &str = "button.btn-blue.btn-small";
const READY_TIMEOUT: Duration = Duration::from_secs(30);

const SESSION: SessionPlan = SessionPlan {
    landing_url: "https://www.netflix.com",
    scopes: &[CookieScope {
        domain: ".netflix.com",
        secure: true,
        http_only: HttpOnly::Always,
        expires_in_days: None,
    }],
};

pub struct NetflixDriver {
    setup: DriverSetup,
}

impl NetflixDriver {
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
        page.wait_for(ROW, READY_TIMEOUT).await.map_err(navigation)?;

        let feed = NetflixFeed {
            ctx,
            normalizer: self.setup.normalizer(),
        };
        let summary = paginate(page, &feed, &self.setup.policy()).await;

        let html = page.content().await.map_err(navigation)?;
        let extraction = extract::netflix_rows(&html);
        info!(
            "Netflix: {} rows rendered, {} extracted, {} dropped ({:?})",
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
impl HarvestDriver for NetflixDriver {
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

struct NetflixFeed<'a> {
    ctx: &'a HarvestContext<'a>,
    normalizer: DateNormalizer,
}

impl NetflixFeed<'_> {
    /// "Show: Season 1: Episode" rows split into title and episode label,
    /// with "S1:E5" codes rewritten as "S01E05".
    fn record(&self, item: &RawItem) -> ActivityRecord {
        let (title, episode) = split_title(&item.title);
        let episode = episode.map(|e| normalize_episode_code(&e));
        let parsed = self
            .normalizer
            .parse_date(item.date_text.as_deref().unwrap_or_default())
            .map(|d| d.and_time(NaiveTime::MIN));
        let watched_at = timestamp_or_default(parsed, &title);
        let duration = estimate_duration(episode.as_deref());
        ActivityRecord::new(self.ctx.platform.id, title, episode, watched_at, duration)
    }
}

#[async_trait]
impl Feed for NetflixFeed<'_> {
    async fn load_more(&self, page: &dyn PageAccessor) -> Result<bool, PageError> {
        if page.count(SHOW_MORE).await? == 0 {
            return Ok(false);
        }
        // The button stays rendered but disabled once the feed is exhausted.
        if page.attribute(SHOW_MORE, "disabled").await?.is_some() {
            return Ok(false);
        }
        page.click(SHOW_MORE).await?;
        Ok(true)
    }

    async fn observe(&self, page: &dyn PageAccessor) -> Result<Observation, PageError> {
        let html = page.content().await?;
        let extraction = extract::netflix_rows(&html);

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
