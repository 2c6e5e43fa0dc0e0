//! The harvest driver contract and what every driver shares.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tracing::warn;

use super::error::{HarvestError, ItemError};
use super::normalize::DateNormalizer;
use super::page::{PageAccessor, SessionLauncher};
use super::pagination::StopPolicy;
use crate::config::{CookieConfig, PlatformConfig, ScraperSettings};
use crate::models::{ActivityRecord, PlatformIdentity, PlatformLookup};
use crate::repository::HistoryStore;

/// What a driver receives for one invocation.
///
/// The store is only consulted for existence checks while paginating;
/// persisting results is the manager's job.
pub struct HarvestContext<'a> {
    pub store: &'a dyn HistoryStore,
    /// Platform identities resolved once for the whole invocation.
    pub platforms: &'a PlatformLookup,
    /// The platform this driver is registered for.
    pub platform: &'a PlatformIdentity,
}

impl HarvestContext<'_> {
    /// Existence check that degrades to "unknown" on store errors.
    pub async fn is_known(&self, record: &ActivityRecord) -> bool {
        match self
            .store
            .already_stored(
                record.platform_id,
                &record.title,
                record.episode_label(),
                record.watched_at,
            )
            .await
        {
            Ok(exists) => exists,
            Err(e) => {
                warn!("Existence check failed for '{}': {}", record.title, e);
                false
            }
        }
    }
}

/// A platform-specific watch-history harvester.
#[async_trait]
pub trait HarvestDriver: Send + Sync {
    /// Display name of the platform the driver harvests, as stored.
    fn identify(&self) -> &str;

    /// Collect activity records from an authenticated browser session.
    async fn harvest(&self, ctx: &HarvestContext<'_>) -> Result<Vec<ActivityRecord>, HarvestError>;
}

/// Configuration and capabilities common to the browser drivers.
#[derive(Clone)]
pub struct DriverSetup {
    pub config: PlatformConfig,
    pub settings: ScraperSettings,
    pub launcher: Arc<dyn SessionLauncher>,
    /// Fixed clock for date normalization; `None` uses local now per run.
    pub now: Option<NaiveDateTime>,
}

impl DriverSetup {
    pub fn new(
        config: PlatformConfig,
        settings: ScraperSettings,
        launcher: Arc<dyn SessionLauncher>,
    ) -> Self {
        Self {
            config,
            settings,
            launcher,
            now: None,
        }
    }

    pub fn with_clock(mut self, now: NaiveDateTime) -> Self {
        self.now = Some(now);
        self
    }

    pub fn normalizer(&self) -> DateNormalizer {
        self.now.map(DateNormalizer::new).unwrap_or_default()
    }

    pub fn policy(&self) -> StopPolicy {
        StopPolicy::from(&self.settings)
    }

    /// Reject a disabled or token-less platform before any browser work.
    pub fn require_ready(&self, platform: &str) -> Result<&[CookieConfig], HarvestError> {
        if !self.config.enabled {
            return Err(HarvestError::Configuration(format!(
                "{} is disabled",
                platform
            )));
        }
        if self.config.cookies.is_empty() {
            return Err(HarvestError::Configuration(format!(
                "{} has no authentication cookies configured",
                platform
            )));
        }
        Ok(&self.config.cookies)
    }

    /// Open an isolated session for one run.
    pub async fn open_session(&self) -> Result<Box<dyn PageAccessor>, HarvestError> {
        self.launcher
            .launch()
            .await
            .map_err(|e| HarvestError::Session(e.to_string()))
    }

    /// Apply the test-mode cap to a finished harvest.
    pub fn cap(&self, mut records: Vec<ActivityRecord>) -> Vec<ActivityRecord> {
        if let Some(limit) = self.settings.item_limit() {
            records.truncate(limit);
        }
        records
    }
}

/// Log a dropped or defaulted item.
pub(crate) fn report(err: ItemError) {
    warn!("{}", err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::testing::FailingLauncher;

    fn setup(config: PlatformConfig) -> DriverSetup {
        DriverSetup::new(config, ScraperSettings::default(), Arc::new(FailingLauncher))
    }

    #[test]
    fn test_disabled_platform_is_configuration_error() {
        let s = setup(PlatformConfig {
            enabled: false,
            cookies: vec![CookieConfig {
                name: "a".to_string(),
                value: "b".to_string(),
            }],
            ..Default::default()
        });
        assert!(matches!(
            s.require_ready("Netflix"),
            Err(HarvestError::Configuration(_))
        ));
    }

    #[test]
    fn test_missing_cookies_is_configuration_error() {
        let s = setup(PlatformConfig {
            enabled: true,
            ..Default::default()
        });
        assert!(matches!(
            s.require_ready("Netflix"),
            Err(HarvestError::Configuration(_))
        ));
    }

    #[test]
    fn test_cap_only_in_test_mode() {
        let mut s = setup(PlatformConfig::default());
        let records: Vec<ActivityRecord> = (0..15)
            .map(|i| ActivityRecord::new(1, format!("t{}", i), None, chrono::Utc::now(), 105))
            .collect();
        assert_eq!(s.cap(records.clone()).len(), 15);

        s.settings.test_mode = true;
        assert_eq!(s.cap(records).len(), 10);
    }
}
