//! Watch-history harvesting from streaming platforms.
//!
//! Drivers run one platform each inside a fresh browser session. The
//! [`HarvestManager`] persists their results and records run outcomes.

pub mod amazon;
pub mod browser;
pub mod driver;
pub mod error;
pub mod extract;
pub mod manager;
pub mod netflix;
pub mod normalize;
pub mod page;
pub mod pagination;
pub mod session;
#[cfg(test)]
mod testing;
pub mod youtube_tv;

use std::sync::Arc;

pub use amazon::AmazonDriver;
pub use browser::{BrowserEngineConfig, ChromiumLauncher};
pub use driver::{DriverSetup, HarvestContext, HarvestDriver};
pub use error::{HarvestError, ItemError, PageError};
pub use manager::HarvestManager;
pub use netflix::NetflixDriver;
pub use page::{CookieSpec, PageAccessor, SessionLauncher};
pub use pagination::{HaltReason, StopController, StopPolicy};
pub use youtube_tv::{FeedLabel, YouTubeTvDriver};

use crate::config::{Config, AMAZON_KEY, NETFLIX_KEY, YOUTUBE_TV_KEY};

/// The platforms with a driver: config key and stored display name.
pub const DRIVER_PLATFORMS: &[(&str, &str)] = &[
    (NETFLIX_KEY, netflix::PLATFORM_NAME),
    (AMAZON_KEY, amazon::PLATFORM_NAME),
    (YOUTUBE_TV_KEY, youtube_tv::PLATFORM_NAME),
];

/// Build every driver from configuration, sharing one launcher.
///
/// Platforms missing from the config get a disabled entry, so their runs
/// fail with a configuration error instead of disappearing.
pub fn configured_drivers(
    config: &Config,
    launcher: Arc<dyn SessionLauncher>,
) -> Vec<Arc<dyn HarvestDriver>> {
    let setup = |key: &str| {
        DriverSetup::new(
            config.platform(key).cloned().unwrap_or_default(),
            config.scraper.clone(),
            Arc::clone(&launcher),
        )
    };

    let netflix: Arc<dyn HarvestDriver> = Arc::new(NetflixDriver::new(setup(NETFLIX_KEY)));
    let amazon: Arc<dyn HarvestDriver> = Arc::new(AmazonDriver::new(setup(AMAZON_KEY)));
    let youtube: Arc<dyn HarvestDriver> = Arc::new(YouTubeTvDriver::new(setup(YOUTUBE_TV_KEY)));
    vec![netflix, amazon, youtube]
}

/// A manager with every driver registered, launching real Chromium.
pub fn manager_from_config(
    config: &Config,
    store: Arc<dyn crate::repository::HistoryStore>,
) -> HarvestManager {
    let launcher: Arc<dyn SessionLauncher> = Arc::new(ChromiumLauncher::new(
        BrowserEngineConfig::from(&config.scraper),
    ));
    let mut manager = HarvestManager::new(store, config.scraper.deadline());
    for driver in configured_drivers(config, launcher) {
        manager.register(driver);
    }
    manager
}

/// Display name for a platform given by config key or name.
pub fn platform_name(input: &str) -> Option<&'static str> {
    DRIVER_PLATFORMS
        .iter()
        .find(|(key, name)| key.eq_ignore_ascii_case(input) || name.eq_ignore_ascii_case(input))
        .map(|(_, name)| *name)
}
