//! Browser launch configuration.

use serde::{Deserialize, Serialize};

use crate::config::ScraperSettings;

/// How the Chromium session for a run is started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserEngineConfig {
    /// Run in headless mode (default: true).
    /// Set to false to watch a run or to get past headless detection.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Per-operation timeout in seconds for navigation and waits.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    pub user_agent: String,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to an existing browser instead of launching one.
    #[serde(default)]
    pub remote_url: Option<String>,
}

pub fn default_headless() -> bool {
    true
}

pub fn default_timeout() -> u64 {
    30
}

impl From<&ScraperSettings> for BrowserEngineConfig {
    fn from(settings: &ScraperSettings) -> Self {
        Self {
            headless: settings.headless,
            timeout: default_timeout().min(settings.timeout.max(1)),
            user_agent: settings.user_agent.clone(),
            chrome_args: settings.chrome_args.clone(),
            remote_url: settings.remote_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings() {
        let settings = ScraperSettings {
            headless: false,
            chrome_args: vec!["--lang=en-US".to_string()],
            ..Default::default()
        };
        let config = BrowserEngineConfig::from(&settings);
        assert!(!config.headless);
        assert_eq!(config.timeout, 30);
        assert_eq!(config.chrome_args, vec!["--lang=en-US"]);
        assert!(config.remote_url.is_none());
    }
}
