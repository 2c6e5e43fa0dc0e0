//! Configuration management for streamtally using the prefer crate.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "streamtally.db";

/// Config keys for the platforms with a harvest driver.
pub const NETFLIX_KEY: &str = "netflix";
pub const AMAZON_KEY: &str = "amazon";
pub const YOUTUBE_TV_KEY: &str = "youtube_tv";

/// A named authentication token, as exported from a logged-in browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieConfig {
    pub name: String,
    pub value: String,
}

/// Per-platform settings. Read by drivers, never mutated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cookies: Vec<CookieConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub use_oauth: bool,
}

/// Database location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite file. Relative paths resolve against the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Global harvest settings shared by every driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperSettings {
    #[serde(default = "default_true")]
    pub headless: bool,
    /// Hard deadline for one platform run, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Cap items per run for smoke tests.
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default = "default_test_limit")]
    pub test_limit: usize,
    /// Stop paginating once the oldest rendered item is before this year.
    #[serde(default = "default_cutoff_year")]
    pub cutoff_year: i32,
    /// Unchanged item counts in a row before a feed is considered finished.
    #[serde(default = "default_stable_iterations")]
    pub stable_iterations: u32,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Wait after each load-more action, in milliseconds.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chrome_args: Vec<String>,
    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    300
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_test_limit() -> usize {
    10
}

fn default_cutoff_year() -> i32 {
    2025
}

fn default_stable_iterations() -> u32 {
    3
}

fn default_max_iterations() -> u32 {
    200
}

fn default_settle_ms() -> u64 {
    2000
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            headless: true,
            timeout: default_timeout(),
            user_agent: default_user_agent(),
            test_mode: false,
            test_limit: default_test_limit(),
            cutoff_year: default_cutoff_year(),
            stable_iterations: default_stable_iterations(),
            max_iterations: default_max_iterations(),
            settle_ms: default_settle_ms(),
            chrome_args: Vec::new(),
            remote_url: None,
        }
    }
}

impl ScraperSettings {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Item cap for this run, if test mode is on.
    pub fn item_limit(&self) -> Option<usize> {
        self.test_mode.then_some(self.test_limit)
    }
}

/// Metadata (TMDB) lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_metadata_url")]
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_metadata_timeout")]
    pub timeout: u64,
}

fn default_metadata_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_metadata_timeout() -> u64 {
    10
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_metadata_url(),
            timeout: default_metadata_timeout(),
        }
    }
}

/// Configuration file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Platform settings keyed by driver key (`netflix`, `amazon`, `youtube_tv`).
    #[serde(default)]
    pub platforms: BTreeMap<String, PlatformConfig>,
    #[serde(default)]
    pub scraper: ScraperSettings,
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Where this config was loaded from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Discover and load the config file, falling back to defaults.
    pub async fn load() -> Self {
        // Use prefer for file discovery, then parse with serde
        match prefer::load("streamtally").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            warn!("{}; using defaults", e);
                            Self::default().with_env_overrides()
                        }
                    }
                } else {
                    Self::default().with_env_overrides()
                }
            }
            Err(_) => Self::default().with_env_overrides(),
        }
    }

    /// Load config from a specific file. Format is picked by extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config.with_env_overrides())
    }

    /// Apply `DATABASE_URL` and `TMDB_API_KEY` from the environment.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                self.database.path = Some(url);
            }
        }
        if let Ok(key) = std::env::var("TMDB_API_KEY") {
            if !key.is_empty() {
                self.metadata.api_key = Some(key);
            }
        }
        self
    }

    /// Settings for a driver key, if configured.
    pub fn platform(&self, key: &str) -> Option<&PlatformConfig> {
        self.platforms.get(key)
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Resolve runtime settings from this config.
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        if let Some(ref db_path) = self.database.path {
            let db_path = db_path
                .strip_prefix("sqlite://")
                .or_else(|| db_path.strip_prefix("sqlite:"))
                .unwrap_or(db_path);
            let base = self
                .base_dir()
                .or_else(|| std::env::current_dir().ok())
                .unwrap_or_else(|| PathBuf::from("."));
            settings.database_path = self.resolve_path(db_path, &base);
            if let Some(parent) = settings.database_path.parent() {
                settings.data_dir = parent.to_path_buf();
            }
        }
        settings
    }
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// SQLite database file.
    pub database_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        // Documents dir -> Home dir -> Current dir
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("streamtally");

        Self {
            database_path: data_dir.join(DEFAULT_DATABASE_FILENAME),
            data_dir,
        }
    }
}

impl Settings {
    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }

    /// Create a database context for these settings.
    pub fn create_db_context(&self) -> crate::repository::DbContext {
        crate::repository::DbContext::new(&self.database_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_yaml_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("streamtally.yaml");
        std::fs::write(
            &path,
            r#"
database:
  path: ./data/history.db
platforms:
  netflix:
    enabled: true
    cookies:
      - name: NetflixId
        value: abc
  youtube_tv:
    enabled: false
scraper:
  headless: false
  test_mode: true
  test_limit: 5
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        let netflix = config.platform(NETFLIX_KEY).unwrap();
        assert!(netflix.enabled);
        assert_eq!(netflix.cookies[0].name, "NetflixId");
        assert!(!config.platform(YOUTUBE_TV_KEY).unwrap().enabled);
        assert!(config.platform(AMAZON_KEY).is_none());

        assert!(!config.scraper.headless);
        assert_eq!(config.scraper.timeout, 300);
        assert_eq!(config.scraper.stable_iterations, 3);
        assert_eq!(config.scraper.item_limit(), Some(5));
        assert_eq!(config.metadata.timeout, 10);
    }

    #[tokio::test]
    async fn test_load_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("streamtally.toml");
        std::fs::write(
            &path,
            "[scraper]\ntimeout = 60\ncutoff_year = 2024\n\n[platforms.amazon]\nenabled = true\n",
        )
        .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.scraper.deadline(), Duration::from_secs(60));
        assert_eq!(config.scraper.cutoff_year, 2024);
        assert!(config.platform(AMAZON_KEY).unwrap().enabled);
    }

    #[tokio::test]
    async fn test_malformed_config_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("streamtally.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Config::load_from_path(&path).await.unwrap_err();
        assert!(err.contains("JSON"));
    }

    #[test]
    fn test_relative_database_path_resolves_against_config_dir() {
        let config = Config {
            database: DatabaseConfig {
                path: Some("sqlite:data/history.db".to_string()),
            },
            source_path: Some(PathBuf::from("/etc/streamtally/config.yaml")),
            ..Default::default()
        };

        let settings = config.settings();
        assert_eq!(
            settings.database_path,
            PathBuf::from("/etc/streamtally/data/history.db")
        );
        assert_eq!(settings.data_dir, PathBuf::from("/etc/streamtally/data"));
    }
}
