//! CSV watch-history import.
//!
//! Reads a header row, then `(title, date)` rows such as Netflix's viewing
//! activity export. Per-row problems are counted and described in the
//! result; only unreadable input is an error.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveTime;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::metadata::{ContentInfo, MediaType, MetadataLookup};
use crate::models::{ActivityRecord, PlatformIdentity};
use crate::repository::{DieselError, HistoryStore};
use crate::scrapers::normalize::{estimate_duration, split_title, to_timestamp, DateNormalizer};
use crate::scrapers::ItemError;

/// Error messages kept in an [`ImportResult`].
pub const MAX_ERROR_MESSAGES: usize = 100;

/// Counts for one import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportResult {
    /// Data rows read, including short and failed ones.
    pub total: usize,
    pub imported: usize,
    /// Short rows and rows already in the store.
    pub skipped: usize,
    pub errors: usize,
    /// Up to [`MAX_ERROR_MESSAGES`] human-readable descriptions.
    pub error_messages: Vec<String>,
}

impl ImportResult {
    fn record_error(&mut self, message: String) {
        warn!("{}", message);
        self.errors += 1;
        if self.error_messages.len() < MAX_ERROR_MESSAGES {
            self.error_messages.push(message);
        }
    }
}

/// Input that could not be imported at all.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to open import file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read CSV header: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid CSV format: expected at least 2 columns, got {0}")]
    MalformedHeader(usize),

    #[error("Database error: {0}")]
    Store(#[from] DieselError),
}

enum RowOutcome {
    Imported,
    Skipped,
}

/// Imports rows into one platform's history.
pub struct CsvImporter {
    store: Arc<dyn HistoryStore>,
    metadata: Option<Arc<dyn MetadataLookup>>,
    platform: PlatformIdentity,
    normalizer: DateNormalizer,
}

impl CsvImporter {
    pub fn new(
        store: Arc<dyn HistoryStore>,
        metadata: Option<Arc<dyn MetadataLookup>>,
        platform: PlatformIdentity,
    ) -> Self {
        Self {
            store,
            metadata,
            platform,
            normalizer: DateNormalizer::default(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: DateNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub async fn import_path(&self, path: &Path) -> Result<ImportResult, ImportError> {
        let file = std::fs::File::open(path)?;
        self.import_reader(file).await
    }

    pub async fn import_reader<R: Read + Send>(&self, input: R) -> Result<ImportResult, ImportError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(input);

        let header = reader.headers()?.clone();
        if header.len() < 2 {
            return Err(ImportError::MalformedHeader(header.len()));
        }
        debug!("CSV header: {:?}", header);

        let mut result = ImportResult::default();
        for row in reader.records() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    result.record_error(format!("CSV read error: {}", e));
                    continue;
                }
            };

            result.total += 1;
            if row.len() < 2 {
                debug!("Skipping row with {} field(s)", row.len());
                result.skipped += 1;
                continue;
            }

            let title = row[0].trim();
            let date = row[1].trim();
            match self.import_row(title, date).await {
                Ok(RowOutcome::Imported) => result.imported += 1,
                Ok(RowOutcome::Skipped) => result.skipped += 1,
                Err(e) => result.record_error(format!("Error processing '{}': {}", title, e)),
            }
        }

        info!(
            "Import complete: total={}, imported={}, skipped={}, errors={}",
            result.total, result.imported, result.skipped, result.errors
        );
        Ok(result)
    }

    async fn import_row(&self, raw_title: &str, date: &str) -> Result<RowOutcome, String> {
        let watched_at = self
            .normalizer
            .parse_date(date)
            .map(|d| to_timestamp(d.and_time(NaiveTime::MIN)))
            .map_err(|e| format!("failed to parse date '{}': {}", date, e))?;

        let (title, episode) = split_title(raw_title);
        let episode_label = episode.as_deref().unwrap_or_default();

        let exists = self
            .store
            .already_stored(self.platform.id, &title, episode_label, watched_at)
            .await
            .map_err(|e| format!("failed to check for existing entry: {}", e))?;
        if exists {
            debug!("Already imported: {} at {}", title, watched_at.date_naive());
            return Ok(RowOutcome::Skipped);
        }

        let info = self.enrich(&title, episode.as_deref()).await;
        let record = ActivityRecord::new(
            self.platform.id,
            title,
            episode,
            watched_at,
            info.duration_minutes,
        );
        self.store
            .upsert_record(&record)
            .await
            .map_err(|e| format!("failed to store entry: {}", e))?;
        Ok(RowOutcome::Imported)
    }

    /// Metadata lookup with the catalogue heuristic as fallback.
    async fn enrich(&self, title: &str, episode: Option<&str>) -> ContentInfo {
        let fallback = || ContentInfo {
            title: title.to_string(),
            duration_minutes: estimate_duration(episode),
            media_type: MediaType::Unknown,
        };

        let Some(metadata) = &self.metadata else {
            return fallback();
        };
        match metadata.lookup(title).await {
            Ok(info) => info,
            Err(e) => {
                warn!(
                    "{}; using default duration",
                    ItemError::Enrichment(format!("'{}': {}", title, e))
                );
                fallback()
            }
        }
    }
}
