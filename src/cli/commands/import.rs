//! CSV import command.

use std::path::Path;
use std::sync::Arc;

use console::style;

use crate::cli::helpers::{open_store, spinner};
use crate::config::{Config, Settings};
use crate::import::{CsvImporter, MetadataError, MetadataLookup, TmdbClient};
use crate::repository::HistoryStore;

/// Error messages printed after an import.
const SHOWN_ERRORS: usize = 10;

/// Import a CSV export into a platform's history.
pub async fn cmd_import(
    settings: &Settings,
    config: &Config,
    file: &Path,
    platform: &str,
) -> anyhow::Result<()> {
    let ctx = open_store(settings).await?;
    let repo = Arc::new(ctx.history());

    let Some(identity) = repo.find_platform(platform).await? else {
        println!("{} Unknown platform: {}", style("✗").red(), platform);
        println!("  Run 'streamtally platforms' to list known platforms");
        return Ok(());
    };

    let metadata: Option<Arc<dyn MetadataLookup>> = match TmdbClient::new(&config.metadata) {
        Ok(client) => Some(Arc::new(client)),
        Err(MetadataError::NotConfigured) => {
            println!(
                "{} TMDB_API_KEY not set; durations will be estimated",
                style("!").yellow()
            );
            None
        }
        Err(e) => return Err(e.into()),
    };

    let pb = spinner(format!("Importing {}...", file.display()));
    let importer = CsvImporter::new(repo, metadata, identity);
    let result = importer.import_path(file).await;
    pb.finish_and_clear();
    let result = result?;

    println!(
        "{} Imported {} of {} rows ({} skipped, {} errors)",
        style("✓").green(),
        result.imported,
        result.total,
        result.skipped,
        result.errors
    );
    for message in result.error_messages.iter().take(SHOWN_ERRORS) {
        println!("  {} {}", style("✗").red(), message);
    }
    if result.errors > SHOWN_ERRORS {
        println!("  ... and {} more", result.errors - SHOWN_ERRORS);
    }

    Ok(())
}
