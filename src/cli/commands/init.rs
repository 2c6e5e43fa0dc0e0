//! Initialize command.

use console::style;

use crate::cli::helpers::open_store;
use crate::config::{Config, Settings};
use crate::repository::HistoryStore;
use crate::scrapers::DRIVER_PLATFORMS;

/// Create the database, seed platforms and report driver readiness.
pub async fn cmd_init(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    let ctx = open_store(settings).await?;
    let platforms = ctx.history().list_platforms().await?;

    println!(
        "{} Initialized streamtally in {}",
        style("✓").green(),
        settings.data_dir.display()
    );
    println!("  {} platforms known", platforms.len());

    for (key, name) in DRIVER_PLATFORMS {
        match config.platform(key) {
            Some(p) if p.enabled && !p.cookies.is_empty() => {
                println!("  {} {} ready ({} cookies)", style("✓").green(), name, p.cookies.len())
            }
            Some(p) if p.enabled => println!(
                "  {} {} enabled but has no cookies under platforms.{}.cookies",
                style("!").yellow(),
                name,
                key
            ),
            _ => println!("  {} {} not enabled", style("-").dim(), name),
        }
    }

    Ok(())
}
