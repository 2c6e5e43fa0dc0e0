//! Scrape command.

use std::sync::Arc;

use console::style;

use crate::cli::helpers::open_store;
use crate::config::{Config, Settings};
use crate::models::RunOutcome;
use crate::scrapers::{manager_from_config, platform_name};

fn print_outcome(outcome: &RunOutcome) {
    if outcome.is_success() {
        println!(
            "{} {}: {} records",
            style("✓").green(),
            outcome.platform,
            outcome.items_scraped
        );
    } else {
        println!(
            "{} {}: {}",
            style("✗").red(),
            outcome.platform,
            outcome.error_message.as_deref().unwrap_or("failed")
        );
    }
}

/// Harvest the named platforms, or all of them.
pub async fn cmd_scrape(
    settings: &Settings,
    config: &Config,
    platforms: &[String],
    all: bool,
) -> anyhow::Result<()> {
    if !all && platforms.is_empty() {
        println!(
            "{} Name platforms to scrape (netflix, amazon, youtube_tv) or pass --all",
            style("!").yellow()
        );
        return Ok(());
    }

    let ctx = open_store(settings).await?;
    let manager = manager_from_config(config, Arc::new(ctx.history()));
    let deadline = config.scraper.deadline();

    if all {
        let outcomes = manager.run_all(deadline).await;
        for outcome in &outcomes {
            print_outcome(outcome);
        }
        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        if failed > 0 {
            println!("{} {} platform(s) failed", style("!").yellow(), failed);
        }
        return Ok(());
    }

    // Named platforms run concurrently, one browser each.
    let manager = Arc::new(manager);
    let mut handles = Vec::new();
    for requested in platforms {
        let Some(name) = platform_name(requested) else {
            println!("{} No driver for '{}'", style("✗").red(), requested);
            continue;
        };
        match manager.trigger(name) {
            Ok(handle) => {
                println!("{} Scraping {}...", style("→").cyan(), name);
                handles.push((name, handle));
            }
            Err(e) => println!("{} {}: {}", style("✗").red(), name, e),
        }
    }

    for (name, handle) in handles {
        match handle.await {
            Ok(Ok(outcome)) => print_outcome(&outcome),
            Ok(Err(e)) => println!("{} {}: {}", style("✗").red(), name, e),
            Err(e) => println!("{} {}: run aborted: {}", style("✗").red(), name, e),
        }
    }

    Ok(())
}
