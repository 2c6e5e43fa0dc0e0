//! Status command.

use console::style;

use crate::cli::helpers::open_store;
use crate::config::Settings;
use crate::repository::HistoryStore;

/// Show the most recent run for each platform.
pub async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    let ctx = open_store(settings).await?;
    let runs = ctx.history().latest_runs().await?;

    println!("\n{}", style("Latest runs").bold());
    println!("{}", "-".repeat(60));

    if runs.is_empty() {
        println!("{} No runs recorded yet", style("!").yellow());
        return Ok(());
    }

    for run in runs {
        let status = if run.is_success() {
            style(run.status.as_str()).green().to_string()
        } else {
            style(run.status.as_str()).red().to_string()
        };
        println!(
            "{:<14} {:<8} {:>5} items  {}",
            run.platform,
            status,
            run.items_scraped,
            run.started_at.format("%Y-%m-%d %H:%M")
        );
        if let Some(err) = run.error_message {
            println!("{:<14} {}", "", style(err).dim());
        }
    }

    Ok(())
}
