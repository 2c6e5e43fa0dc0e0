//! Stats command.

use chrono::{Duration, Utc};
use console::style;

use crate::cli::helpers::{format_minutes, open_store};
use crate::config::Settings;

/// Viewing totals per enabled platform over the last `days` days.
pub async fn cmd_stats(settings: &Settings, days: i64) -> anyhow::Result<()> {
    let ctx = open_store(settings).await?;
    let end = Utc::now();
    let start = end - Duration::days(days.max(1));
    let stats = ctx.history().platform_stats(start, end).await?;

    println!("\n{}", style(format!("Last {} days", days.max(1))).bold());
    println!("{}", "-".repeat(60));

    let total: i64 = stats.iter().map(|s| s.total_minutes).sum();
    for s in &stats {
        let last = s
            .last_watched
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<14} {:>10} {:>6} titles  last {}",
            s.name,
            format_minutes(s.total_minutes),
            s.total_records,
            last
        );
    }
    println!("{}", "-".repeat(60));
    println!("{:<14} {:>10}", style("Total").bold(), format_minutes(total));

    Ok(())
}
