//! History listing command.

use console::style;

use crate::cli::helpers::open_store;
use crate::config::Settings;
use crate::repository::HistoryStore;

/// Most recent records for one platform.
pub async fn cmd_history(settings: &Settings, platform: &str, limit: i64) -> anyhow::Result<()> {
    let ctx = open_store(settings).await?;
    let repo = ctx.history();

    let Some(identity) = repo.find_platform(platform).await? else {
        println!("{} Unknown platform: {}", style("✗").red(), platform);
        return Ok(());
    };

    let entries = repo.list_history(identity.id, limit).await?;
    let total = repo.count_records(identity.id).await?;
    println!(
        "\n{} ({} of {} records)",
        style(&identity.name).bold(),
        entries.len(),
        total
    );
    println!("{}", "-".repeat(60));

    for entry in entries {
        let record = entry.record;
        let episode = record
            .episode_info
            .map(|e| format!(" {}", style(format!("[{}]", e)).dim()))
            .unwrap_or_default();
        println!(
            "{}  {:>4}m  {}{}",
            record.watched_at.format("%Y-%m-%d"),
            record.duration_minutes,
            record.title,
            episode
        );
    }

    Ok(())
}
