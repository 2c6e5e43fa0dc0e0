//! Platform listing and toggling.

use console::style;

use crate::cli::helpers::open_store;
use crate::config::Settings;
use crate::repository::HistoryStore;

pub async fn cmd_platforms_list(settings: &Settings) -> anyhow::Result<()> {
    let ctx = open_store(settings).await?;
    let platforms = ctx.history().list_platforms().await?;

    for p in platforms {
        let marker = if p.enabled {
            style("✓").green()
        } else {
            style("-").dim()
        };
        println!("{} {:<14} {}", marker, p.name, style(&p.color).dim());
    }
    Ok(())
}

pub async fn cmd_platform_set_enabled(
    settings: &Settings,
    name: &str,
    enabled: bool,
) -> anyhow::Result<()> {
    let ctx = open_store(settings).await?;
    if ctx.history().set_platform_enabled(name, enabled).await? {
        let verb = if enabled { "Enabled" } else { "Disabled" };
        println!("{} {} {}", style("✓").green(), verb, name);
    } else {
        println!("{} Unknown platform: {}", style("✗").red(), name);
    }
    Ok(())
}
