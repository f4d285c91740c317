//! Adjust the pause between deletions while a cleanup runs

use anyhow::{Context, Result};
use cleaner::throttle::{clear_pause_override, set_pause_override};
use cleaner::CleanerConfig;
use owo_colors::OwoColorize;

pub async fn run(config: &CleanerConfig, millis: Option<i64>, clear: bool) -> Result<()> {
    let state_dir = config.state_dir();

    if clear {
        let removed = clear_pause_override(&state_dir)
            .with_context(|| format!("Failed to remove pause override in {}", state_dir.display()))?;
        if removed {
            println!("{}", "Pause override cleared".green());
        } else {
            println!("{}", "No pause override set".dimmed());
        }
        return Ok(());
    }

    let millis = millis.context("A pause in milliseconds is required")?;
    set_pause_override(&state_dir, millis)
        .with_context(|| format!("Failed to write pause override in {}", state_dir.display()))?;

    if millis > 0 {
        println!("Pause between deletions set to {}", format!("{}ms", millis).yellow());
    } else {
        println!("Pause between deletions {}", "disabled".yellow());
    }

    Ok(())
}
