//! Request the running cleanup to stop

use anyhow::{Context, Result};
use cleaner::interrupt::request_interrupt;
use cleaner::{lock, CleanerConfig};
use owo_colors::OwoColorize;

pub async fn run(config: &CleanerConfig) -> Result<()> {
    let state_dir = config.state_dir();
    let marker = request_interrupt(&state_dir)
        .with_context(|| format!("Failed to write interrupt marker in {}", state_dir.display()))?;

    match lock::current_owner(&state_dir) {
        Some(owner) => println!(
            "{} pid {} will stop at its next safe point",
            "Interrupt requested:".yellow(),
            owner.pid
        ),
        None => {
            println!("{}", "No cleanup is running".dimmed());
            println!(
                "{}",
                format!("The marker {} will stop the next run immediately", marker.display()).dimmed()
            );
        }
    }

    Ok(())
}
