//! Forget the saved traversal position

use anyhow::Result;
use cleaner::{lock, CheckpointStore, CleanerConfig};
use owo_colors::OwoColorize;

pub async fn run(config: &CleanerConfig) -> Result<()> {
    let state_dir = config.state_dir();

    if let Some(owner) = lock::current_owner(&state_dir) {
        anyhow::bail!(
            "A cleanup is running (pid {}); interrupt it before resetting",
            owner.pid
        );
    }

    let checkpoint = CheckpointStore::open(&state_dir);
    match checkpoint.load() {
        Some(position) => {
            checkpoint.save(None);
            println!("{} saved position {}", "Cleared".green(), position.dimmed());
        }
        None => println!("{}", "No saved position".dimmed()),
    }

    Ok(())
}
