//! Run a cleanup against a repository file

use anyhow::{Context, Result};
use cleaner::util::format_duration;
use cleaner::{Cleaner, CleanerConfig, Collaborators, Execution, RunStatistics};
use owo_colors::OwoColorize;
use std::path::Path;
use std::sync::Arc;
use store::{MemoryIndex, MemoryMappings, MemoryRepository, EDIT_WORKSPACE, LIVE_WORKSPACE};

pub async fn run(config: CleanerConfig, repository: &Path, json: bool) -> Result<()> {
    // 1. Open the repository
    let repo = MemoryRepository::load_from(repository)
        .with_context(|| format!("Failed to load repository from {}", repository.display()))?;

    // 2. Bind the collaborators; the file format carries no mapping table
    let collaborators = Collaborators::new(
        Arc::new(repo.session(EDIT_WORKSPACE)),
        Arc::new(repo.session(LIVE_WORKSPACE)),
    )
    .with_mappings(Arc::new(MemoryMappings::new()))
    .with_index(Arc::new(MemoryIndex::new(1)));

    let cleaner = Cleaner::new(config, collaborators).context("Invalid configuration")?;

    // 3. Ctrl-C stops the run at its next suspension point
    let handle = cleaner.interrupt_handle();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping at the next safe point");
            handle.interrupt();
        }
    });

    if !json {
        println!("{}", "Cleaning version histories...".bold());
        println!();
    }

    let outcome = tokio::task::spawn_blocking(move || -> Result<RunStatistics> {
        match cleaner.execute()? {
            Execution::Finished(stats) => Ok(stats),
            Execution::Background(run) => {
                tracing::info!("Waiting for the background run to finish");
                Ok(run.join()?)
            }
        }
    })
    .await
    .context("Cleanup worker failed")?;
    signal_task.abort();
    let stats = outcome?;

    // 4. Persist whatever the run changed, complete or not
    repo.save_to(repository)
        .with_context(|| format!("Failed to save repository to {}", repository.display()))?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&stats).context("Failed to serialize statistics")?
        );
    } else {
        print_summary(&stats);
    }

    Ok(())
}

fn print_summary(stats: &RunStatistics) {
    if stats.interrupted {
        println!("{}", "Cleanup Interrupted".yellow().bold());
    } else {
        println!("{}", "Cleanup Complete".green().bold());
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    println!("Histories processed:      {}", stats.processed_histories);
    if stats.total_deleted_versions() == 0 && stats.deleted_orphan_histories == 0 {
        println!("{}", "Nothing deleted".dimmed());
    } else {
        println!("Versions deleted:         {}", stats.deleted_versions.to_string().yellow());
        println!("Orphan versions deleted:  {}", stats.deleted_orphan_versions.to_string().yellow());
        println!("Orphan histories purged:  {}", stats.deleted_orphan_histories.to_string().yellow());
    }
    if stats.dangling_references > 0 {
        println!(
            "Dangling references:      {} ({} repaired)",
            stats.dangling_references.to_string().red(),
            stats.repaired_references
        );
    }
    println!();
    println!("Elapsed: {}", format_duration(stats.elapsed()).dimmed());

    if stats.interrupted {
        println!();
        println!(
            "{}",
            "Run again to resume from the saved position, or `versions-cleaner reset` to start over."
                .dimmed()
        );
    }
}
