//! Show the state directory of the cleaner

use anyhow::Result;
use chrono::{Local, TimeZone};
use cleaner::interrupt::marker_path;
use cleaner::throttle::read_pause_override;
use cleaner::{lock, CheckpointStore, CleanerConfig};
use owo_colors::OwoColorize;

pub async fn run(config: &CleanerConfig) -> Result<()> {
    let state_dir = config.state_dir();

    println!("{}", "Versions Cleaner Status".bold());
    println!("{}: {}\n", "State directory".dimmed(), state_dir.display().dimmed());

    match lock::current_owner(&state_dir) {
        Some(owner) => {
            let started = Local
                .timestamp_millis_opt(owner.started_at)
                .single()
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "unknown".to_string());
            println!(
                "Run:            {} (pid {}, started {})",
                "running".green(),
                owner.pid,
                started
            );
        }
        None => println!("Run:            {}", "idle".dimmed()),
    }

    match CheckpointStore::open(&state_dir).load() {
        Some(position) => println!("Saved position: {}", position.cyan()),
        None => println!("Saved position: {}", "none (next run starts from the beginning)".dimmed()),
    }

    if marker_path(&state_dir).exists() {
        println!("Interrupt:      {}", "requested".yellow());
    }

    match read_pause_override(&state_dir) {
        Some(millis) if millis > 0 => println!("Pause override: {}ms", millis.to_string().yellow()),
        Some(_) => println!("Pause override: {}", "no pause".yellow()),
        None => println!(
            "Pause:          {}",
            match config.pause() {
                Some(pause) => format!("{}ms (configured)", pause.as_millis()),
                None => "none".to_string(),
            }
            .dimmed()
        ),
    }

    Ok(())
}
