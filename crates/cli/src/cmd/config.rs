//! Configuration command
//!
//! Shows the effective configuration, where it is read from, or an example.

use anyhow::{Context, Result};
use cleaner::CleanerConfig;
use cli_lib::settings;
use owo_colors::OwoColorize;
use std::path::Path;

/// Print the effective configuration (file values plus global flags)
pub async fn run_show(config: &CleanerConfig, explicit: Option<&Path>) -> Result<()> {
    println!("{}", "Effective Configuration".bold());
    match settings::resolve_path(explicit) {
        Some(path) if path.exists() => {
            println!("{}: {}\n", "Location".dimmed(), path.display().dimmed())
        }
        Some(path) => println!(
            "{}: {} {}\n",
            "Location".dimmed(),
            path.display().dimmed(),
            "(not found, using defaults)".dimmed()
        ),
        None => println!("{}\n", "(no config directory, using defaults)".dimmed()),
    }

    let rendered = toml::to_string_pretty(config).context("Failed to serialize config")?;
    for line in rendered.lines() {
        match line.split_once(" = ") {
            Some((key, value)) => println!("  {} = {}", key.cyan(), value),
            None => println!("{}", line.yellow()),
        }
    }

    println!();
    println!("{}: {}", "State directory".dimmed(), config.state_dir().display());
    Ok(())
}

pub async fn run_path(explicit: Option<&Path>) -> Result<()> {
    let path = settings::resolve_path(explicit).context("Could not determine config file path")?;
    println!("{}", path.display());
    Ok(())
}

pub async fn run_example() -> Result<()> {
    print!("{}", settings::example_config()?);
    Ok(())
}

/// Write the default configuration if the file does not exist
pub async fn run_init(explicit: Option<&Path>) -> Result<()> {
    let path = settings::resolve_path(explicit).context("Could not determine config file path")?;
    if path.exists() {
        println!("{} {}", "Config already exists at".dimmed(), path.display());
        return Ok(());
    }

    settings::save_to(&CleanerConfig::default(), &path)?;
    println!("{} {}", "Created".green(), path.display());
    Ok(())
}
