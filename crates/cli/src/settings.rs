//! Configuration file handling
//!
//! The file lives at `~/.config/versions-cleaner/config.toml` unless a path
//! is given explicitly. It holds a serialised `CleanerConfig`; a missing
//! default file means defaults, a missing explicit file is an error.

use anyhow::{Context, Result};
use cleaner::CleanerConfig;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Directory holding the configuration file
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|c| c.join(cleaner::config::STATE_DIR_NAME))
}

pub fn config_file_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

/// Path that `load` reads for the given `--config` argument
pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit.map(Path::to_path_buf).or_else(config_file_path)
}

/// Load the configuration
pub fn load(explicit: Option<&Path>) -> Result<CleanerConfig> {
    if let Some(path) = explicit {
        return load_from(path);
    }

    let config_path = match config_file_path() {
        Some(p) => p,
        None => {
            tracing::debug!("Could not determine config directory, using defaults");
            return Ok(CleanerConfig::default());
        }
    };

    if !config_path.exists() {
        tracing::debug!("Config not found at {}, using defaults", config_path.display());
        return Ok(CleanerConfig::default());
    }

    load_from(&config_path)
}

/// Read and validate one configuration file
pub fn load_from(path: &Path) -> Result<CleanerConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;

    let config: CleanerConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config at {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("Invalid config at {}", path.display()))?;

    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Write `config` to `path`, creating the parent directory
pub fn save_to(config: &CleanerConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory at {}", parent.display()))?;
    }

    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(path, content)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    tracing::info!("Saved config to {}", path.display());
    Ok(())
}

/// Example file with every option at its default
pub fn example_config() -> Result<String> {
    let mut content = String::from("# versions-cleaner configuration\n");
    content.push_str("# Location: ~/.config/versions-cleaner/config.toml\n");
    content.push_str("#\n");
    content.push_str("# keep_last = -1 disables pruning; pause_ms <= 0 disables the pause;\n");
    content.push_str("# max_execution_time_ms = 0 means no time budget.\n\n");
    content.push_str(
        &toml::to_string_pretty(&CleanerConfig::default()).context("Failed to serialize config")?,
    );
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_parses_back_to_defaults() {
        let example = example_config().unwrap();
        let parsed: CleanerConfig = toml::from_str(&example).unwrap();
        let defaults = CleanerConfig::default();

        assert_eq!(parsed.keep_last, defaults.keep_last);
        assert_eq!(parsed.long_history_threshold, defaults.long_history_threshold);
        assert_eq!(parsed.cascade_delete_types, defaults.cascade_delete_types);
        assert!(parsed.subtree_path.is_none());
    }

    #[test]
    fn test_resolve_prefers_explicit_path() {
        let explicit = Path::new("/tmp/custom.toml");
        assert_eq!(resolve_path(Some(explicit)), Some(explicit.to_path_buf()));
    }
}
