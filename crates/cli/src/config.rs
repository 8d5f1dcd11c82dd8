//! `reconbot config` / `reconbot validate`, and config loading for `run`.

use std::path::{Path, PathBuf};

use reconbot_recon::ReconConfig;

use crate::CliError;

/// Read and validate a config file, or fall back to the built-in rules.
pub fn load_config(path: Option<&Path>) -> Result<ReconConfig, CliError> {
    let Some(path) = path else {
        return Ok(ReconConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::args(format!("cannot read config {}: {e}", path.display())))?;
    let config = ReconConfig::from_toml(&text)?;
    log::debug!("config '{}' loaded from {}", config.name, path.display());
    Ok(config)
}

pub fn cmd_validate(path: PathBuf) -> Result<(), CliError> {
    let config = load_config(Some(&path))?;
    eprintln!(
        "valid: '{}' (tolerance {}, keeps {} run(s), key prefix {}/{})",
        config.name,
        config.tolerance,
        config.history.max_runs,
        prefix_label(config.source_a.key_max_len),
        prefix_label(config.source_b.key_max_len),
    );
    Ok(())
}

pub fn cmd_config(path: Option<PathBuf>) -> Result<(), CliError> {
    let config = load_config(path.as_deref())?;
    let text = config.to_toml()?;
    print!("{text}");
    Ok(())
}

fn prefix_label(len: Option<usize>) -> String {
    len.map(|n| n.to_string()).unwrap_or_else(|| "full".into())
}
