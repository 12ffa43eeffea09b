//! Config file commands.

use super::CommandResult;
use imgsync_core::SyncConfig;
use std::fs;
use std::path::Path;

/// Parses and validates a JSON config file.
pub fn load(file: &Path) -> CommandResult<SyncConfig> {
    let json = fs::read_to_string(file)
        .map_err(|e| format!("Cannot read {}: {e}", file.display()))?;
    Ok(SyncConfig::from_json_str(&json)?)
}

/// Runs the config check command.
pub fn check(file: &Path) -> CommandResult<()> {
    let config = load(file)?;
    println!("{} is valid", file.display());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
