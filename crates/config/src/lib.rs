pub mod schema;
pub mod watcher;

pub use schema::{
    BufferConfig, HeliConfig, PromotionConfig, PromotionKind, StatisticConfig, StreamConfig,
};
pub use watcher::ConfigWatcher;

use heli_core::{HeliError, Result};
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file.  Returns `HeliConfig::default()` if
/// the file doesn't exist so the service always has sensible defaults.
pub fn load(path: impl AsRef<Path>) -> Result<HeliConfig> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::warn!(
            "Config file not found at '{}'; using defaults.",
            path.display()
        );
        return Ok(HeliConfig::default());
    }

    let raw = std::fs::read_to_string(path)
        .map_err(|e| HeliError::Config(format!("cannot read '{}': {e}", path.display())))?;
    parse(&raw)
}

/// Parse and validate a TOML document.
pub fn parse(raw: &str) -> Result<HeliConfig> {
    let config: HeliConfig =
        toml::from_str(raw).map_err(|e| HeliError::Config(format!("TOML parse error: {e}")))?;
    config.validate()?;
    Ok(config)
}

/// Return the default config path, honouring `$XDG_CONFIG_HOME`.
pub fn default_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("heli").join("heli.toml")
}
