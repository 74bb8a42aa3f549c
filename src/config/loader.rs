use super::{config_path, ConfigError, OrderSyncConfig};
use std::path::Path;
use tracing::debug;

/// Load the configuration from `~/.ordersync/config.toml`.
///
/// Returns `Ok(OrderSyncConfig::default())` if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file exists but cannot be read or parsed.
pub fn load_config() -> Result<OrderSyncConfig, ConfigError> {
    load_config_from(&config_path())
}

/// Load the configuration from an explicit path.
pub fn load_config_from(path: &Path) -> Result<OrderSyncConfig, ConfigError> {
    if !path.exists() {
        debug!("Config not found at {}; using defaults", path.display());
        return Ok(OrderSyncConfig::default());
    }
    let content = std::fs::read_to_string(path)?;
    let config: OrderSyncConfig = toml::from_str(&content)?;
    debug!("Loaded config from {}", path.display());
    Ok(config)
}
