mod atomic;

pub use atomic::write_json_atomic;

use std::path::PathBuf;

/// Name of the per-user ordersync folder
pub const ORDERSYNC_FOLDER: &str = ".ordersync";

/// Environment variable overriding the ordersync home directory
pub const ORDERSYNC_HOME_ENV: &str = "ORDERSYNC_HOME";

/// Get current timestamp in ISO 8601 format
#[must_use]
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Resolve the ordersync home directory (`~/.ordersync`).
///
/// `ORDERSYNC_HOME` wins when set so tests and CI never touch real user data.
#[must_use]
pub fn ordersync_home() -> PathBuf {
    if let Ok(home) = std::env::var(ORDERSYNC_HOME_ENV) {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(ORDERSYNC_FOLDER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_iso_is_rfc3339() {
        let timestamp = now_iso();
        assert!(chrono::DateTime::parse_from_rfc3339(&timestamp).is_ok());
    }

    #[test]
    fn test_folder_constant() {
        assert_eq!(ORDERSYNC_FOLDER, ".ordersync");
    }
}
