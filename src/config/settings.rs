//! Application settings loaded from `planshare.toml`.
//!
//! Every field has a default, so the file is optional. A present but malformed file is a
//! configuration error rather than something to silently ignore.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable that overrides the settings file location
pub const SETTINGS_PATH_ENV: &str = "PLANSHARE_CONFIG";

const DEFAULT_SETTINGS_PATH: &str = "planshare.toml";

/// Tunables for the core operations
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Number of characters in a generated join code
    pub join_code_length: usize,
    /// How many codes to try before giving up on finding an unused one
    pub join_code_attempts: u32,
    /// Maximum number of payments returned by a listing
    pub payment_page_size: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            join_code_length: 6,
            join_code_attempts: 10,
            payment_page_size: 100,
        }
    }
}

/// Loads settings from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read, the TOML syntax is invalid, or the join
/// code length is zero.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read settings file: {e}"),
    })?;

    let settings: Settings = toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse settings file: {e}"),
    })?;

    if settings.join_code_length == 0 {
        return Err(Error::Config {
            message: "join_code_length must be at least 1".to_string(),
        });
    }

    Ok(settings)
}

/// Loads settings from `$PLANSHARE_CONFIG`, or `./planshare.toml`, falling back to the
/// defaults when the file does not exist.
pub fn load_default_settings() -> Result<Settings> {
    let path = std::env::var(SETTINGS_PATH_ENV).unwrap_or_else(|_| DEFAULT_SETTINGS_PATH.into());

    if Path::new(&path).exists() {
        info!("Loading settings from {}", path);
        load_settings(&path)
    } else {
        debug!("No settings file at {}, using defaults", path);
        Ok(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_partial_settings() {
        let toml_str = r"
            join_code_length = 8
        ";

        let settings: Settings = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.join_code_length, 8);
        assert_eq!(settings.join_code_attempts, 10);
        assert_eq!(settings.payment_page_size, 100);
    }

    #[test]
    fn test_empty_settings_are_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_settings_rejects_zero_length_code() {
        let path = std::env::temp_dir().join("planshare_zero_code.toml");
        std::fs::write(&path, "join_code_length = 0\n").unwrap();

        let result = load_settings(&path);
        assert!(matches!(result, Err(Error::Config { .. })));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_settings_missing_file() {
        let result = load_settings("/nonexistent/planshare.toml");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
