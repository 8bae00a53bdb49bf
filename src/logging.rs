//! Log subscriber setup for binaries embedding the licensing subsystem.
//!
//! The library itself only emits `tracing` events; installing a subscriber is
//! left to the host application, or to [`init`].

use std::str::FromStr;

use tracing::Level;

use crate::config::LoggingConfig;
use crate::errors::{LicenseError, LicenseResult};

/// Parse a configured level name.
pub fn parse_level(level: &str) -> LicenseResult<Level> {
    Level::from_str(level.trim())
        .map_err(|_| LicenseError::ConfigError(format!("unknown log level '{level}'")))
}

/// Install a compact fmt subscriber honoring `config.level`.
///
/// Does nothing when logging is disabled or a global subscriber is already set.
pub fn init(config: &LoggingConfig) -> LicenseResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let level = parse_level(&config.level)?;
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_levels_case_insensitively() {
        assert_eq!(parse_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_level("WARN").unwrap(), Level::WARN);
        assert!(parse_level("loud").is_err());
    }

    #[test]
    fn init_is_repeatable() {
        let config = LoggingConfig::default();
        init(&config).unwrap();
        init(&config).unwrap();

        let disabled = LoggingConfig {
            enabled: false,
            level: "nonsense".to_string(),
        };
        init(&disabled).unwrap();
    }
}
