use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    consts::{
        DEFAULT_AUTO_REFRESH_INTERVAL_MS, DEFAULT_ZERO_CONFIRMATION_BAILOUT,
    },
    errors::{TxWatchError, TxWatchResult},
};

/// Configuration of the transaction watcher.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct WatcherConfig {
    /// How long to wait after a status fetch resolved before requesting the
    /// status again while the transaction has not reached max
    /// confirmations.
    pub auto_refresh_interval_ms: u64,
    /// How many consecutive observations with zero confirmations we accept
    /// before we stop polling.
    pub zero_confirmation_bailout: u32,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            auto_refresh_interval_ms: DEFAULT_AUTO_REFRESH_INTERVAL_MS,
            zero_confirmation_bailout: DEFAULT_ZERO_CONFIRMATION_BAILOUT,
        }
    }
}

impl WatcherConfig {
    pub fn try_from_toml_str(toml_str: &str) -> TxWatchResult<Self> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn try_load_from_file<P: AsRef<Path>>(path: P) -> TxWatchResult<Self> {
        let toml_str = std::fs::read_to_string(path)?;
        Self::try_from_toml_str(&toml_str)
    }

    pub fn validate(&self) -> TxWatchResult<()> {
        if self.auto_refresh_interval_ms == 0 {
            return Err(TxWatchError::InvalidConfig(
                "auto-refresh-interval-ms must be greater than 0".to_string(),
            ));
        }
        if self.zero_confirmation_bailout == 0 {
            return Err(TxWatchError::InvalidConfig(
                "zero-confirmation-bailout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn auto_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.auto_refresh_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = WatcherConfig::try_from_toml_str("").unwrap();
        assert_eq!(config, WatcherConfig::default());
        assert_eq!(config.auto_refresh_interval(), Duration::from_secs(2));
        assert_eq!(config.zero_confirmation_bailout, 5);
    }

    #[test]
    fn test_partial_config_overrides() {
        let config = WatcherConfig::try_from_toml_str(
            "auto-refresh-interval-ms = 500\n",
        )
        .unwrap();
        assert_eq!(config.auto_refresh_interval_ms, 500);
        assert_eq!(
            config.zero_confirmation_bailout,
            DEFAULT_ZERO_CONFIRMATION_BAILOUT
        );
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let res = WatcherConfig::try_from_toml_str("refresh = 1\n");
        assert_matches!(res, Err(TxWatchError::ConfigDeserialize(_)));
    }

    #[test]
    fn test_zero_values_are_rejected() {
        let res = WatcherConfig::try_from_toml_str(
            "auto-refresh-interval-ms = 0\n",
        );
        assert_matches!(res, Err(TxWatchError::InvalidConfig(_)));

        let res = WatcherConfig::try_from_toml_str(
            "zero-confirmation-bailout = 0\n",
        );
        assert_matches!(res, Err(TxWatchError::InvalidConfig(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "zero-confirmation-bailout = 3").unwrap();

        let config = WatcherConfig::try_load_from_file(file.path()).unwrap();
        assert_eq!(config.zero_confirmation_bailout, 3);
    }
}
