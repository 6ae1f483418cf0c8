//! Controller configuration
//!
//! Defaults match the D2a carrier board. Environment variables override
//! individual settings; the CLI overrides those again with flags.

use siphra_chip::window::WINDOW_SIZE;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// UIO device override
pub const ENV_UIO: &str = "SIPHRA_UIO";
/// spidev device override
pub const ENV_SPI: &str = "SIPHRA_SPI";
/// Reset toggle override, in milliseconds
pub const ENV_RESET_TOGGLE_MS: &str = "SIPHRA_RESET_TOGGLE_MS";

/// Where the hardware lives and how to drive it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// UIO device exporting the control / status window
    pub uio_path: PathBuf,

    /// spidev node of the register bus
    pub spi_path: PathBuf,

    /// Bytes to map from the UIO device
    pub map_len: usize,

    /// How long `reset` holds a chip in reset
    pub reset_toggle: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            uio_path: PathBuf::from("/dev/uio0"),
            spi_path: PathBuf::from("/dev/spidev1.0"),
            map_len: WINDOW_SIZE,
            reset_toggle: Duration::from_millis(10),
        }
    }
}

impl ControllerConfig {
    /// Defaults with `SIPHRA_*` environment overrides applied
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults with overrides from `lookup`
    ///
    /// An unparseable toggle duration is logged and ignored.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_UIO) {
            config.uio_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(ENV_SPI) {
            config.spi_path = PathBuf::from(path);
        }
        if let Some(ms) = lookup(ENV_RESET_TOGGLE_MS) {
            match ms.trim().parse::<u64>() {
                Ok(ms) => config.reset_toggle = Duration::from_millis(ms),
                Err(e) => warn!("Ignoring {ENV_RESET_TOGGLE_MS}={ms:?}: {e}"),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_d2a_board() {
        let config = ControllerConfig::default();
        assert_eq!(config.uio_path, PathBuf::from("/dev/uio0"));
        assert_eq!(config.spi_path, PathBuf::from("/dev/spidev1.0"));
        assert_eq!(config.map_len, 4108);
        assert_eq!(config.reset_toggle, Duration::from_millis(10));
    }

    #[test]
    fn lookup_overrides_paths_and_toggle() {
        let env: HashMap<&str, &str> = [
            (ENV_UIO, "/dev/uio3"),
            (ENV_SPI, "/dev/spidev0.1"),
            (ENV_RESET_TOGGLE_MS, " 250 "),
        ]
        .into_iter()
        .collect();

        let config = ControllerConfig::from_lookup(|k| env.get(k).map(ToString::to_string));
        assert_eq!(config.uio_path, PathBuf::from("/dev/uio3"));
        assert_eq!(config.spi_path, PathBuf::from("/dev/spidev0.1"));
        assert_eq!(config.reset_toggle, Duration::from_millis(250));
        assert_eq!(config.map_len, WINDOW_SIZE);
    }

    #[test]
    fn bad_toggle_keeps_default() {
        let config = ControllerConfig::from_lookup(|k| {
            (k == ENV_RESET_TOGGLE_MS).then(|| "soon".to_string())
        });
        assert_eq!(config.reset_toggle, Duration::from_millis(10));
    }
}
