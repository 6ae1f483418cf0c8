//! Error types for SIPHRA driver operations

use siphra_chip::Chip;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for SIPHRA operations
pub type Result<T> = std::result::Result<T, SiphraError>;

/// Errors that can occur during SIPHRA operations
#[derive(Debug, Error)]
pub enum SiphraError {
    /// Control window could not be opened or mapped
    #[error("Cannot open control window {path}: {source}")]
    DeviceOpen {
        /// UIO device path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// SPI bus could not be opened or configured
    #[error("Cannot open SPI bus {path}: {source}")]
    Spi {
        /// spidev device path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// An SPI exchange failed on an open bus
    #[error("SPI transfer failed: {reason}")]
    Transfer {
        /// Reason for failure
        reason: String,
    },

    /// Register address outside the catalog
    #[error("Unknown register address {address:#04x} (valid: 0x00..=0x1b)")]
    UnknownRegister {
        /// Requested address
        address: usize,
    },

    /// Chip name not recognised
    #[error("Invalid chip {name:?} (expected A, B, C, D or All)")]
    InvalidChip {
        /// Name as given
        name: String,
    },

    /// Operation needs one physical chip but got `All`
    #[error("{operation} needs a single chip, not All")]
    BroadcastNotAllowed {
        /// Operation name
        operation: &'static str,
    },

    /// Read-back never matched the written value
    #[error("Write to register {address:#04x} of SIPHRA {chip} could not be verified")]
    WriteVerification {
        /// Chip being written
        chip: Chip,
        /// Register address
        address: u8,
    },

    /// Configuration blob could not be read
    #[error("Cannot read configuration blob {path}: {source}")]
    ConfigBlob {
        /// Blob path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Field name not present in a register layout
    #[error("Register {address:#04x} has no field {field:?}")]
    UnknownField {
        /// Register address
        address: u8,
        /// Requested field
        field: String,
    },

    /// Value wider than the field it is written to
    #[error("Value {value:#x} does not fit the {bits}-bit {field} field")]
    ValueOutOfRange {
        /// Field name
        field: &'static str,
        /// Rejected value
        value: u32,
        /// Field width
        bits: u32,
    },

    /// Access outside the mapped window
    #[error("Out of bounds access: offset={offset:#x}, len={len}, limit={limit:#x}")]
    OutOfBounds {
        /// Start offset
        offset: usize,
        /// Access length
        len: usize,
        /// Mapped size
        limit: usize,
    },
}

impl SiphraError {
    /// Create a device open error
    pub fn device_open(path: impl Into<PathBuf>, source: impl Into<std::io::Error>) -> Self {
        Self::DeviceOpen {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Create an SPI open error
    pub fn spi(path: impl Into<PathBuf>, source: impl Into<std::io::Error>) -> Self {
        Self::Spi {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Create a transfer failed error
    pub fn transfer_failed(reason: impl Into<String>) -> Self {
        Self::Transfer {
            reason: reason.into(),
        }
    }

    /// Create a config blob error
    pub fn config_blob(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ConfigBlob {
            path: path.into(),
            source,
        }
    }

    /// True for errors that leave no usable controller behind
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::DeviceOpen { .. } | Self::Spi { .. })
    }
}

impl From<siphra_chip::UnknownRegister> for SiphraError {
    fn from(e: siphra_chip::UnknownRegister) -> Self {
        Self::UnknownRegister { address: e.0 }
    }
}

impl From<siphra_chip::ParseChipError> for SiphraError {
    fn from(e: siphra_chip::ParseChipError) -> Self {
        Self::InvalidChip { name: e.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_error_names_chip_and_register() {
        let e = SiphraError::WriteVerification {
            chip: Chip::C,
            address: 0x11,
        };
        assert_eq!(
            e.to_string(),
            "Write to register 0x11 of SIPHRA C could not be verified"
        );
        assert!(!e.is_fatal());
    }

    #[test]
    fn open_errors_are_fatal() {
        let e = SiphraError::device_open(
            "/dev/uio0",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(e.is_fatal());
        assert!(e.to_string().starts_with("Cannot open control window /dev/uio0"));
    }

    #[test]
    fn conversions_from_chip_model() {
        let e: SiphraError = siphra_chip::RegisterAddress::new(40).unwrap_err().into();
        assert!(matches!(e, SiphraError::UnknownRegister { address: 40 }));

        let e: SiphraError = "Q".parse::<Chip>().unwrap_err().into();
        assert!(matches!(e, SiphraError::InvalidChip { name } if name == "Q"));
    }
}
