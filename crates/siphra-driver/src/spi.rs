//! SPI channel to the SIPHRA register interface
//!
//! The bus carries no chip-select of its own: the D2a board routes CS through
//! the control word, so the caller brackets every transfer with
//! [`ControlRegion::select`](crate::control::ControlRegion::select) /
//! [`deselect_all`](crate::control::ControlRegion::deselect_all).

use crate::error::{Result, SiphraError};
use siphra_chip::frame::SPI_SPEED_HZ;
use spidev::{SpiModeFlags, Spidev, SpidevOptions, SpidevTransfer};
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// Full-duplex byte exchange
pub trait SpiBus: Debug + Send {
    /// Clock out `tx` and return the bytes clocked in (same length).
    ///
    /// # Errors
    ///
    /// Returns `Transfer` if the exchange fails.
    fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>>;
}

/// spidev-backed bus (mode 0, 100 kHz on every transfer)
pub struct SpidevBus {
    spi: Spidev,
    path: PathBuf,
}

impl std::fmt::Debug for SpidevBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpidevBus")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SpidevBus {
    /// Clock rate of every exchange; the SIPHRA register interface is not
    /// rated above it.
    pub const SPEED_HZ: u32 = SPI_SPEED_HZ;

    /// Open and configure a spidev node
    ///
    /// # Errors
    ///
    /// Returns `Spi` if the device cannot be opened or configured.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Opening SPI bus {} at {} Hz", path.display(), Self::SPEED_HZ);

        let mut spi = Spidev::open(path).map_err(|e| SiphraError::spi(path, e))?;
        let options = SpidevOptions::new()
            .mode(SpiModeFlags::SPI_MODE_0)
            .max_speed_hz(Self::SPEED_HZ)
            .build();
        spi.configure(&options)
            .map_err(|e| SiphraError::spi(path, e))?;

        tracing::info!("Opened SPI bus {}", path.display());

        Ok(Self {
            spi,
            path: path.to_path_buf(),
        })
    }

    /// Device path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SpiBus for SpidevBus {
    fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>> {
        let mut rx = vec![0u8; tx.len()];
        {
            let mut xfer = SpidevTransfer::read_write(tx, &mut rx);
            xfer.speed_hz = Self::SPEED_HZ;
            self.spi.transfer(&mut xfer).map_err(|e| {
                SiphraError::transfer_failed(format!("{}: {e}", self.path.display()))
            })?;
        }
        Ok(rx)
    }
}

/// The register link over one bus
#[derive(Debug)]
pub struct SpiChannel<B: SpiBus> {
    bus: B,
}

impl<B: SpiBus> SpiChannel<B> {
    /// Wrap an open bus
    pub const fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Exchange exactly `tx.len()` bytes
    ///
    /// # Errors
    ///
    /// Returns `Transfer` if the bus fails or returns a reply of the wrong length.
    pub fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>> {
        tracing::trace!("SPI tx {tx:02x?}");
        let rx = self.bus.transfer(tx)?;
        if rx.len() != tx.len() {
            return Err(SiphraError::transfer_failed(format!(
                "sent {} bytes, received {}",
                tx.len(),
                rx.len()
            )));
        }
        tracing::trace!("SPI rx {rx:02x?}");
        Ok(rx)
    }

    /// Underlying bus
    pub const fn bus(&self) -> &B {
        &self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct ShortBus;

    impl SpiBus for ShortBus {
        fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>> {
            Ok(tx[1..].to_vec())
        }
    }

    #[test]
    fn short_reply_is_transfer_error() {
        let mut channel = SpiChannel::new(ShortBus);
        let err = channel.transfer(&[1, 2, 3, 4, 5]).unwrap_err();
        assert!(matches!(err, SiphraError::Transfer { .. }));
    }

    #[test]
    fn bus_clock_is_fixed_at_100_khz() {
        assert_eq!(SpidevBus::SPEED_HZ, 100_000);
    }

    #[test]
    fn missing_bus_is_spi_error() {
        let err = SpidevBus::open("/nonexistent/spidev9.9").unwrap_err();
        assert!(matches!(err, SiphraError::Spi { .. }));
        assert!(err.is_fatal());
    }
}
