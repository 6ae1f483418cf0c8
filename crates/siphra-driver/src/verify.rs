//! Verified register writes
//!
//! The SPI link to the SIPHRAs is noisy enough that a single write cannot be
//! trusted. Each verified write is: write frame, read frame, compare the low
//! `significant_len` bits of what was written against what came back. On a
//! mismatch the whole write + read is repeated, up to [`MAX_ATTEMPTS`] times.
//! After that the caller gets `WriteVerification { chip, address }`; no reset
//! or backoff is attempted here.
//!
//! Worst-case latency per register is `MAX_ATTEMPTS × (write + read)`, each
//! transfer five bytes at 100 kHz plus two control-word updates.

use crate::control::ControlRegion;
use crate::error::{Result, SiphraError};
use crate::spi::{SpiBus, SpiChannel};
use crate::window::RegisterWindow;
use siphra_chip::frame::{read_frame, read_payload, write_frame};
use siphra_chip::regs::{compare_up_to, REG_SIZE};
use siphra_chip::{Chip, RegisterAddress};
use tracing::{debug, trace, warn};

/// Write + read-back attempts before giving up
pub const MAX_ATTEMPTS: u32 = 3;

/// Decides whether a read-back confirms a write, given the significant length
pub type Comparator = fn(&[u8; REG_SIZE], &[u8; REG_SIZE], u32) -> bool;

/// Write-then-verify over a control region and an SPI channel
///
/// Borrows both for the duration of the operation: chip-select assert,
/// transfer and deassert happen inside one `&mut` borrow, so no other
/// transaction can interleave.
#[derive(Debug)]
pub struct VerifiedRegisterWriter<'a, W: RegisterWindow, B: SpiBus> {
    control: &'a mut ControlRegion<W>,
    spi: &'a mut SpiChannel<B>,
    compare: Comparator,
    max_attempts: u32,
}

impl<'a, W: RegisterWindow, B: SpiBus> VerifiedRegisterWriter<'a, W, B> {
    /// Writer with the masked comparison and three attempts
    pub fn new(control: &'a mut ControlRegion<W>, spi: &'a mut SpiChannel<B>) -> Self {
        Self {
            control,
            spi,
            compare: compare_up_to,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    /// Replace the read-back comparison
    #[must_use]
    pub fn with_comparator(mut self, compare: Comparator) -> Self {
        self.compare = compare;
        self
    }

    /// Change the attempt bound (at least one)
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// One SPI exchange with `chip` selected
    ///
    /// Chip-select is released even if the transfer fails.
    ///
    /// # Errors
    ///
    /// Returns the transfer error, or the control window error.
    pub fn transfer_selected(&mut self, chip: Chip, frame: &[u8]) -> Result<Vec<u8>> {
        self.control.select(chip)?;
        let reply = self.spi.transfer(frame);
        let released = self.control.deselect_all();
        let reply = reply?;
        released?;
        Ok(reply)
    }

    /// Unverified register write
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails.
    pub fn write(&mut self, chip: Chip, address: RegisterAddress, value: [u8; REG_SIZE]) -> Result<()> {
        let frame = write_frame(address, value);
        trace!("SIPHRA {chip} write {address}: {frame:02x?}");
        self.transfer_selected(chip, &frame)?;
        Ok(())
    }

    /// Register read
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails.
    pub fn read(&mut self, chip: Chip, address: RegisterAddress) -> Result<[u8; REG_SIZE]> {
        let reply = self.transfer_selected(chip, &read_frame(address))?;
        read_payload(&reply).ok_or_else(|| {
            SiphraError::transfer_failed(format!("short read reply: {} bytes", reply.len()))
        })
    }

    /// Write and confirm by read-back, retrying on mismatch
    ///
    /// Returns the number of attempts used.
    ///
    /// # Errors
    ///
    /// - `BroadcastNotAllowed` for `Chip::All` (read-back needs one device)
    /// - `WriteVerification { chip, address }` after the last mismatch
    /// - any transfer or window error, immediately
    pub fn write_verified(
        &mut self,
        chip: Chip,
        address: RegisterAddress,
        value: [u8; REG_SIZE],
    ) -> Result<u32> {
        if !chip.is_physical() {
            return Err(SiphraError::BroadcastNotAllowed {
                operation: "verified write",
            });
        }

        let len = address.significant_len();
        for attempt in 1..=self.max_attempts {
            self.write(chip, address, value)?;
            let readback = self.read(chip, address)?;

            if (self.compare)(&value, &readback, len) {
                debug!("SIPHRA {chip} {address} verified on attempt {attempt}");
                return Ok(attempt);
            }

            warn!(
                "SIPHRA {chip} {address}: wrote {value:02x?}, read {readback:02x?} \
                 ({len} significant bits), attempt {attempt}/{}",
                self.max_attempts
            );
        }

        Err(SiphraError::WriteVerification {
            chip,
            address: address.get(),
        })
    }
}
