//! Raw access to the D2a control / status window
//!
//! `RegisterWindow` is the seam between the controller and the hardware: the
//! production implementation is the UIO mapping in [`crate::mmio`], tests use
//! [`crate::sim::MemoryWindow`].

use crate::error::{Result, SiphraError};
use std::fmt::Debug;

/// Fixed-size byte window with read / write at offsets.
pub trait RegisterWindow: Debug + Send {
    /// Window size in bytes.
    fn size(&self) -> usize;

    /// Fill `buffer` from `offset`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if the range exceeds the window.
    fn read_bytes(&self, offset: usize, buffer: &mut [u8]) -> Result<()>;

    /// Write `data` at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if the range exceeds the window.
    fn write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<()>;

    /// Read a fixed-size array.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if the range exceeds the window.
    fn read_array<const N: usize>(&self, offset: usize) -> Result<[u8; N]>
    where
        Self: Sized,
    {
        let mut buf = [0u8; N];
        self.read_bytes(offset, &mut buf)?;
        Ok(buf)
    }
}

/// Reject accesses that would leave a window of `limit` bytes.
pub(crate) fn check_bounds(offset: usize, len: usize, limit: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= limit => Ok(()),
        _ => Err(SiphraError::OutOfBounds { offset, len, limit }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds() {
        assert!(check_bounds(0, 4, 4).is_ok());
        assert!(check_bounds(4104, 4, 4108).is_ok());
        assert!(matches!(
            check_bounds(4106, 4, 4108),
            Err(SiphraError::OutOfBounds {
                offset: 4106,
                len: 4,
                limit: 4108
            })
        ));
        assert!(check_bounds(usize::MAX, 1, 4108).is_err());
    }
}
