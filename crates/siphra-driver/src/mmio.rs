//! Memory-mapped D2a control window
//!
//! The D2a FPGA registers are exported by a UIO driver (`/dev/uio0`). Map 0
//! of the device is mapped once, read/write and shared, and held for the
//! lifetime of the controller.
//!
//! Minimal unsafe: the mmap itself, volatile byte accesses and the munmap in
//! `Drop`. Every access is bounds-checked before touching the mapping.

use crate::error::{Result, SiphraError};
use crate::window::{check_bounds, RegisterWindow};
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsFd;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// Memory-mapped UIO region
#[derive(Debug)]
pub struct UioRegion {
    ptr: NonNull<u8>,
    size: usize,
    _file: File,
    path: PathBuf,
}

impl UioRegion {
    /// Map the first `size` bytes of a UIO device
    ///
    /// # Errors
    ///
    /// Returns `DeviceOpen` if the device cannot be opened, `size` is zero,
    /// or mmap fails. Without a mapping no controller operation can run.
    pub fn open(path: impl AsRef<Path>, size: usize) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Mapping UIO window {} ({size} bytes)", path.display());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| SiphraError::device_open(path, e))?;

        if size == 0 {
            return Err(SiphraError::device_open(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "zero-sized mapping"),
            ));
        }

        // SAFETY: mmap of a device file we just opened read/write.
        // - fd is valid and kept alive in `_file` for the lifetime of the mapping
        // - size is non-zero (checked above); offset 0 selects UIO map 0
        // - MAP_SHARED so writes reach the device registers
        // - the mapping is released exactly once in Drop
        let addr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                0,
            )
        }
        .map_err(|e| SiphraError::device_open(path, e))?;

        let ptr = NonNull::new(addr.cast::<u8>()).ok_or_else(|| {
            SiphraError::device_open(
                path,
                std::io::Error::new(std::io::ErrorKind::Other, "mmap returned null"),
            )
        })?;

        tracing::info!("Mapped {} at {ptr:p}, size={size:#x}", path.display());

        Ok(Self {
            ptr,
            size,
            _file: file,
            path: path.to_path_buf(),
        })
    }

    /// Device path this region was mapped from
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RegisterWindow for UioRegion {
    fn size(&self) -> usize {
        self.size
    }

    fn read_bytes(&self, offset: usize, buffer: &mut [u8]) -> Result<()> {
        check_bounds(offset, buffer.len(), self.size)?;

        for (i, byte) in buffer.iter_mut().enumerate() {
            // SAFETY: offset + i < offset + buffer.len() <= self.size (checked above),
            // ptr is valid for self.size bytes. Volatile: FPGA status bits change
            // underneath us and reads must not be merged or elided.
            *byte = unsafe { self.ptr.as_ptr().add(offset + i).read_volatile() };
        }

        tracing::trace!("Read {} bytes @ {offset:#x}: {buffer:02x?}", buffer.len());
        Ok(())
    }

    fn write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        check_bounds(offset, data.len(), self.size)?;

        tracing::trace!("Write {} bytes @ {offset:#x}: {data:02x?}", data.len());

        for (i, &byte) in data.iter().enumerate() {
            // SAFETY: offset + i < self.size (checked above); ptr valid for
            // self.size bytes. Volatile: every store drives board signals.
            unsafe { self.ptr.as_ptr().add(offset + i).write_volatile(byte) };
        }

        Ok(())
    }
}

impl Drop for UioRegion {
    fn drop(&mut self) {
        tracing::debug!("Unmapping {}", self.path.display());

        // SAFETY: ptr and size are exactly those returned by / passed to mmap in
        // open(); Drop runs once, so the region is still mapped.
        unsafe {
            if let Err(e) = munmap(self.ptr.as_ptr().cast(), self.size) {
                tracing::error!("munmap failed during drop: {e}");
            }
        }
    }
}

// SAFETY: UioRegion owns its mapping exclusively; moving it to another thread
// does not invalidate mmap'd memory. Writes need &mut self.
unsafe impl Send for UioRegion {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_device_is_open_error() {
        let err = UioRegion::open("/nonexistent/uio99", 4108).unwrap_err();
        assert!(matches!(err, SiphraError::DeviceOpen { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    #[ignore] // Requires hardware
    fn map_d2a_window() {
        let region = UioRegion::open("/dev/uio0", siphra_chip::window::WINDOW_SIZE)
            .expect("map /dev/uio0");
        let ctrl: [u8; 2] = region
            .read_array(siphra_chip::window::CONTROL_OFFSET)
            .expect("read control word");
        println!("control word: {ctrl:02x?}");
    }
}
