//! Register configuration blobs
//!
//! A blob is the raw register image produced by the configuration tools: a
//! headerless run of 4-byte big-endian chunks, chunk `i` programming register
//! `i`. A trailing partial chunk is dropped.

use crate::error::{Result, SiphraError};
use bytes::Bytes;
use siphra_chip::regs::{REGISTER_COUNT, REG_SIZE};
use siphra_chip::RegisterAddress;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Register image ready for programming
#[derive(Debug, Clone)]
pub struct ConfigBlob {
    data: Bytes,
    source: Option<PathBuf>,
}

impl ConfigBlob {
    /// Blob from in-memory bytes
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let blob = Self {
            data: data.into(),
            source: None,
        };
        blob.warn_trailing();
        blob
    }

    /// Read a blob file
    ///
    /// # Errors
    ///
    /// Returns `ConfigBlob` if the file cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| SiphraError::config_blob(path, e))?;
        debug!("Read {} byte blob from {}", data.len(), path.display());

        let blob = Self {
            data: Bytes::from(data),
            source: Some(path.to_path_buf()),
        };
        blob.warn_trailing();
        Ok(blob)
    }

    fn warn_trailing(&self) {
        let extra = self.trailing_bytes();
        if extra > 0 {
            warn!(
                "Blob {}: ignoring {extra} trailing byte(s) after {} registers",
                self.source_name(),
                self.register_count()
            );
        }
    }

    fn source_name(&self) -> String {
        self.source
            .as_ref()
            .map_or_else(|| "<memory>".to_string(), |p| p.display().to_string())
    }

    /// File the blob was loaded from, if any
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Raw contents
    #[must_use]
    pub const fn as_bytes(&self) -> &Bytes {
        &self.data
    }

    /// Number of whole chunks (`floor(len / 4)`)
    #[must_use]
    pub fn register_count(&self) -> usize {
        self.data.len() / REG_SIZE
    }

    /// Bytes after the last whole chunk
    #[must_use]
    pub fn trailing_bytes(&self) -> usize {
        self.data.len() % REG_SIZE
    }

    /// Chunks in file order, without address validation
    pub fn chunks(&self) -> impl Iterator<Item = [u8; REG_SIZE]> + '_ {
        self.data.chunks_exact(REG_SIZE).map(|c| {
            let mut chunk = [0u8; REG_SIZE];
            chunk.copy_from_slice(c);
            chunk
        })
    }

    /// `(address, value)` pairs, checked against the register catalog
    ///
    /// # Errors
    ///
    /// Returns `UnknownRegister` for the first chunk beyond register 27, so
    /// an oversized blob is refused before any of it reaches hardware.
    pub fn registers(&self) -> Result<Vec<(RegisterAddress, [u8; REG_SIZE])>> {
        if self.register_count() > REGISTER_COUNT {
            return Err(SiphraError::UnknownRegister {
                address: REGISTER_COUNT,
            });
        }
        self.chunks()
            .enumerate()
            .map(|(i, chunk)| {
                RegisterAddress::new(i)
                    .map(|addr| (addr, chunk))
                    .map_err(SiphraError::from)
            })
            .collect()
    }
}
