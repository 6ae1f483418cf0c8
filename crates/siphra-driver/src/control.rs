//! Control region: read-modify-write of the shared control word
//!
//! All four chips' hold / reset / chip-select / sysclk bits share one 16-bit
//! word. Every field write reads the whole word, updates one field and writes
//! the whole word back, so the other three fields keep their current values.
//! The sequence runs under `&mut self`; the borrow checker gives the critical
//! section for free as long as one owner holds the region.

use crate::error::{Result, SiphraError};
use crate::window::RegisterWindow;
use siphra_chip::chip::FIELD_MASK;
use siphra_chip::window::{
    ControlField, ControlWord, StatusWords, CONTROL_OFFSET, STATUS0_OFFSET, STATUS1_OFFSET,
};
use siphra_chip::Chip;

/// How a field write combines with the current field value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    /// Replace the field outright
    Assign(u8),
    /// OR in the chip's bit(s)
    Set(Chip),
    /// AND with the complement of the chip's bit(s)
    Clear(Chip),
}

impl Update {
    /// New field value given the current one
    #[must_use]
    pub const fn apply(self, current: u8) -> u8 {
        match self {
            Self::Assign(v) => v,
            Self::Set(chip) => current | chip.bits(),
            Self::Clear(chip) => current & chip.inverse_bits(),
        }
    }
}

/// Owner of the D2a control / status window
#[derive(Debug)]
pub struct ControlRegion<W: RegisterWindow> {
    window: W,
}

impl<W: RegisterWindow> ControlRegion<W> {
    /// Wrap an already-mapped window
    pub const fn new(window: W) -> Self {
        Self { window }
    }

    /// Current control word
    ///
    /// # Errors
    ///
    /// Returns an error if the window read fails.
    pub fn read_word(&self) -> Result<ControlWord> {
        let bytes = self.window.read_array(CONTROL_OFFSET)?;
        Ok(ControlWord::from_bytes(bytes))
    }

    /// Read one 4-bit control field
    ///
    /// # Errors
    ///
    /// Returns an error if the window read fails.
    pub fn read_field(&self, field: ControlField) -> Result<u8> {
        Ok(self.read_word()?.get(field))
    }

    /// Read-modify-write one control field
    ///
    /// # Errors
    ///
    /// Returns `ValueOutOfRange` for an `Assign` wider than 4 bits, or an
    /// error if the window access fails.
    pub fn write_field(&mut self, field: ControlField, update: Update) -> Result<()> {
        if let Update::Assign(v) = update {
            if v > FIELD_MASK {
                return Err(SiphraError::ValueOutOfRange {
                    field: field.name(),
                    value: u32::from(v),
                    bits: 4,
                });
            }
        }

        let word = self.read_word()?;
        let old = word.get(field);
        let new = update.apply(old);
        let word = word.with(field, new);

        tracing::debug!(
            "{}: {old:#06b} -> {new:#06b} ({update:?}), word={:#06x}",
            field.name(),
            word.0
        );
        self.window.write_bytes(CONTROL_OFFSET, &word.to_bytes())
    }

    /// Drive the chip-select field so only `chip` listens (active low)
    ///
    /// `Chip::All` selects every device at once.
    ///
    /// # Errors
    ///
    /// Returns an error if the window access fails.
    pub fn select(&mut self, chip: Chip) -> Result<()> {
        self.write_field(ControlField::ChipSelect, Update::Assign(chip.inverse_bits()))
    }

    /// Release every chip-select line
    ///
    /// # Errors
    ///
    /// Returns an error if the window access fails.
    pub fn deselect_all(&mut self) -> Result<()> {
        self.write_field(ControlField::ChipSelect, Update::Assign(FIELD_MASK))
    }

    /// Both status words
    ///
    /// # Errors
    ///
    /// Returns an error if the window read fails.
    pub fn read_status(&self) -> Result<StatusWords> {
        let word0 = self.window.read_array(STATUS0_OFFSET)?;
        let word1 = self.window.read_array(STATUS1_OFFSET)?;
        Ok(StatusWords::from_bytes(word0, word1))
    }

    /// Underlying window
    pub const fn window(&self) -> &W {
        &self.window
    }
}
