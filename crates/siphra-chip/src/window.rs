//! D2a control / status window.
//!
//! The D2a FPGA exposes a small UIO region. One 16-bit control word carries
//! the hold (external trigger) rate, the reset lines, the chip-select lines
//! and the sysclk divisor for all four SIPHRAs at once; two status words carry
//! the error pins and the raw temperature ADC readings.
//!
//! ```text
//! offset  size  content
//! ──────  ────  ─────────────────────────────────────────────────────────────
//!  0x000    3   status 1: tempC(12) tempD(12)                    (bit stream)
//!  0x1000   2   control:  hold[15:12] reset[11:8] cs[7:4] sysclk[3:0]  (BE)
//!  0x1008   4   status 0: error(4) tempA(12) tempB(12) pad(4)       (bit stream)
//! ```
//!
//! The status words are bit streams: bytes in address order, each byte
//! taken LSB first. Fields are then read MSB first in the order listed, so
//! bit 0 of the byte at 0x1008 is the MSB of `error`.

use crate::chip::FIELD_MASK;
use crate::chip::Chip;

/// Bytes mapped from the UIO device.
pub const WINDOW_SIZE: usize = 4108;

/// Offset of the 16-bit control word.
pub const CONTROL_OFFSET: usize = 4096;
/// Control word size in bytes.
pub const CONTROL_SIZE: usize = 2;

/// Offset of status word 0 (error nibble, temperatures A and B).
pub const STATUS0_OFFSET: usize = 4104;
/// Offset of status word 1 (temperatures C and D).
pub const STATUS1_OFFSET: usize = 0;
/// Status word size in bytes.
pub const STATUS_SIZE: usize = 4;

/// Width of one raw temperature reading.
pub const TEMP_BITS: u32 = 12;
const TEMP_MASK: u32 = (1 << TEMP_BITS) - 1;

/// A 4-bit field of the control word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlField {
    /// External trigger (hold) rate code.
    Hold,
    /// Reset lines, active high, one bit per chip.
    Reset,
    /// Chip-select lines, active low, one bit per chip.
    ChipSelect,
    /// System clock divisor code.
    SysClk,
}

impl ControlField {
    /// Every field, MSB first.
    pub const ALL: [Self; 4] = [Self::Hold, Self::Reset, Self::ChipSelect, Self::SysClk];

    /// Bit offset of the field inside the control word.
    #[must_use]
    pub const fn shift(self) -> u32 {
        match self {
            Self::Hold => 12,
            Self::Reset => 8,
            Self::ChipSelect => 4,
            Self::SysClk => 0,
        }
    }

    /// Mask of the field in place.
    #[must_use]
    pub const fn mask(self) -> u16 {
        (FIELD_MASK as u16) << self.shift()
    }

    /// Field name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Hold => "hold",
            Self::Reset => "reset",
            Self::ChipSelect => "cs",
            Self::SysClk => "sysclk",
        }
    }
}

/// The 16-bit control word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlWord(pub u16);

impl ControlWord {
    /// Decode from the two bytes at [`CONTROL_OFFSET`].
    #[must_use]
    pub const fn from_bytes(bytes: [u8; CONTROL_SIZE]) -> Self {
        Self(u16::from_be_bytes(bytes))
    }

    /// Encode for writing back at [`CONTROL_OFFSET`].
    #[must_use]
    pub const fn to_bytes(self) -> [u8; CONTROL_SIZE] {
        self.0.to_be_bytes()
    }

    /// Read one field.
    #[must_use]
    pub const fn get(self, field: ControlField) -> u8 {
        // masked to 4 bits
        #[allow(clippy::cast_possible_truncation)]
        let v = ((self.0 & field.mask()) >> field.shift()) as u8;
        v
    }

    /// Replace one field; the other three are preserved. `value` is truncated
    /// to 4 bits.
    #[must_use]
    pub const fn with(self, field: ControlField, value: u8) -> Self {
        let v = ((value & FIELD_MASK) as u16) << field.shift();
        Self((self.0 & !field.mask()) | v)
    }
}

/// External trigger gating applied to the data-ready line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerMode {
    /// Triggering disabled.
    Off,
    /// 1 Hz external trigger.
    Hz1,
    /// 1 kHz external trigger.
    KHz1,
}

impl TriggerMode {
    /// Code written to the hold field.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Hz1 => 2,
            Self::KHz1 => 1,
        }
    }

    /// Inverse of [`code`](Self::code).
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Off),
            2 => Some(Self::Hz1),
            1 => Some(Self::KHz1),
            _ => None,
        }
    }
}

/// Raw 12-bit temperature ADC readings, one per chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Temperatures {
    /// SIPHRA A.
    pub a: u16,
    /// SIPHRA B.
    pub b: u16,
    /// SIPHRA C.
    pub c: u16,
    /// SIPHRA D.
    pub d: u16,
}

impl Temperatures {
    /// Reading for one physical chip; `None` for [`Chip::All`].
    #[must_use]
    pub const fn get(&self, chip: Chip) -> Option<u16> {
        match chip {
            Chip::A => Some(self.a),
            Chip::B => Some(self.b),
            Chip::C => Some(self.c),
            Chip::D => Some(self.d),
            Chip::All => None,
        }
    }
}

/// The two status words, as read from the window.
///
/// Each word is held as its bit stream: the first bit read from the window
/// sits at bit 31.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusWords {
    /// Stream at [`STATUS0_OFFSET`].
    pub word0: u32,
    /// Stream at [`STATUS1_OFFSET`]; only the top 24 bits carry data.
    pub word1: u32,
}

impl StatusWords {
    /// Decode from the raw bytes at the two status offsets.
    #[must_use]
    pub const fn from_bytes(word0: [u8; STATUS_SIZE], word1: [u8; STATUS_SIZE]) -> Self {
        Self {
            word0: bit_stream(word0),
            word1: bit_stream(word1),
        }
    }

    /// Error pins of chips A..D as a bitmask (bit 0 = A).
    #[must_use]
    pub const fn error_mask(&self) -> u8 {
        #[allow(clippy::cast_possible_truncation)]
        let v = (self.word0 >> 28) as u8;
        v
    }

    /// The four raw temperature readings.
    #[must_use]
    pub const fn temperatures(&self) -> Temperatures {
        Temperatures {
            a: temp_at(self.word0, 16),
            b: temp_at(self.word0, 4),
            c: temp_at(self.word1, 20),
            d: temp_at(self.word1, 8),
        }
    }
}

/// Bytes in address order, each byte LSB first.
const fn bit_stream(bytes: [u8; STATUS_SIZE]) -> u32 {
    u32::from_le_bytes(bytes).reverse_bits()
}

const fn temp_at(word: u32, shift: u32) -> u16 {
    #[allow(clippy::cast_possible_truncation)]
    let v = ((word >> shift) & TEMP_MASK) as u16;
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_layout_fits_mapping() {
        assert!(CONTROL_OFFSET + CONTROL_SIZE <= WINDOW_SIZE);
        assert_eq!(STATUS0_OFFSET + STATUS_SIZE, WINDOW_SIZE);
        assert!(STATUS1_OFFSET + STATUS_SIZE <= CONTROL_OFFSET);
    }

    #[test]
    fn control_fields_do_not_overlap() {
        let union = ControlField::ALL.iter().fold(0u16, |acc, f| {
            assert_eq!(acc & f.mask(), 0, "{} overlaps", f.name());
            acc | f.mask()
        });
        assert_eq!(union, 0xFFFF);
    }

    #[test]
    fn with_preserves_other_fields() {
        let word = ControlWord(0xA5C3);
        let updated = word.with(ControlField::Reset, 0x0F);
        assert_eq!(updated, ControlWord(0xAFC3));
        assert_eq!(updated.get(ControlField::Hold), 0xA);
        assert_eq!(updated.get(ControlField::ChipSelect), 0xC);
        assert_eq!(updated.get(ControlField::SysClk), 0x3);
    }

    #[test]
    fn control_word_byte_order() {
        let word = ControlWord::from_bytes([0x21, 0xF6]);
        assert_eq!(word.get(ControlField::Hold), 2);
        assert_eq!(word.get(ControlField::Reset), 1);
        assert_eq!(word.get(ControlField::ChipSelect), 0xF);
        assert_eq!(word.get(ControlField::SysClk), 6);
        assert_eq!(word.to_bytes(), [0x21, 0xF6]);
    }

    #[test]
    fn trigger_codes() {
        assert_eq!(TriggerMode::Off.code(), 0);
        assert_eq!(TriggerMode::Hz1.code(), 2);
        assert_eq!(TriggerMode::KHz1.code(), 1);
        assert_eq!(TriggerMode::from_code(3), None);
        for mode in [TriggerMode::Off, TriggerMode::Hz1, TriggerMode::KHz1] {
            assert_eq!(TriggerMode::from_code(mode.code()), Some(mode));
        }
    }

    #[test]
    fn status_bytes_are_read_lsb_first() {
        // first bit on the window is the MSB of the error nibble
        let status = StatusWords::from_bytes([0x01, 0, 0, 0], [0; 4]);
        assert_eq!(status.error_mask(), 0b1000);

        let status = StatusWords::from_bytes([0x08, 0, 0, 0], [0; 4]);
        assert_eq!(status.error_mask(), 0b0001);
        assert_eq!(status.temperatures(), Temperatures::default());

        // bit 4 of byte 0 starts tempA
        let status = StatusWords::from_bytes([0x10, 0, 0, 0], [0; 4]);
        assert_eq!(status.error_mask(), 0);
        assert_eq!(status.temperatures().a, 0x800);
    }

    #[test]
    fn status_decodes_fixed_pattern() {
        // Streams error=0x5 tempA=0x123 tempB=0x456 pad=0 and
        // tempC=0x789 tempD=0xABC, each byte bit-reversed on the window.
        let word0 = [0x8A, 0xC4, 0xA2, 0x06];
        let word1 = [0x1E, 0x59, 0x3D, 0x00];
        let status = StatusWords::from_bytes(word0, word1);

        assert_eq!(status.word0, 0x5123_4560);
        assert_eq!(status.word1, 0x789A_BC00);
        assert_eq!(status.error_mask(), 0x5);
        assert_eq!(
            status.temperatures(),
            Temperatures {
                a: 0x123,
                b: 0x456,
                c: 0x789,
                d: 0xABC,
            }
        );
    }

    #[test]
    fn fourth_byte_of_status1_is_ignored() {
        let status = StatusWords::from_bytes([0; 4], [0, 0, 0, 0xFF]);
        assert_eq!(status.temperatures(), Temperatures::default());
    }

    #[test]
    fn temperature_lookup_by_chip() {
        let t = Temperatures { a: 1, b: 2, c: 3, d: 4 };
        assert_eq!(t.get(Chip::C), Some(3));
        assert_eq!(t.get(Chip::All), None);
    }
}
