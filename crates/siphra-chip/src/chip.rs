//! Chip identifiers and chip-select masks.
//!
//! The D2a board carries four SIPHRAs (A..D). Every per-chip line (reset,
//! chip-select) lives in a 4-bit field of the shared control word, one bit per
//! chip:
//!
//! | Chip | bits   | inverse |
//! |------|--------|---------|
//! | A    | `0001` | `1110`  |
//! | B    | `0010` | `1101`  |
//! | C    | `0100` | `1011`  |
//! | D    | `1000` | `0111`  |
//! | All  | `1111` | `0000`  |
//!
//! Chip-select is active low: selecting chip B alone means writing `1101` to
//! the CS field.

use std::fmt;
use std::str::FromStr;

/// All four bits of a per-chip field.
pub const FIELD_MASK: u8 = 0b1111;

/// A SIPHRA on the D2a board, or all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Chip {
    /// SIPHRA A.
    A,
    /// SIPHRA B.
    B,
    /// SIPHRA C.
    C,
    /// SIPHRA D.
    D,
    /// Broadcast marker; not a physical device.
    All,
}

impl Chip {
    /// The four physical chips, in programming order.
    pub const PHYSICAL: [Self; 4] = [Self::A, Self::B, Self::C, Self::D];

    /// OR-mask of this chip's bit(s) in a per-chip field.
    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            Self::A => 0b0001,
            Self::B => 0b0010,
            Self::C => 0b0100,
            Self::D => 0b1000,
            Self::All => FIELD_MASK,
        }
    }

    /// Complement of [`bits`](Self::bits) within the 4-bit field.
    ///
    /// Used as an AND-mask to clear this chip's bit, and as the active-low
    /// chip-select pattern that selects only this chip.
    #[must_use]
    pub const fn inverse_bits(self) -> u8 {
        !self.bits() & FIELD_MASK
    }

    /// True for `A`..`D`.
    #[must_use]
    pub const fn is_physical(self) -> bool {
        !matches!(self, Self::All)
    }

    /// Physical chips this identifier stands for.
    #[must_use]
    pub fn physical(self) -> &'static [Self] {
        match self {
            Self::A => &[Self::A],
            Self::B => &[Self::B],
            Self::C => &[Self::C],
            Self::D => &[Self::D],
            Self::All => &Self::PHYSICAL,
        }
    }

    /// Chips whose bit is clear in an active-low select pattern.
    pub fn selected_by(cs_field: u8) -> impl Iterator<Item = Self> {
        Self::PHYSICAL
            .into_iter()
            .filter(move |c| cs_field & c.bits() == 0)
    }
}

impl fmt::Display for Chip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::All => "All",
        })
    }
}

/// Chip name not one of `A`, `B`, `C`, `D`, `All`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseChipError(pub String);

impl fmt::Display for ParseChipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid chip {:?} (expected A, B, C, D or All)", self.0)
    }
}

impl std::error::Error for ParseChipError {}

impl FromStr for Chip {
    type Err = ParseChipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Ok(Self::A),
            "b" => Ok(Self::B),
            "c" => Ok(Self::C),
            "d" => Ok(Self::D),
            "all" => Ok(Self::All),
            _ => Err(ParseChipError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn masks_are_injective() {
        let masks: HashSet<u8> = Chip::PHYSICAL.iter().map(|c| c.bits()).collect();
        assert_eq!(masks.len(), 4);
        for chip in Chip::PHYSICAL {
            assert_eq!(chip.bits().count_ones(), 1);
        }
    }

    #[test]
    fn inverse_is_complement_within_field() {
        for chip in [Chip::A, Chip::B, Chip::C, Chip::D, Chip::All] {
            assert_eq!(chip.bits() ^ chip.inverse_bits(), FIELD_MASK);
            assert_eq!(chip.bits() & chip.inverse_bits(), 0);
            assert_eq!(chip.inverse_bits() & !FIELD_MASK, 0);
        }
        assert_eq!(Chip::B.inverse_bits(), 0b1101);
        assert_eq!(Chip::All.inverse_bits(), 0);
    }

    #[test]
    fn inverse_selects_exactly_one_chip() {
        for chip in Chip::PHYSICAL {
            let selected: Vec<_> = Chip::selected_by(chip.inverse_bits()).collect();
            assert_eq!(selected, vec![chip]);
        }
        assert_eq!(Chip::selected_by(FIELD_MASK).count(), 0);
        assert_eq!(Chip::selected_by(0).count(), 4);
    }

    #[test]
    fn all_expands_in_order() {
        assert_eq!(Chip::All.physical(), &[Chip::A, Chip::B, Chip::C, Chip::D]);
        assert_eq!(Chip::C.physical(), &[Chip::C]);
        assert!(!Chip::All.is_physical());
    }

    #[test]
    fn parse_names() {
        assert_eq!("A".parse::<Chip>(), Ok(Chip::A));
        assert_eq!("d".parse::<Chip>(), Ok(Chip::D));
        assert_eq!("ALL".parse::<Chip>(), Ok(Chip::All));
        assert!("E".parse::<Chip>().is_err());
        assert!("".parse::<Chip>().is_err());
        assert_eq!(Chip::All.to_string(), "All");
    }
}
