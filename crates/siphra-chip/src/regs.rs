//! SIPHRA register catalog.
//!
//! The ASIC exposes 28 registers, each 32 bits wide on the wire. Only the low
//! `significant_len` bits of a register carry data; the rest is padding that
//! may read back as anything and is ignored when a write is verified.
//!
//! ```text
//! 0x00-0x0F  channel 1..16 configuration        26 bits each
//! 0x10       summing channel configuration      14
//! 0x11       channel_config                     24
//! 0x12       channel_control                    23
//! 0x13       adc_config                          6
//! 0x14       cal_dac                             8
//! 0x15       power_modules                      18
//! 0x16       cal_ctrl                            6
//! 0x17       readout_fixed_list                 19
//! 0x18       readout_mode                       15
//! 0x19       amux_ctrl                           6
//! 0x1A       adc_clk_div_factor                  2
//! 0x1B       sysclock_ctrl                       2
//! ```

use crate::layout::{self, RegisterLayout};
use std::fmt;

/// Number of addressable registers.
pub const REGISTER_COUNT: usize = 28;

/// Number of per-channel configuration registers (addresses `0..16`).
pub const CHANNEL_COUNT: u8 = 16;

/// Register payload size on the wire, in bytes.
pub const REG_SIZE: usize = 4;

/// Significant bit length of every register, indexed by address.
pub const SIGNIFICANT_LENS: [u32; REGISTER_COUNT] = [
    26, 26, 26, 26, 26, 26, 26, 26, 26, 26, 26, 26, 26, 26, 26, 26, // channels
    14, 24, 23, 6, 8, 18, 6, 19, 15, 6, 2, 2,
];

// ── Named addresses ──────────────────────────────────────────────────────────

/// Summing channel configuration.
pub const SUMMING_CHANNEL: u8 = 0x10;
/// Shared analog chain configuration (gains, shaper).
pub const CHANNEL_CONFIG: u8 = 0x11;
/// Channel control.
pub const CHANNEL_CONTROL: u8 = 0x12;
/// ADC configuration.
pub const ADC_CONFIG: u8 = 0x13;
/// Calibration DAC.
pub const CAL_DAC: u8 = 0x14;
/// Power-up enables for analog blocks.
pub const POWER_MODULES: u8 = 0x15;
/// Calibration control.
pub const CAL_CTRL: u8 = 0x16;
/// Fixed readout list.
pub const READOUT_FIXED_LIST: u8 = 0x17;
/// Readout mode.
pub const READOUT_MODE: u8 = 0x18;
/// Analog multiplexer control.
pub const AMUX_CTRL: u8 = 0x19;
/// ADC clock divider.
pub const ADC_CLK_DIV_FACTOR: u8 = 0x1A;
/// System clock control.
pub const SYSCLOCK_CTRL: u8 = 0x1B;

/// Address outside the register catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownRegister(pub usize);

impl fmt::Display for UnknownRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "register address {:#04x} outside 0x00..={:#04x}",
            self.0,
            REGISTER_COUNT - 1
        )
    }
}

impl std::error::Error for UnknownRegister {}

/// A validated register address (`0..=27`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegisterAddress(u8);

impl RegisterAddress {
    /// Validate a raw address.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownRegister`] if `raw` is not in the catalog.
    pub fn new(raw: usize) -> Result<Self, UnknownRegister> {
        u8::try_from(raw)
            .ok()
            .filter(|&a| usize::from(a) < REGISTER_COUNT)
            .map(Self)
            .ok_or(UnknownRegister(raw))
    }

    /// Iterate every address in ascending order.
    pub fn all() -> impl Iterator<Item = Self> {
        // REGISTER_COUNT fits in u8
        #[allow(clippy::cast_possible_truncation)]
        (0..REGISTER_COUNT as u8).map(Self)
    }

    /// Raw address value.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Number of low-order bits that carry data.
    #[must_use]
    pub const fn significant_len(self) -> u32 {
        SIGNIFICANT_LENS[self.0 as usize]
    }

    /// Mask selecting the significant bits of a big-endian register word.
    #[must_use]
    pub const fn mask(self) -> u32 {
        len_mask(self.significant_len())
    }

    /// Bit-field layout of this register.
    #[must_use]
    pub fn layout(self) -> &'static RegisterLayout {
        match self.0 {
            a if a < CHANNEL_COUNT => &layout::CHANNEL,
            SUMMING_CHANNEL => &layout::SUMMING_CHANNEL,
            CHANNEL_CONFIG => &layout::CHANNEL_CONFIG,
            a => &layout::OPAQUE[usize::from(a - CHANNEL_CONTROL)],
        }
    }

    /// True for the 16 per-channel configuration registers.
    #[must_use]
    pub const fn is_channel(self) -> bool {
        self.0 < CHANNEL_COUNT
    }
}

impl TryFrom<usize> for RegisterAddress {
    type Error = UnknownRegister;

    fn try_from(raw: usize) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl fmt::Display for RegisterAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x} ({})", self.0, self.layout().name)
    }
}

/// Mask of the low `len` bits (`2^len - 1`), saturating at 32.
#[must_use]
pub const fn len_mask(len: u32) -> u32 {
    if len >= 32 {
        u32::MAX
    } else {
        (1u32 << len) - 1
    }
}

/// Compare two register words on their low `len` bits only.
///
/// Words are big-endian, as they travel on the SPI bus.
#[must_use]
pub fn compare_up_to(a: &[u8; REG_SIZE], b: &[u8; REG_SIZE], len: u32) -> bool {
    let mask = len_mask(len);
    u32::from_be_bytes(*a) & mask == u32::from_be_bytes(*b) & mask
}

/// Significant length for a raw address.
///
/// # Errors
///
/// Returns [`UnknownRegister`] for addresses outside the catalog.
pub fn significant_len(raw: usize) -> Result<u32, UnknownRegister> {
    RegisterAddress::new(raw).map(RegisterAddress::significant_len)
}
