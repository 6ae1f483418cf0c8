//! Bit-field layouts of SIPHRA registers.
//!
//! Every register is a 32-bit big-endian word. Unused high bits come first as
//! padding; named fields follow MSB first, so the last field listed sits at
//! bit 0.
//!
//! ```text
//! channel (0x00-0x0F)
//!  31    26 25        18 17  15  14   13  12       5 4   2  1    0
//! ┌───────┬────────────┬──────┬────┬────┬──────────┬─────┬────┬────┐
//! │  pad  │  voffset   │ioffs │ imp│ cal│threshold │hyst │ pu │trig│
//! └───────┴────────────┴──────┴────┴────┴──────────┴─────┴────┴────┘
//! ```

/// Register word width in bits.
pub const WORD_BITS: u32 = 32;

/// A named bit-field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Field name.
    pub name: &'static str,
    /// Width in bits.
    pub width: u32,
}

impl Field {
    const fn new(name: &'static str, width: u32) -> Self {
        Self { name, width }
    }
}

/// Ordered set of fields packed into one register word.
#[derive(Debug, PartialEq, Eq)]
pub struct RegisterLayout {
    /// Layout name.
    pub name: &'static str,
    /// Fields, most significant first.
    pub fields: &'static [Field],
}

/// Per-channel configuration (16 registers share it).
pub static CHANNEL: RegisterLayout = RegisterLayout {
    name: "channel",
    fields: &[
        Field::new("cmis_detector_voffset", 8),
        Field::new("cmis_detector_ioffset", 3),
        Field::new("cmis_impedance_reduction", 1),
        Field::new("cal_select_channel", 1),
        Field::new("qc_threshold", 8),
        Field::new("qc_hysteresis", 3),
        Field::new("pu_channel", 1),
        Field::new("enable_triggering", 1),
    ],
};

/// Summing channel configuration.
pub static SUMMING_CHANNEL: RegisterLayout = RegisterLayout {
    name: "summing_channel",
    fields: &[
        Field::new("cal_select_channel", 1),
        Field::new("qc_threshold", 8),
        Field::new("qc_hysteresis", 3),
        Field::new("pu_channel", 1),
        Field::new("enable_triggering", 1),
    ],
};

/// Analog chain configuration shared by all channels.
///
/// The register keeps 24 bits; `cmis_gain` is the 3-bit field at 23:21.
pub static CHANNEL_CONFIG: RegisterLayout = RegisterLayout {
    name: "channel_config",
    fields: &[
        Field::new("cmis_gain", 3),
        Field::new("ci_gain", 2),
        Field::new("ci_compmode", 1),
        Field::new("shaper_bias", 4),
        Field::new("shaper_feedback_cap", 4),
        Field::new("shaper_feedback_res", 3),
        Field::new("shaper_hold_cap", 3),
        Field::new("shaper_input_cap", 4),
    ],
};

macro_rules! opaque {
    ($name:literal, $width:literal) => {
        RegisterLayout {
            name: $name,
            fields: &[Field::new("value", $width)],
        }
    };
}

/// Registers `0x12..=0x1B`, exposed as a single `value` field each.
pub static OPAQUE: [RegisterLayout; 10] = [
    opaque!("channel_control", 23),
    opaque!("adc_config", 6),
    opaque!("cal_dac", 8),
    opaque!("power_modules", 18),
    opaque!("cal_ctrl", 6),
    opaque!("readout_fixed_list", 19),
    opaque!("readout_mode", 15),
    opaque!("amux_ctrl", 6),
    opaque!("adc_clk_div_factor", 2),
    opaque!("sysclock_ctrl", 2),
];

/// Position of a field inside a register word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Bit offset of the field's LSB.
    pub shift: u32,
    /// Field width in bits.
    pub width: u32,
}

impl Placement {
    /// Mask of the field in place.
    #[must_use]
    pub const fn mask(&self) -> u32 {
        crate::regs::len_mask(self.width) << self.shift
    }
}

impl RegisterLayout {
    /// Total width of the named fields.
    #[must_use]
    pub fn data_bits(&self) -> u32 {
        self.fields.iter().map(|f| f.width).sum()
    }

    /// Leading padding bits.
    #[must_use]
    pub fn padding(&self) -> u32 {
        WORD_BITS - self.data_bits()
    }

    /// Locate a field by name.
    #[must_use]
    pub fn placement(&self, name: &str) -> Option<Placement> {
        let mut shift = self.data_bits();
        for field in self.fields {
            shift -= field.width;
            if field.name == name {
                return Some(Placement {
                    shift,
                    width: field.width,
                });
            }
        }
        None
    }

    /// Extract one field from a word.
    #[must_use]
    pub fn get(&self, word: u32, name: &str) -> Option<u32> {
        self.placement(name)
            .map(|p| (word & p.mask()) >> p.shift)
    }

    /// Replace one field in a word; other fields are preserved.
    ///
    /// Returns `None` if the field does not exist or `value` does not fit.
    #[must_use]
    pub fn set(&self, word: u32, name: &str, value: u32) -> Option<u32> {
        let p = self.placement(name)?;
        if value > crate::regs::len_mask(p.width) {
            return None;
        }
        Some((word & !p.mask()) | (value << p.shift))
    }

    /// Decode every field of a word, MSB first.
    #[must_use]
    pub fn unpack(&self, word: u32) -> Vec<(&'static str, u32)> {
        let mut shift = self.data_bits();
        self.fields
            .iter()
            .map(|f| {
                shift -= f.width;
                (f.name, (word >> shift) & crate::regs::len_mask(f.width))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_layout_packs_26_bits() {
        assert_eq!(CHANNEL.data_bits(), 26);
        assert_eq!(CHANNEL.padding(), 6);
        assert_eq!(SUMMING_CHANNEL.data_bits(), 14);
        assert_eq!(CHANNEL_CONFIG.data_bits(), 24);
        assert_eq!(CHANNEL_CONFIG.padding(), 8);
    }

    #[test]
    fn channel_config_gain_is_top_field() {
        let p = CHANNEL_CONFIG.placement("cmis_gain").unwrap();
        assert_eq!(p, Placement { shift: 21, width: 3 });
        assert_eq!(p.mask(), 0x00E0_0000);
        assert_eq!(CHANNEL_CONFIG.set(0, "cmis_gain", 8), None);
        assert_eq!(CHANNEL_CONFIG.placement("shaper_input_cap").unwrap().shift, 0);
    }

    #[test]
    fn last_field_sits_at_bit_zero() {
        let p = CHANNEL.placement("enable_triggering").unwrap();
        assert_eq!(p, Placement { shift: 0, width: 1 });
        let p = CHANNEL.placement("cmis_detector_voffset").unwrap();
        assert_eq!(p, Placement { shift: 18, width: 8 });
        let p = CHANNEL.placement("qc_threshold").unwrap();
        assert_eq!(p.shift, 5);
    }

    #[test]
    fn set_preserves_neighbouring_fields() {
        let word = CHANNEL.set(0, "qc_threshold", 0xAB).unwrap();
        let word = CHANNEL.set(word, "pu_channel", 1).unwrap();
        assert_eq!(CHANNEL.get(word, "qc_threshold"), Some(0xAB));
        assert_eq!(CHANNEL.get(word, "pu_channel"), Some(1));
        assert_eq!(CHANNEL.get(word, "enable_triggering"), Some(0));
        assert_eq!(word, (0xAB << 5) | (1 << 1));
    }

    #[test]
    fn set_rejects_overflow_and_unknown_names() {
        assert_eq!(CHANNEL.set(0, "qc_hysteresis", 8), None);
        assert_eq!(CHANNEL.set(0, "no_such_field", 1), None);
        assert_eq!(CHANNEL.get(0, "no_such_field"), None);
    }

    #[test]
    fn unpack_ignores_padding() {
        let fields = SUMMING_CHANNEL.unpack(0xFFFF_C000 | 0b1_0000_0001_000_1_0);
        assert_eq!(
            fields,
            vec![
                ("cal_select_channel", 1),
                ("qc_threshold", 1),
                ("qc_hysteresis", 0),
                ("pu_channel", 1),
                ("enable_triggering", 0),
            ]
        );
    }
}
