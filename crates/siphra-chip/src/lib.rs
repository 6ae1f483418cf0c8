//! Silicon model for the SIPHRA front-end ASIC and the D2a carrier board.
//!
//! This crate has **no dependencies** and **no hardware access**. It is a pure
//! model of the silicon and of the board glue around it: register addresses,
//! per-register bit layouts, significant-bit lengths, the chip-select
//! multiplexing of the four ASICs, the control/status window of the D2a
//! board, and the SPI frame format.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`regs`] | Register catalog: 28 addresses, significant lengths, masked compare |
//! | [`layout`] | Bit-field layouts (channel, summing channel, channel config, ...) |
//! | [`chip`] | `Chip` {A, B, C, D, All} and its select / deselect masks |
//! | [`window`] | D2a control word, status words, trigger modes |
//! | [`frame`] | SPI read / write frames (address byte + 4 payload bytes) |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod chip;
pub mod frame;
pub mod layout;
pub mod regs;
pub mod window;

pub use chip::{Chip, ParseChipError};
pub use layout::{Field, RegisterLayout};
pub use regs::{RegisterAddress, UnknownRegister};
pub use window::{ControlField, ControlWord, StatusWords, Temperatures, TriggerMode};
