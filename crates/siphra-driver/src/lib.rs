//! Userspace driver for SIPHRA front-end ASICs on the D2a carrier board.
//!
//! Four SIPHRAs share one SPI bus and one 16-bit control word. The control
//! word (hold mode, reset, chip-select, sysclk divisor) and two status words
//! live in a UIO-mapped FPGA window; register contents travel over spidev.
//!
//! # Layers
//!
//! ```text
//! DeviceController
//!   ├── ControlRegion<W: RegisterWindow>     control / status window (UioRegion)
//!   └── VerifiedRegisterWriter
//!         ├── ControlRegion                  chip-select per transfer
//!         └── SpiChannel<B: SpiBus>          5-byte frames at 100 kHz (SpidevBus)
//! ```
//!
//! [`sim`] provides in-memory `MemoryWindow` / `LoopbackSpi` stand-ins with
//! fault injection, so everything above the two traits runs without hardware.
//!
//! # Quick start
//!
//! ```no_run
//! use siphra_driver::{ControllerConfig, DeviceController};
//! use siphra_chip::Chip;
//!
//! # fn main() -> siphra_driver::Result<()> {
//! let config = ControllerConfig::from_env();
//! let mut ctl = DeviceController::open(&config)?;
//!
//! ctl.set_clock(6)?;
//! ctl.reset(Chip::All, config.reset_toggle)?;
//! ctl.program_from_file("siphra.bin", Chip::All)?;
//! ctl.trigger_1hz()?;
//!
//! let temps = ctl.read_temperatures()?;
//! println!("A={} B={} C={} D={}", temps.a, temps.b, temps.c, temps.d);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

mod blob;
mod config;
pub mod control;
mod device;
mod error;
pub mod mmio;
pub mod sim;
pub mod spi;
pub mod verify;
mod window;

pub use blob::ConfigBlob;
pub use config::{ControllerConfig, ENV_RESET_TOGGLE_MS, ENV_SPI, ENV_UIO};
pub use control::{ControlRegion, Update};
pub use device::{DeviceController, ProgramMetrics};
pub use error::{Result, SiphraError};
pub use mmio::UioRegion;
pub use spi::{SpiBus, SpiChannel, SpidevBus};
pub use verify::{Comparator, VerifiedRegisterWriter, MAX_ATTEMPTS};
pub use window::RegisterWindow;

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        ConfigBlob, ControllerConfig, DeviceController, ProgramMetrics, Result, SiphraError,
        Update,
    };
    pub use siphra_chip::{Chip, ControlField, RegisterAddress, Temperatures, TriggerMode};
}
