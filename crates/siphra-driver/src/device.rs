//! SIPHRA controller
//!
//! One `DeviceController` owns the control window and the SPI bus for all
//! four ASICs on a D2a board. Clock, reset and trigger gating go through the
//! control word; register contents go through verified SPI writes.
//!
//! Per chip the expected order is: reset, program registers, enable
//! triggering. Programming a chip that is held in reset is not prevented
//! here; the result depends on the hardware.

use crate::blob::ConfigBlob;
use crate::config::ControllerConfig;
use crate::control::{ControlRegion, Update};
use crate::error::{Result, SiphraError};
use crate::mmio::UioRegion;
use crate::spi::{SpiBus, SpiChannel, SpidevBus};
use crate::verify::{Comparator, VerifiedRegisterWriter};
use crate::window::RegisterWindow;
use siphra_chip::regs::{compare_up_to, len_mask, REG_SIZE};
use siphra_chip::{Chip, ControlField, RegisterAddress, Temperatures, TriggerMode};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Outcome of a bulk programming run
#[derive(Debug, Clone, Default)]
pub struct ProgramMetrics {
    /// Registers written and verified
    pub registers_written: usize,

    /// Attempts beyond the first, summed over all registers
    pub retries: u32,

    /// Wall-clock time for the whole run
    pub duration: Duration,
}

/// Controller for the four SIPHRAs behind one control window and SPI bus
#[derive(Debug)]
pub struct DeviceController<W: RegisterWindow, B: SpiBus> {
    control: ControlRegion<W>,
    spi: SpiChannel<B>,
    compare: Comparator,
}

impl DeviceController<UioRegion, SpidevBus> {
    /// Map the UIO window and open the SPI bus named in `config`
    ///
    /// # Errors
    ///
    /// Returns `DeviceOpen` or `Spi` if either handle cannot be acquired.
    /// Both are fatal: there is no partially usable controller.
    pub fn open(config: &ControllerConfig) -> Result<Self> {
        let window = UioRegion::open(&config.uio_path, config.map_len)?;
        let bus = SpidevBus::open(&config.spi_path)?;
        Self::new(window, bus)
    }
}

impl<W: RegisterWindow, B: SpiBus> DeviceController<W, B> {
    /// Build a controller over already-open handles
    ///
    /// Every chip-select line is released before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the control word cannot be written.
    pub fn new(window: W, bus: B) -> Result<Self> {
        let mut control = ControlRegion::new(window);
        control.deselect_all()?;
        info!("SIPHRA controller ready");

        Ok(Self {
            control,
            spi: SpiChannel::new(bus),
            compare: compare_up_to,
        })
    }

    /// Replace the read-back comparison used by verified writes
    #[must_use]
    pub fn with_comparator(mut self, compare: Comparator) -> Self {
        self.compare = compare;
        self
    }

    /// Control region, for direct field access
    pub fn control(&mut self) -> &mut ControlRegion<W> {
        &mut self.control
    }

    fn writer(&mut self) -> VerifiedRegisterWriter<'_, W, B> {
        VerifiedRegisterWriter::new(&mut self.control, &mut self.spi).with_comparator(self.compare)
    }

    // ── Clock, reset, triggering ─────────────────────────────────────────────

    /// Assign the system clock divisor code
    ///
    /// # Errors
    ///
    /// Returns `ValueOutOfRange` for codes above 15, or a window error.
    pub fn set_clock(&mut self, code: u8) -> Result<()> {
        info!("Setting sysclk divisor code {code}");
        self.control
            .write_field(ControlField::SysClk, Update::Assign(code))
    }

    /// Current system clock divisor code
    ///
    /// # Errors
    ///
    /// Returns an error if the window read fails.
    pub fn clock(&self) -> Result<u8> {
        self.control.read_field(ControlField::SysClk)
    }

    /// Assert reset for `chip` and leave it asserted
    ///
    /// # Errors
    ///
    /// Returns an error if the window access fails.
    pub fn hold_reset(&mut self, chip: Chip) -> Result<()> {
        debug!("Holding SIPHRA {chip} in reset");
        self.control.write_field(ControlField::Reset, Update::Set(chip))
    }

    /// Release reset for `chip`
    ///
    /// # Errors
    ///
    /// Returns an error if the window access fails.
    pub fn release_reset(&mut self, chip: Chip) -> Result<()> {
        debug!("Releasing SIPHRA {chip} from reset");
        self.control
            .write_field(ControlField::Reset, Update::Clear(chip))
    }

    /// Toggle reset: assert, block for `toggle`, release
    ///
    /// Only `chip`'s reset bits change; the other chips keep theirs.
    ///
    /// # Errors
    ///
    /// Returns an error if the window access fails. If asserting succeeded
    /// but releasing failed, the chip stays held.
    pub fn reset(&mut self, chip: Chip, toggle: Duration) -> Result<()> {
        info!("Resetting SIPHRA {chip} ({toggle:?})");
        self.hold_reset(chip)?;
        std::thread::sleep(toggle);
        self.release_reset(chip)
    }

    /// Assign the hold field to the trigger mode's code
    ///
    /// # Errors
    ///
    /// Returns an error if the window access fails.
    pub fn set_trigger_mode(&mut self, mode: TriggerMode) -> Result<()> {
        info!("Trigger mode {mode:?}");
        self.control
            .write_field(ControlField::Hold, Update::Assign(mode.code()))
    }

    /// Disable external triggering
    ///
    /// # Errors
    ///
    /// Returns an error if the window access fails.
    pub fn trigger_off(&mut self) -> Result<()> {
        self.set_trigger_mode(TriggerMode::Off)
    }

    /// 1 Hz external trigger
    ///
    /// # Errors
    ///
    /// Returns an error if the window access fails.
    pub fn trigger_1hz(&mut self) -> Result<()> {
        self.set_trigger_mode(TriggerMode::Hz1)
    }

    /// 1 kHz external trigger
    ///
    /// # Errors
    ///
    /// Returns an error if the window access fails.
    pub fn trigger_1khz(&mut self) -> Result<()> {
        self.set_trigger_mode(TriggerMode::KHz1)
    }

    /// Current trigger mode, `None` if the hold field holds an unknown code
    ///
    /// # Errors
    ///
    /// Returns an error if the window read fails.
    pub fn trigger_mode(&self) -> Result<Option<TriggerMode>> {
        Ok(TriggerMode::from_code(
            self.control.read_field(ControlField::Hold)?,
        ))
    }

    // ── Status ───────────────────────────────────────────────────────────────

    /// Error pins of all four chips (bit 0 = A)
    ///
    /// # Errors
    ///
    /// Returns an error if the window read fails.
    pub fn read_error_mask(&self) -> Result<u8> {
        Ok(self.control.read_status()?.error_mask())
    }

    /// Raw 12-bit temperature readings of all four chips
    ///
    /// # Errors
    ///
    /// Returns an error if the window read fails.
    pub fn read_temperatures(&self) -> Result<Temperatures> {
        Ok(self.control.read_status()?.temperatures())
    }

    // ── Registers ────────────────────────────────────────────────────────────

    /// Write one register on one chip and confirm it by read-back
    ///
    /// Returns the number of attempts used.
    ///
    /// # Errors
    ///
    /// `BroadcastNotAllowed` for `Chip::All`, `WriteVerification` if the
    /// read-back never matched, or a transfer error.
    pub fn write_verified(
        &mut self,
        chip: Chip,
        address: RegisterAddress,
        value: [u8; REG_SIZE],
    ) -> Result<u32> {
        self.writer().write_verified(chip, address, value)
    }

    /// Verified write; `Chip::All` writes A, B, C, D in turn
    ///
    /// # Errors
    ///
    /// Stops at the first chip that fails.
    pub fn write_register(
        &mut self,
        chip: Chip,
        address: RegisterAddress,
        value: [u8; REG_SIZE],
    ) -> Result<()> {
        for &target in chip.physical() {
            self.write_verified(target, address, value)?;
        }
        Ok(())
    }

    /// Raw register contents of one chip
    ///
    /// # Errors
    ///
    /// `BroadcastNotAllowed` for `Chip::All`, or a transfer error.
    pub fn read_register(&mut self, chip: Chip, address: RegisterAddress) -> Result<[u8; REG_SIZE]> {
        if !chip.is_physical() {
            return Err(SiphraError::BroadcastNotAllowed {
                operation: "register read",
            });
        }
        self.writer().read(chip, address)
    }

    /// Every field of a register, decoded through its layout
    ///
    /// # Errors
    ///
    /// Same as [`read_register`](Self::read_register).
    pub fn read_fields(
        &mut self,
        chip: Chip,
        address: RegisterAddress,
    ) -> Result<Vec<(&'static str, u32)>> {
        let word = u32::from_be_bytes(self.read_register(chip, address)?);
        Ok(address.layout().unpack(word))
    }

    /// One named field of a register
    ///
    /// # Errors
    ///
    /// `UnknownField` if the register layout has no such field, otherwise
    /// same as [`read_register`](Self::read_register).
    pub fn read_field(&mut self, chip: Chip, address: RegisterAddress, name: &str) -> Result<u32> {
        let layout = address.layout();
        if layout.placement(name).is_none() {
            return Err(unknown_field(address, name));
        }
        let word = u32::from_be_bytes(self.read_register(chip, address)?);
        layout
            .get(word, name)
            .ok_or_else(|| unknown_field(address, name))
    }

    /// Read-modify-write one named field with a verified write
    ///
    /// `Chip::All` updates each chip from its own current contents.
    ///
    /// # Errors
    ///
    /// `UnknownField`, `ValueOutOfRange` if `value` is wider than the field,
    /// or any error from the read or the verified write.
    pub fn write_field(
        &mut self,
        chip: Chip,
        address: RegisterAddress,
        name: &str,
        value: u32,
    ) -> Result<()> {
        let layout = address.layout();
        let field = layout
            .fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| unknown_field(address, name))?;
        if value > len_mask(field.width) {
            return Err(SiphraError::ValueOutOfRange {
                field: field.name,
                value,
                bits: field.width,
            });
        }

        for &target in chip.physical() {
            let word = u32::from_be_bytes(self.read_register(target, address)?);
            let word = layout
                .set(word, name, value)
                .ok_or_else(|| unknown_field(address, name))?;
            debug!("SIPHRA {target} {address}: {name} = {value:#x}");
            self.write_verified(target, address, word.to_be_bytes())?;
        }
        Ok(())
    }

    // ── Bulk programming ─────────────────────────────────────────────────────

    /// Program registers `0..N` from a blob
    ///
    /// For `Chip::All` the whole blob goes to A, then B, then C, then D.
    /// The blob is checked against the catalog before any SPI traffic.
    /// The first failed write aborts the run; registers already written stay
    /// written.
    ///
    /// # Errors
    ///
    /// `UnknownRegister` for a blob longer than the catalog, otherwise the
    /// first write error.
    pub fn program_from_blob(&mut self, blob: &ConfigBlob, chip: Chip) -> Result<ProgramMetrics> {
        let registers = blob.registers()?;
        info!(
            "Programming {} registers into SIPHRA {chip}",
            registers.len()
        );

        let start = Instant::now();
        let mut metrics = ProgramMetrics::default();

        for &target in chip.physical() {
            for &(address, value) in &registers {
                let attempts = self.write_verified(target, address, value)?;
                metrics.registers_written += 1;
                metrics.retries += attempts - 1;
            }
            debug!("SIPHRA {target} programmed");
        }

        metrics.duration = start.elapsed();
        info!(
            "Programmed {} registers in {:?} ({} retries)",
            metrics.registers_written, metrics.duration, metrics.retries
        );
        Ok(metrics)
    }

    /// Load a blob file and program it
    ///
    /// # Errors
    ///
    /// `ConfigBlob` if the file cannot be read, otherwise as
    /// [`program_from_blob`](Self::program_from_blob).
    pub fn program_from_file(&mut self, path: impl AsRef<Path>, chip: Chip) -> Result<ProgramMetrics> {
        let blob = ConfigBlob::load(path)?;
        self.program_from_blob(&blob, chip)
    }
}

fn unknown_field(address: RegisterAddress, name: &str) -> SiphraError {
    SiphraError::UnknownField {
        address: address.get(),
        field: name.to_string(),
    }
}
