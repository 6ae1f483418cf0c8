//! `siphra`: command-line interface for SIPHRA ASICs on a D2a board.
//!
//! ```text
//! USAGE:
//!   siphra configure <blob>           Clock, reset, program and arm the chips
//!   siphra reset <chip>               Toggle reset
//!   siphra clock <code>               Set the sysclk divisor code
//!   siphra trigger <off|1hz|1khz>     External trigger gating
//!   siphra status                     Error pins and temperatures
//!   siphra read-reg <chip> <addr>     Raw and decoded register contents
//!   siphra write-reg <chip> <addr> <value>
//! ```
//!
//! Device paths default to `/dev/uio0` and `/dev/spidev1.0`, overridable via
//! `SIPHRA_UIO` / `SIPHRA_SPI` or `--uio` / `--spi`.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use siphra_chip::{Chip, RegisterAddress, TriggerMode};
use siphra_driver::{
    ConfigBlob, ControllerConfig, DeviceController, ProgramMetrics, RegisterWindow, SpiBus,
    SpidevBus, UioRegion,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

type Controller = DeviceController<UioRegion, SpidevBus>;

#[derive(Parser)]
#[command(name = "siphra", about = "SIPHRA ASIC configuration CLI", version)]
struct Cli {
    /// UIO device exporting the D2a control window.
    #[arg(long, global = true)]
    uio: Option<PathBuf>,

    /// spidev node of the SIPHRA register bus.
    #[arg(long, global = true)]
    spi: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Set the clock, reset, program a register blob, then enable triggering.
    Configure {
        /// Register blob (4 bytes per register, from address 0).
        blob: PathBuf,
        /// Chip to program.
        #[arg(long, default_value = "A")]
        chip: Chip,
        /// Sysclk divisor code.
        #[arg(long, default_value_t = 6)]
        sysclk: u8,
        /// Wait after programming before triggering is enabled (ms).
        #[arg(long, default_value_t = 1000)]
        settle_ms: u64,
        /// Trigger mode to leave the board in.
        #[arg(long, value_enum, default_value_t = Trigger::Hz1)]
        trigger: Trigger,
    },
    /// Toggle reset on one chip or all of them.
    Reset {
        /// A, B, C, D or All.
        chip: Chip,
        /// Hold time in ms (default from SIPHRA_RESET_TOGGLE_MS or 10).
        #[arg(long)]
        toggle_ms: Option<u64>,
    },
    /// Set the sysclk divisor code (0-15).
    Clock {
        /// Divisor code.
        code: u8,
    },
    /// Set external trigger gating.
    Trigger {
        /// Trigger mode.
        #[arg(value_enum)]
        mode: Trigger,
    },
    /// Print error pins, temperatures and control fields.
    Status,
    /// Read one register.
    ReadReg {
        /// A, B, C or D.
        chip: Chip,
        /// Register address (decimal or 0x-prefixed hex).
        #[arg(value_parser = parse_address)]
        address: RegisterAddress,
    },
    /// Write one register with read-back verification.
    WriteReg {
        /// A, B, C, D or All.
        chip: Chip,
        /// Register address (decimal or 0x-prefixed hex).
        #[arg(value_parser = parse_address)]
        address: RegisterAddress,
        /// Register value (decimal or 0x-prefixed hex).
        #[arg(value_parser = parse_u32)]
        value: u32,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Trigger {
    Off,
    #[value(name = "1hz")]
    Hz1,
    #[value(name = "1khz")]
    KHz1,
}

impl From<Trigger> for TriggerMode {
    fn from(t: Trigger) -> Self {
        match t {
            Trigger::Off => Self::Off,
            Trigger::Hz1 => Self::Hz1,
            Trigger::KHz1 => Self::KHz1,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ControllerConfig::from_env();
    if let Some(uio) = cli.uio {
        config.uio_path = uio;
    }
    if let Some(spi) = cli.spi {
        config.spi_path = spi;
    }

    match cli.command {
        Cmd::Configure {
            blob,
            chip,
            sysclk,
            settle_ms,
            trigger,
        } => cmd_configure(&config, &blob, chip, sysclk, settle_ms, trigger.into())?,
        Cmd::Reset { chip, toggle_ms } => {
            let toggle = toggle_ms.map_or(config.reset_toggle, Duration::from_millis);
            open(&config)?.reset(chip, toggle)?;
        }
        Cmd::Clock { code } => open(&config)?.set_clock(code)?,
        Cmd::Trigger { mode } => open(&config)?.set_trigger_mode(mode.into())?,
        Cmd::Status => cmd_status(&config)?,
        Cmd::ReadReg { chip, address } => cmd_read_reg(&config, chip, address)?,
        Cmd::WriteReg {
            chip,
            address,
            value,
        } => {
            open(&config)?.write_register(chip, address, value.to_be_bytes())?;
            println!("{address} <- {value:#010x} on SIPHRA {chip}: verified");
        }
    }

    Ok(())
}

fn open(config: &ControllerConfig) -> Result<Controller> {
    DeviceController::open(config).with_context(|| {
        format!(
            "opening D2a board ({} / {})",
            config.uio_path.display(),
            config.spi_path.display()
        )
    })
}

fn parse_u32(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse(),
    };
    parsed.map_err(|e| format!("{s:?}: {e}"))
}

fn parse_address(s: &str) -> Result<RegisterAddress, String> {
    let raw = parse_u32(s)?;
    let raw = usize::try_from(raw).map_err(|e| e.to_string())?;
    RegisterAddress::new(raw).map_err(|e| e.to_string())
}

fn cmd_configure(
    config: &ControllerConfig,
    blob: &Path,
    chip: Chip,
    sysclk: u8,
    settle_ms: u64,
    trigger: TriggerMode,
) -> Result<()> {
    let blob = ConfigBlob::load(blob)?;
    if blob.register_count() == 0 {
        bail!("{} holds no whole register", blob_name(&blob));
    }

    let mut ctl = open(config)?;
    let plan = Bringup {
        chip,
        sysclk,
        reset_toggle: config.reset_toggle,
        settle: Duration::from_millis(settle_ms),
        trigger,
    };
    let metrics = plan.run(&mut ctl, &blob)?;
    println!(
        "Programmed {} registers in {:?} ({} retries)",
        metrics.registers_written, metrics.duration, metrics.retries
    );
    println!("Trigger mode {trigger:?}");
    Ok(())
}

/// Board bring-up: clock, reset every chip, program, settle, arm triggering.
struct Bringup {
    chip: Chip,
    sysclk: u8,
    reset_toggle: Duration,
    settle: Duration,
    trigger: TriggerMode,
}

impl Bringup {
    fn run<W: RegisterWindow, B: SpiBus>(
        &self,
        ctl: &mut DeviceController<W, B>,
        blob: &ConfigBlob,
    ) -> Result<ProgramMetrics> {
        info!("sysclk code {}", self.sysclk);
        ctl.set_clock(self.sysclk)?;
        info!("Resetting all chips");
        ctl.reset(Chip::All, self.reset_toggle)?;

        info!(
            "Programming SIPHRA {} with {} registers from {}",
            self.chip,
            blob.register_count(),
            blob_name(blob)
        );
        let metrics = ctl.program_from_blob(blob, self.chip).with_context(|| {
            format!("programming SIPHRA {} from {}", self.chip, blob_name(blob))
        })?;

        info!("Settling for {:?}", self.settle);
        std::thread::sleep(self.settle);
        ctl.set_trigger_mode(self.trigger)?;
        info!("Armed with trigger mode {:?}", self.trigger);
        Ok(metrics)
    }
}

fn blob_name(blob: &ConfigBlob) -> String {
    blob.source()
        .map_or_else(|| "blob".to_string(), |p| p.display().to_string())
}

fn cmd_status(config: &ControllerConfig) -> Result<()> {
    let ctl = open(config)?;
    let mask = ctl.read_error_mask()?;
    let temps = ctl.read_temperatures()?;

    println!("Chip  Error  Temp (raw)");
    for chip in Chip::PHYSICAL {
        let error = if mask & chip.bits() != 0 { "yes" } else { "no" };
        let temp = temps.get(chip).unwrap_or_default();
        println!("{chip:<5} {error:<6} {temp:#05x} ({temp})");
    }
    println!();
    println!("sysclk  : {}", ctl.clock()?);
    match ctl.trigger_mode()? {
        Some(mode) => println!("trigger : {mode:?}"),
        None => println!("trigger : (unknown code)"),
    }
    Ok(())
}

fn cmd_read_reg(config: &ControllerConfig, chip: Chip, address: RegisterAddress) -> Result<()> {
    let mut ctl = open(config)?;
    let raw = ctl.read_register(chip, address)?;
    let word = u32::from_be_bytes(raw);

    println!(
        "SIPHRA {chip} {address}: {word:#010x} ({} significant bits)",
        address.significant_len()
    );
    for (name, value) in address.layout().unpack(word) {
        println!("  {name:<28} {value:#x}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn numbers_accept_hex_and_decimal() {
        assert_eq!(parse_u32("0x1B"), Ok(27));
        assert_eq!(parse_u32("27"), Ok(27));
        assert_eq!(parse_u32("0x00ff_ffff"), Ok(0x00FF_FFFF));
        assert!(parse_u32("zz").is_err());
    }

    #[test]
    fn addresses_are_range_checked() {
        assert_eq!(parse_address("0x10").unwrap().get(), 16);
        assert!(parse_address("28").is_err());
    }

    #[test]
    fn configure_defaults() {
        let cli = Cli::try_parse_from(["siphra", "configure", "regs.bin"]).unwrap();
        match cli.command {
            Cmd::Configure {
                chip,
                sysclk,
                settle_ms,
                trigger,
                ..
            } => {
                assert_eq!(chip, Chip::A);
                assert_eq!(sysclk, 6);
                assert_eq!(settle_ms, 1000);
                assert_eq!(TriggerMode::from(trigger), TriggerMode::Hz1);
            }
            _ => panic!("expected configure"),
        }
    }

    #[test]
    fn configure_sequence_on_simulated_board() {
        use siphra_chip::ControlField;
        use siphra_driver::sim::{LoopbackSpi, MemoryWindow};

        let window = MemoryWindow::new();
        let link = LoopbackSpi::new(window.clone());
        let mut ctl = DeviceController::new(window.clone(), link.clone()).unwrap();
        let blob = ConfigBlob::from_bytes(vec![0, 0, 0, 1, 0, 0, 0, 2]);

        let plan = Bringup {
            chip: Chip::A,
            sysclk: 6,
            reset_toggle: Duration::from_millis(1),
            settle: Duration::ZERO,
            trigger: TriggerMode::Hz1,
        };
        let metrics = plan.run(&mut ctl, &blob).unwrap();

        assert_eq!(metrics.registers_written, 2);
        assert_eq!(
            link.register_writes(),
            vec![(Chip::A, 0, [0, 0, 0, 1]), (Chip::A, 1, [0, 0, 0, 2])]
        );
        let word = window.control_word();
        assert_eq!(word.get(ControlField::SysClk), 6);
        assert_eq!(word.get(ControlField::Reset), 0);
        assert_eq!(word.get(ControlField::ChipSelect), 0b1111);
        assert_eq!(ctl.trigger_mode().unwrap(), Some(TriggerMode::Hz1));
    }

    #[test]
    fn bad_chip_rejected() {
        assert!(Cli::try_parse_from(["siphra", "reset", "E"]).is_err());
        assert!(Cli::try_parse_from(["siphra", "--uio", "/dev/uio1", "reset", "b"]).is_ok());
    }
}
