//! In-memory stand-ins for the D2a window and the SIPHRA SPI link
//!
//! `MemoryWindow` behaves like the UIO mapping (a zeroed 4108-byte window) and
//! records every write. `LoopbackSpi` behaves like four SIPHRAs on one bus:
//! it looks at the chip-select field of a shared `MemoryWindow` at transfer
//! time, decodes the frame, and stores / returns register contents for the
//! selected chip. Faults can be injected on the read-back path.
//!
//! Both types are cheap handles over shared state: clone one before handing
//! it to a controller and keep the clone to inspect what happened.
//!
//! ```
//! use siphra_driver::sim::{LoopbackSpi, MemoryWindow};
//! use siphra_driver::DeviceController;
//! use siphra_chip::{Chip, RegisterAddress};
//!
//! # fn main() -> siphra_driver::Result<()> {
//! let window = MemoryWindow::new();
//! let link = LoopbackSpi::new(window.clone());
//! let mut ctl = DeviceController::new(window, link.clone())?;
//!
//! let addr = RegisterAddress::new(0x14)?;
//! ctl.write_verified(Chip::B, addr, [0, 0, 0, 0x5A])?;
//! assert_eq!(link.register(Chip::B, 0x14), [0, 0, 0, 0x5A]);
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::spi::SpiBus;
use crate::window::{check_bounds, RegisterWindow};
use siphra_chip::frame::{decode_address_byte, FRAME_LEN};
use siphra_chip::regs::{REGISTER_COUNT, REG_SIZE};
use siphra_chip::window::{ControlField, ControlWord, CONTROL_OFFSET, CONTROL_SIZE, WINDOW_SIZE};
use siphra_chip::Chip;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Window ───────────────────────────────────────────────────────────────────

/// One recorded window write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowWrite {
    /// Start offset
    pub offset: usize,
    /// Bytes written
    pub data: Vec<u8>,
}

#[derive(Debug)]
struct WindowState {
    bytes: Vec<u8>,
    writes: Vec<WindowWrite>,
}

/// Zero-initialised in-memory control window
#[derive(Debug, Clone)]
pub struct MemoryWindow {
    state: Arc<Mutex<WindowState>>,
}

impl MemoryWindow {
    /// Window of the D2a size
    #[must_use]
    pub fn new() -> Self {
        Self::with_size(WINDOW_SIZE)
    }

    /// Window of an arbitrary size
    #[must_use]
    pub fn with_size(size: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(WindowState {
                bytes: vec![0; size],
                writes: Vec::new(),
            })),
        }
    }

    /// Set bytes without recording a write (hardware-side change)
    ///
    /// # Panics
    ///
    /// Panics if the range exceeds the window.
    pub fn poke(&self, offset: usize, data: &[u8]) {
        lock(&self.state).bytes[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Current control word
    #[must_use]
    pub fn control_word(&self) -> ControlWord {
        let state = lock(&self.state);
        let mut bytes = [0u8; CONTROL_SIZE];
        bytes.copy_from_slice(&state.bytes[CONTROL_OFFSET..CONTROL_OFFSET + CONTROL_SIZE]);
        ControlWord::from_bytes(bytes)
    }

    /// Every write so far, oldest first
    #[must_use]
    pub fn writes(&self) -> Vec<WindowWrite> {
        lock(&self.state).writes.clone()
    }

    /// Control words written so far, oldest first
    #[must_use]
    pub fn control_history(&self) -> Vec<ControlWord> {
        lock(&self.state)
            .writes
            .iter()
            .filter(|w| w.offset == CONTROL_OFFSET && w.data.len() == CONTROL_SIZE)
            .map(|w| ControlWord::from_bytes([w.data[0], w.data[1]]))
            .collect()
    }

    /// Forget recorded writes
    pub fn clear_writes(&self) {
        lock(&self.state).writes.clear();
    }
}

impl Default for MemoryWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterWindow for MemoryWindow {
    fn size(&self) -> usize {
        lock(&self.state).bytes.len()
    }

    fn read_bytes(&self, offset: usize, buffer: &mut [u8]) -> Result<()> {
        let state = lock(&self.state);
        check_bounds(offset, buffer.len(), state.bytes.len())?;
        buffer.copy_from_slice(&state.bytes[offset..offset + buffer.len()]);
        Ok(())
    }

    fn write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let mut state = lock(&self.state);
        check_bounds(offset, data.len(), state.bytes.len())?;
        state.bytes[offset..offset + data.len()].copy_from_slice(data);
        state.writes.push(WindowWrite {
            offset,
            data: data.to_vec(),
        });
        Ok(())
    }
}

// ── SPI link ─────────────────────────────────────────────────────────────────

/// Read-back corruption injected by [`LoopbackSpi`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Reads return what was stored
    None,
    /// Every read flips this bit (0 = LSB of the big-endian word)
    FlipBit(u32),
    /// The next read flips this bit, later reads are clean
    FlipOnce(u32),
}

/// One exchange seen by [`LoopbackSpi`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpiRecord {
    /// Chip-select field at transfer time (active low)
    pub cs: u8,
    /// Bytes clocked out
    pub tx: Vec<u8>,
}

impl SpiRecord {
    /// The single selected chip, if exactly one was selected
    #[must_use]
    pub fn chip(&self) -> Option<Chip> {
        let mut selected = Chip::selected_by(self.cs);
        match (selected.next(), selected.next()) {
            (Some(chip), None) => Some(chip),
            _ => None,
        }
    }

    /// Register address and write flag from the first byte
    #[must_use]
    pub fn address(&self) -> Option<(u8, bool)> {
        self.tx.first().map(|&b| decode_address_byte(b))
    }

    /// True for a write frame
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(self.address(), Some((_, true)))
    }
}

#[derive(Debug)]
struct LinkState {
    registers: [[[u8; REG_SIZE]; REGISTER_COUNT]; 4],
    fault: Fault,
    log: Vec<SpiRecord>,
}

/// Simulated bus with four SIPHRA register files behind it
#[derive(Debug, Clone)]
pub struct LoopbackSpi {
    window: MemoryWindow,
    state: Arc<Mutex<LinkState>>,
}

const fn chip_index(chip: Chip) -> usize {
    match chip {
        Chip::A | Chip::All => 0,
        Chip::B => 1,
        Chip::C => 2,
        Chip::D => 3,
    }
}

impl LoopbackSpi {
    /// Link whose chip-select lines are read from `window`
    #[must_use]
    pub fn new(window: MemoryWindow) -> Self {
        Self {
            window,
            state: Arc::new(Mutex::new(LinkState {
                registers: [[[0; REG_SIZE]; REGISTER_COUNT]; 4],
                fault: Fault::None,
                log: Vec::new(),
            })),
        }
    }

    /// Change the read-back fault
    pub fn set_fault(&self, fault: Fault) {
        lock(&self.state).fault = fault;
    }

    /// Stored contents of one register (`chip` must be physical)
    ///
    /// # Panics
    ///
    /// Panics if `address` is outside the register catalog.
    #[must_use]
    pub fn register(&self, chip: Chip, address: u8) -> [u8; REG_SIZE] {
        lock(&self.state).registers[chip_index(chip)][usize::from(address)]
    }

    /// Every exchange so far, oldest first
    #[must_use]
    pub fn transfers(&self) -> Vec<SpiRecord> {
        lock(&self.state).log.clone()
    }

    /// Write frames so far as `(chip, address, payload)`
    #[must_use]
    pub fn register_writes(&self) -> Vec<(Chip, u8, [u8; REG_SIZE])> {
        lock(&self.state)
            .log
            .iter()
            .filter(|r| r.is_write() && r.tx.len() == FRAME_LEN)
            .filter_map(|r| {
                let chip = r.chip()?;
                let (addr, _) = r.address()?;
                let mut payload = [0u8; REG_SIZE];
                payload.copy_from_slice(&r.tx[1..]);
                Some((chip, addr, payload))
            })
            .collect()
    }

    /// Forget recorded exchanges
    pub fn clear_log(&self) {
        lock(&self.state).log.clear();
    }
}

impl SpiBus for LoopbackSpi {
    fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>> {
        let cs = self.window.control_word().get(ControlField::ChipSelect);
        let mut state = lock(&self.state);
        state.log.push(SpiRecord {
            cs,
            tx: tx.to_vec(),
        });

        let mut rx = vec![0u8; tx.len()];
        if tx.len() != FRAME_LEN {
            return Ok(rx);
        }
        let (addr, write) = decode_address_byte(tx[0]);
        let reg = usize::from(addr);
        if reg >= REGISTER_COUNT {
            return Ok(rx);
        }

        let selected: Vec<Chip> = Chip::selected_by(cs).collect();
        if write {
            for chip in selected {
                state.registers[chip_index(chip)][reg].copy_from_slice(&tx[1..]);
            }
        } else if let Some(&chip) = selected.first() {
            let mut value = u32::from_be_bytes(state.registers[chip_index(chip)][reg]);
            let fault = state.fault;
            match fault {
                Fault::None => {}
                Fault::FlipBit(bit) => value ^= 1u32.checked_shl(bit).unwrap_or(0),
                Fault::FlipOnce(bit) => {
                    value ^= 1u32.checked_shl(bit).unwrap_or(0);
                    state.fault = Fault::None;
                }
            }
            rx[0] = tx[0];
            rx[1..].copy_from_slice(&value.to_be_bytes());
        }
        Ok(rx)
    }
}
