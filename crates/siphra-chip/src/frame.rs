//! SPI frame format.
//!
//! Every transaction is five bytes, full duplex, mode 0:
//!
//! ```text
//! write:  [addr << 1 | 1] [d3] [d2] [d1] [d0]
//! read:   [addr << 1    ] [ 0] [ 0] [ 0] [ 0]
//! reply:  [  ignored    ] [d3] [d2] [d1] [d0]
//! ```

use crate::regs::{RegisterAddress, REG_SIZE};

/// Bus clock used for every register transfer.
pub const SPI_SPEED_HZ: u32 = 100_000;

/// Length of a read or write frame.
pub const FRAME_LEN: usize = 1 + REG_SIZE;

/// Write flag in the address byte.
pub const WRITE_FLAG: u8 = 0x01;

/// Frame writing `value` to `addr`.
#[must_use]
pub fn write_frame(addr: RegisterAddress, value: [u8; REG_SIZE]) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[0] = (addr.get() << 1) | WRITE_FLAG;
    frame[1..].copy_from_slice(&value);
    frame
}

/// Frame reading `addr`; the payload bytes are dummies.
#[must_use]
pub fn read_frame(addr: RegisterAddress) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[0] = addr.get() << 1;
    frame
}

/// Register contents from the reply to a read frame.
///
/// Returns `None` if the reply is not exactly [`FRAME_LEN`] bytes.
#[must_use]
pub fn read_payload(reply: &[u8]) -> Option<[u8; REG_SIZE]> {
    if reply.len() != FRAME_LEN {
        return None;
    }
    reply[1..].try_into().ok()
}

/// Split an address byte into register address and write flag.
#[must_use]
pub const fn decode_address_byte(byte: u8) -> (u8, bool) {
    (byte >> 1, byte & WRITE_FLAG != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(raw: usize) -> RegisterAddress {
        RegisterAddress::new(raw).unwrap()
    }

    #[test]
    fn write_frame_sets_flag() {
        let frame = write_frame(addr(0x11), [0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(frame, [0x23, 0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(decode_address_byte(frame[0]), (0x11, true));
    }

    #[test]
    fn read_frame_clears_flag() {
        let frame = read_frame(addr(27));
        assert_eq!(frame, [54, 0, 0, 0, 0]);
        assert_eq!(decode_address_byte(frame[0]), (27, false));
    }

    #[test]
    fn read_payload_drops_echo_byte() {
        assert_eq!(read_payload(&[0xFF, 1, 2, 3, 4]), Some([1, 2, 3, 4]));
        assert_eq!(read_payload(&[1, 2, 3, 4]), None);
    }
}
