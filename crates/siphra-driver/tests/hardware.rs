//! Tests against a real D2a board
//!
//! Paths come from `SIPHRA_UIO` / `SIPHRA_SPI` when set.

use siphra_chip::{Chip, RegisterAddress};
use siphra_driver::{ControllerConfig, DeviceController};

#[test]
#[ignore] // Requires hardware
fn open_and_read_status() {
    let config = ControllerConfig::from_env();
    let ctl = DeviceController::open(&config).expect("open D2a board");

    let mask = ctl.read_error_mask().expect("error mask");
    let temps = ctl.read_temperatures().expect("temperatures");
    println!("error mask: {mask:#06b}");
    println!("temps: {temps:?}");
}

#[test]
#[ignore] // Requires hardware
fn verified_write_on_every_chip() {
    let config = ControllerConfig::from_env();
    let mut ctl = DeviceController::open(&config).expect("open D2a board");
    ctl.reset(Chip::All, config.reset_toggle).expect("reset");

    let cal_dac = RegisterAddress::new(0x14).expect("address");
    for chip in Chip::PHYSICAL {
        let attempts = ctl
            .write_verified(chip, cal_dac, [0, 0, 0, 0x5A])
            .expect("verified write");
        println!("SIPHRA {chip}: verified in {attempts} attempt(s)");
        assert_eq!(
            ctl.read_register(chip, cal_dac).expect("read back")[3],
            0x5A
        );
    }
}
