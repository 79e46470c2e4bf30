// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Minimal resident application standing in for a node's real firmware: it
//! exists to exercise the bootloader's handoff boundary (C9) from the
//! application side, not to do anything useful on its own.
//!
//! On boot it blinks a status LED, then — if the user button is held —
//! requests an update and resets into the bootloader, mirroring the
//! historical `app_update_start()`: write the shared RAM flag, clear the
//! reset-cause flags, and reset.

#![no_std]
#![no_main]

use cortex_m::peripheral::SCB;
use cortex_m_rt::entry;
use defmt_rtt as _;
use embedded_hal::digital::{InputPin, OutputPin};
use panic_probe as _;
use stm32g4xx_hal::prelude::*;
use stm32g4xx_hal::rcc::{Config, RccExt};
use stm32g4xx_hal::stm32;

defmt::timestamp!("{=u64:us}", { 0 });

const UPDATE_FLAG_REQUESTED: u32 = 0x1234_5678;

/// Must alias the bootloader's own `.fw_update_flag_section` static: the
/// whole point is that it survives the reset this binary triggers.
#[unsafe(link_section = ".fw_update_flag_section")]
#[used]
static mut UPDATE_FLAG: u32 = 0;

fn request_update_and_reset(rcc: &stm32::RCC) -> ! {
    unsafe {
        core::ptr::addr_of_mut!(UPDATE_FLAG).write_volatile(UPDATE_FLAG_REQUESTED);
    }
    rcc.csr.modify(|_, w| w.rmvf().set_bit());
    SCB::sys_reset();
}

#[entry]
fn main() -> ! {
    defmt::println!("resident application started");

    let dp = unsafe { stm32::Peripherals::steal() };
    let mut rcc = dp.RCC.constrain();
    let gpioa = dp.GPIOA.split(&mut rcc);
    let gpioc = dp.GPIOC.split(&mut rcc);
    let rcc = rcc.freeze(Config::hsi());

    let mut led = gpioa.pa5.into_push_pull_output();
    let button = gpioc.pc13.into_pull_up_input();

    for _ in 0..5 {
        led.set_high().ok();
        cortex_m::asm::delay(rcc.clocks.sys_clk.raw() / 10);
        led.set_low().ok();
        cortex_m::asm::delay(rcc.clocks.sys_clk.raw() / 10);
    }

    defmt::println!("entering idle loop; hold the user button to request a firmware update");

    loop {
        if button.is_low().unwrap_or(false) {
            defmt::println!("update requested, resetting into bootloader");
            request_update_and_reset(unsafe { &*stm32::RCC::ptr() });
        }
        led.set_high().ok();
        cortex_m::asm::delay(rcc.clocks.sys_clk.raw() / 2);
        led.set_low().ok();
        cortex_m::asm::delay(rcc.clocks.sys_clk.raw() / 2);
    }
}
