// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! CAN-FD firmware-update bootloader for the STM32G4/L5 node family: one
//! binary, one `node-*` Cargo feature selecting identity, shared across
//! every gantry axis, pipette head, gripper and auxiliary board.

#![no_std]
#![no_main]

mod can_hal;
mod flash_hal;
mod node_id;
mod peripherals;
mod reset;
mod watchdog;

use cortex_m_rt::entry;
use defmt_rtt as _;
use panic_probe as _;

use crispy_common::boot::{self, UpdateRequest};
use crispy_common::dispatch::{BootContext, DeviceInfo, NoOverride};
use crispy_common::update_loop::{self, Watchdog as _};
use crispy_common::update_state::UpdateState;

defmt::timestamp!("{=u64:us}", { 0 });

/// Built from the linker-provided application region; see `reset::APP_FLASH_ADDRESS`.
const APP_REGION_END: u32 = 0x0804_0000;

#[entry]
fn main() -> ! {
    defmt::println!("bootloader init");

    let mut p = peripherals::init();
    let this_node = node_id::resolve(&mut p);
    defmt::println!("node identity resolved");

    let cause = reset::take_reset_cause(unsafe { &*stm32g4xx_hal::stm32::RCC::ptr() });
    let update_requested = if reset::take_update_requested() {
        UpdateRequest::Requested
    } else {
        UpdateRequest::None
    };
    let application_in_flash = boot::application_looks_valid(
        reset::application_initial_stack_pointer(),
        reset::RAM_ADDRESS_MASK,
        reset::RAM_ADDRESS_TAG,
    );

    if !boot::requires_update(cause, update_requested, application_in_flash) {
        defmt::println!("handing off to resident application");
        unsafe {
            crispy_common::handoff::start_application(reset::APP_FLASH_ADDRESS);
        }
    }

    defmt::println!("entering update loop");
    run_update_loop(p, this_node)
}

fn run_update_loop(p: peripherals::Peripherals, this_node: crispy_common::NodeId) -> ! {
    let mut watchdog = watchdog::IndependentWatchdog::new(p.iwdg);
    let mut hal = flash_hal::Stm32FlashHal::new(p.flash, reset::APP_FLASH_ADDRESS..APP_REGION_END);
    let mut state = UpdateState::new();
    let mut can = can_hal::Stm32CanHal::new(p.can, p.can_tx, p.can_rx);
    update_loop::start_can(&mut can, this_node);

    let mut ctx = BootContext {
        this_node,
        hal: &mut hal,
        state: &mut state,
        device_info: DeviceInfo {
            version: env_version(),
            flags: 0,
            sha: build_sha(),
            revision_primary: b'g',
            revision_secondary: b'4',
        },
        status_flags: 0,
    };
    let mut board = NoOverride;

    loop {
        flash_hal::sync_erase_state(ctx.state);
        let handoff_requested = update_loop::run_once(&mut can, &mut ctx, &mut board, &mut watchdog);
        if handoff_requested {
            defmt::println!("fw_update_start_app received, handing off");
            unsafe {
                crispy_common::handoff::start_application(reset::APP_FLASH_ADDRESS);
            }
        }
    }
}

const fn env_version() -> u32 {
    // Packed major.minor.patch from the crate version; a real release
    // process would stamp this from CI instead of Cargo.toml.
    0x0000_0100
}

fn build_sha() -> [u8; 8] {
    *b"dev00000"
}
