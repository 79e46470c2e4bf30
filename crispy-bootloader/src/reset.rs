// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Reset-cause reading and the application-update-request flag (§3, §4.7),
//! wiring `crispy_common::boot`'s pure decision logic to the concrete
//! STM32G4 `RCC_CSR` register and a fixed RAM location.
//!
//! The flag lives in a dedicated linker section (`.fw_update_flag_section`)
//! that startup code must NOT zero, exactly as the historical
//! `app_update.c`'s `firmware_update_flags` variable requires — the whole
//! point is that it survives the reset the application triggers to request
//! an update.

use core::ptr::addr_of_mut;

use crispy_common::boot::ResetCause;

const UPDATE_FLAG_NONE: u32 = 0x0000_0000;
const UPDATE_FLAG_REQUESTED: u32 = 0x1234_5678;

/// Matches the historical RAM-address signature check: a valid application
/// vector table's first word looks like a stack pointer into SRAM1, i.e.
/// its top byte is `0x20`.
pub const RAM_ADDRESS_MASK: u32 = 0x2FFC_0000;
pub const RAM_ADDRESS_TAG: u32 = 0x2000_0000;

/// Application flash base, set by the linker script's `FLASH_APP` region.
pub const APP_FLASH_ADDRESS: u32 = 0x0801_0000;

#[unsafe(link_section = ".fw_update_flag_section")]
#[used]
static mut UPDATE_FLAG: u32 = UPDATE_FLAG_NONE;

/// Reads the RCC reset-cause flags (`RCC_CSR`) into the hardware-independent
/// `ResetCause` bundle `crispy_common::boot` decides on, then clears them —
/// per §4.7, "clear reset-cause flags after reading".
pub fn take_reset_cause(rcc: &stm32g4xx_hal::stm32::RCC) -> ResetCause {
    let csr = rcc.csr.read();
    let cause = ResetCause {
        power_on: csr.porrstf().bit_is_set(),
        low_power: csr.lpwrrstf().bit_is_set(),
        brown_out: csr.borrstf().bit_is_set(),
        independent_watchdog: csr.iwdgrstf().bit_is_set(),
        window_watchdog: csr.wwdgrstf().bit_is_set(),
    };
    rcc.csr.modify(|_, w| w.rmvf().set_bit());
    cause
}

/// Reads whether the application requested an update, then clears the flag
/// — the bootloader honors a request at most once per reboot.
pub fn take_update_requested() -> bool {
    unsafe {
        let requested = addr_of_mut!(UPDATE_FLAG).read_volatile() == UPDATE_FLAG_REQUESTED;
        addr_of_mut!(UPDATE_FLAG).write_volatile(UPDATE_FLAG_NONE);
        requested
    }
}

/// Reads the 32-bit word at the application base address, for
/// `crispy_common::boot::application_looks_valid`.
pub fn application_initial_stack_pointer() -> u32 {
    unsafe { (APP_FLASH_ADDRESS as *const u32).read_volatile() }
}
