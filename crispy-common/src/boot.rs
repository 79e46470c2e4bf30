// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! The boot decision (C7): whether to enter the update loop or hand off to
//! the resident application, based on reset cause and the RAM-persistent
//! update-request flag.

/// Reset-cause flags, read once at boot and cleared by the caller
/// immediately afterwards.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResetCause {
    pub power_on: bool,
    pub low_power: bool,
    pub brown_out: bool,
    pub independent_watchdog: bool,
    pub window_watchdog: bool,
}

impl ResetCause {
    fn watchdog_reset(&self) -> bool {
        self.independent_watchdog || self.window_watchdog
    }

    fn non_power_on_reset(&self) -> bool {
        !self.power_on
    }
}

/// The application-update-request flag: a 32-bit word at a fixed RAM
/// address that survives reset, written `1` by the application before it
/// resets itself, and cleared by the bootloader after honoring it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UpdateRequest {
    None,
    Requested,
}

/// `requires_update = watchdog_reset OR (non_power_on_reset AND
/// update_requested) OR application_not_in_flash`.
pub fn requires_update(
    cause: ResetCause,
    update_requested: UpdateRequest,
    application_in_flash: bool,
) -> bool {
    cause.watchdog_reset()
        || (cause.non_power_on_reset() && update_requested == UpdateRequest::Requested)
        || !application_in_flash
}

/// "Application not in flash": the word at the application base address,
/// masked, does not look like a RAM address — i.e. the initial stack
/// pointer the image claims is implausible, so there is nothing valid to
/// jump to.
pub fn application_looks_valid(initial_stack_pointer: u32, ram_address_mask: u32, ram_address_tag: u32) -> bool {
    (initial_stack_pointer & ram_address_mask) == ram_address_tag
}
