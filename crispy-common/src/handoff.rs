// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Application handoff (C9): the single non-returning control transfer out
//! of the bootloader.
//!
//! Per the REDESIGN FLAGS note this is isolated behind one `unsafe` boundary
//! that takes the application base address and returns `!`. It is only
//! meaningful on the real Cortex-M target, so it only compiles in under the
//! `embedded` feature (host tests and the host CLI never call it).

#![cfg(feature = "embedded")]

const NVIC_REGISTER_COUNT: usize = 8;

/// Disables interrupts, resets SysTick and the NVIC, then branches to the
/// application's reset vector with its stack pointer installed.
///
/// # Safety
///
/// `app_base` must point at a valid Cortex-M vector table: the first word is
/// the initial stack pointer, the second the reset vector. The caller must
/// have already established (via [`crate::boot::application_looks_valid`])
/// that this looks like a real application image. This function never
/// returns; everything it touches (SysTick, NVIC, MSP) is reset as a side
/// effect and is not expected to be valid again afterwards.
pub unsafe fn start_application(app_base: u32) -> ! {
    cortex_m::interrupt::disable();

    let systick = &*cortex_m::peripheral::SYST::PTR;
    systick.ctrl.write(0);
    systick.rvr.write(0);
    systick.cvr.write(0);

    let nvic_icer = 0xE000_E180 as *mut u32;
    let nvic_icpr = 0xE000_E280 as *mut u32;
    for i in 0..NVIC_REGISTER_COUNT {
        nvic_icer.add(i).write_volatile(0xFFFF_FFFF);
        nvic_icpr.add(i).write_volatile(0xFFFF_FFFF);
    }

    let initial_sp = (app_base as *const u32).read_volatile();
    let reset_vector = (app_base as *const u32).offset(1).read_volatile();

    core::arch::asm!(
        "msr msp, {sp}",
        "bx {reset}",
        sp = in(reg) initial_sp,
        reset = in(reg) reset_vector,
        options(noreturn)
    );
}
