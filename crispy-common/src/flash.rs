// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! The flash writer (C4): buffer → double-word iteration → program →
//! verify, plus the interrupt-driven erase handshake.
//!
//! The peripheral itself is a capability interface (`FlashHal`) so this
//! module stays hardware-independent and host-testable; `crispy-bootloader`
//! supplies the concrete STM32 implementation.

use crate::codec::dword_address_iter;
use crate::codec::UpdateData;
use crate::ids::ErrorCode;
use crate::update_state::{EraseState, UpdateState};
use core::ops::Range;

/// Capability interface to the platform's flash peripheral. `crispy-common`
/// never touches registers directly; `crispy-bootloader::flash_hal`
/// implements this for STM32G4/L5, and tests implement it over a `Vec<u8>`.
pub trait FlashHal {
    /// The writable application region, used to reject out-of-range writes
    /// (SPEC_FULL.md resolves the distilled spec's open question: clamp and
    /// reject rather than trust the host).
    fn app_region(&self) -> Range<u32>;

    fn unlock(&mut self);
    fn lock(&mut self);

    /// Programs one 64-bit-aligned double word. Returns `false` on any
    /// hardware failure (the caller treats this as `ErrorCode::Hardware`).
    fn program_double_word(&mut self, address: u32, word: u64) -> bool;

    /// Starts an interrupt-driven erase of the application region (and, on
    /// dual-bank parts, bank 2 once bank 1 completes). Non-blocking: the
    /// interrupt/completion callback is expected to call
    /// `UpdateState::set_erase_state` from ISR context.
    fn start_erase(&mut self);
}

/// Blocks on `erase_state` leaving `Running`, invoking `on_tick` once per
/// iteration so the caller can refresh the watchdog and sleep. Mirrors the
/// historical `fw_update_wait_erase` busy-wait.
pub fn wait_for_erase(state: &UpdateState, mut on_tick: impl FnMut()) -> Result<(), ErrorCode> {
    loop {
        match state.erase_state() {
            EraseState::Running => on_tick(),
            EraseState::Done => return Ok(()),
            EraseState::Error => return Err(ErrorCode::Hardware),
            EraseState::Idle => return Ok(()),
        }
    }
}

/// `erase_application`: unlocks flash, kicks off the interrupt-driven erase,
/// and returns immediately — the caller (the update loop) is responsible
/// for calling `wait_for_erase` afterwards so it can interleave watchdog
/// kicks. A second call while one is already `Running` is a no-op, making
/// repeated erase requests idempotent (Testable Property 9).
pub fn erase_application<H: FlashHal>(hal: &mut H, state: &mut UpdateState) {
    if state.erase_state() == EraseState::Running {
        return;
    }
    hal.unlock();
    state.set_erase_state(EraseState::Running);
    hal.start_erase();
}

/// `data`: validates the target address against the application region,
/// then programs the payload one double word at a time. The running CRC
/// accumulator and message counter only advance when every word programs
/// cleanly, so that Testable Properties 4 and 5 hold unconditionally over
/// the sequence of `Ok` calls.
pub fn program<H: FlashHal>(
    hal: &mut H,
    state: &mut UpdateState,
    data: &UpdateData,
) -> Result<(), ErrorCode> {
    let region = hal.app_region();
    let end = data.address.wrapping_add(data.byte_count as u32);
    if data.address < region.start || end > region.end {
        return Err(ErrorCode::Hardware);
    }

    hal.unlock();
    let ok = dword_address_iter(data.address, data.payload(), |address, word| {
        hal.program_double_word(address, word)
    });
    hal.lock();

    if !ok {
        return Err(ErrorCode::Hardware);
    }

    state.accept_payload(data.payload());
    Ok(())
}
