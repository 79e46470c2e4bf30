// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! The update-state store (C3): running message count, CRC-32 accumulator
//! and erase-state flag for one update session.
//!
//! Per the redesign note in SPEC_FULL.md §4.3a this is an explicit value
//! owned by the update loop and threaded by `&mut` into message handlers,
//! not a process-wide mutable singleton.

use core::cell::Cell;

use crc::{Crc, Digest, CRC_32_ISO_HDLC};

use crate::ids::ErrorCode;

static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Status of the (possibly interrupt-driven) flash erase operation. Written
/// from an ISR, read from the update loop; callers must treat it as a
/// volatile, asynchronously-written value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EraseState {
    Idle,
    Running,
    Done,
    Error,
}

pub struct UpdateState {
    num_messages_received: u32,
    digest: Digest<'static, u32>,
    /// `Cell`-backed so the erase-complete/error handshake can be driven
    /// through a shared reference, mirroring the ISR/foreground split this
    /// field stands in for (see the struct-level note above).
    erase_state: Cell<EraseState>,
    /// Set when `initialize` has run this session; the application region
    /// must never be written before this is true (last bullet of the §3
    /// invariants).
    initialized: bool,
}

impl UpdateState {
    pub fn new() -> Self {
        Self {
            num_messages_received: 0,
            digest: CRC32.digest(),
            erase_state: Cell::new(EraseState::Idle),
            initialized: false,
        }
    }

    /// `initialize`: resets counters and the CRC accumulator. Does not
    /// itself erase flash.
    pub fn initialize(&mut self) {
        self.num_messages_received = 0;
        self.digest = CRC32.digest();
        self.erase_state.set(EraseState::Idle);
        self.initialized = true;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn num_messages_received(&self) -> u32 {
        self.num_messages_received
    }

    pub fn erase_state(&self) -> EraseState {
        self.erase_state.get()
    }

    pub fn set_erase_state(&self, state: EraseState) {
        self.erase_state.set(state);
    }

    /// Folds `payload` into the running CRC-32 accumulator and bumps the
    /// message counter. Called once per successfully-programmed `data`
    /// frame, in arrival order (Invariant: `error_detection` reflects
    /// exactly the accepted bytes so far, in arrival order).
    pub fn accept_payload(&mut self, payload: &[u8]) {
        self.digest.update(payload);
        self.num_messages_received += 1;
    }

    /// Peeks the CRC-32 accumulated so far without consuming the running
    /// digest (`Digest::finalize` takes `self` by value, so peeking clones
    /// it first).
    pub fn crc_so_far(&self) -> u32 {
        self.digest.clone().finalize()
    }

    /// `complete`: compares the host's expectations against the session's
    /// observed counters, per the §4.4 `complete` rules.
    ///
    /// The distilled spec calls the CRC mismatch `invalid_data`, a status
    /// absent from the concrete 6-entry error-code table (§6). The
    /// historical `handle_fw_update_complete` resolves this by mapping its
    /// own `fw_update_invalid_data` onto the wire value of
    /// `can_errorcode_bad_checksum` — reusing the checksum-mismatch code
    /// rather than minting a seventh one — so this rewrite does the same.
    pub fn complete(&self, num_messages: u32, expected_crc32: u32) -> Result<(), ErrorCode> {
        if num_messages != self.num_messages_received {
            return Err(ErrorCode::InvalidSize);
        }
        if self.crc_so_far() != expected_crc32 {
            return Err(ErrorCode::BadChecksum);
        }
        Ok(())
    }
}

impl Default for UpdateState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_has_empty_crc_and_zero_count() {
        let state = UpdateState::new();
        assert_eq!(state.num_messages_received(), 0);
        assert_eq!(state.crc_so_far(), CRC32.checksum(&[]));
    }

    #[test]
    fn initialize_resets_counters_after_activity() {
        let mut state = UpdateState::new();
        state.accept_payload(&[1, 2, 3]);
        state.initialize();
        assert_eq!(state.num_messages_received(), 0);
        assert_eq!(state.crc_so_far(), CRC32.checksum(&[]));
    }

    #[test]
    fn accept_payload_is_order_sensitive_and_monotonic() {
        let mut state = UpdateState::new();
        state.accept_payload(&[0x00, 0x01]);
        state.accept_payload(&[0x02, 0x03]);
        assert_eq!(state.num_messages_received(), 2);
        assert_eq!(state.crc_so_far(), CRC32.checksum(&[0x00, 0x01, 0x02, 0x03]));
    }

    #[test]
    fn complete_ok_on_fresh_session() {
        let state = UpdateState::new();
        assert!(state.complete(0, CRC32.checksum(&[])).is_ok());
    }

    #[test]
    fn complete_rejects_message_count_mismatch() {
        let mut state = UpdateState::new();
        state.accept_payload(&[1, 2, 3, 4]);
        assert_eq!(
            state.complete(2, CRC32.checksum(&[1, 2, 3, 4])),
            Err(ErrorCode::InvalidSize)
        );
    }

    #[test]
    fn complete_rejects_crc_mismatch() {
        let mut state = UpdateState::new();
        state.accept_payload(&[1, 2, 3, 4]);
        assert_eq!(state.complete(1, 0), Err(ErrorCode::BadChecksum));
    }

    #[test]
    fn round_trip_of_one_sixteen_byte_image() {
        // S6: two 8-byte data frames carrying 00..0F, then complete.
        let mut state = UpdateState::new();
        state.initialize();
        state.accept_payload(&[0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07]);
        state.accept_payload(&[0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F]);
        let image: [u8; 16] = core::array::from_fn(|i| i as u8);
        assert!(state.complete(2, CRC32.checksum(&image)).is_ok());
        assert_eq!(state.num_messages_received(), 2);
    }
}
