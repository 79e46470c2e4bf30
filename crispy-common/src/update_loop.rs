// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! The update loop (C8): the sole foreground actor while the bootloader is
//! not running the resident application.
//!
//! This is deliberately hardware-independent — it is driven entirely
//! through the [`crate::can::CanHal`], [`crate::flash::FlashHal`] and
//! [`Watchdog`] capability interfaces, so the loop body itself is the same
//! on the real STM32G4/L5 target and in a host-run test, only the
//! implementors differ.

use crate::can::CanHal;
use crate::dispatch::{self, BoardOverride, BootContext, DispatchOutcome};
use crate::flash::FlashHal;
use crate::ids::{MessageId, NodeId};

/// The independent watchdog (§5): must be refreshed at least once per loop
/// iteration, and once per flash-operation completion callback. Losing
/// track of it reboots the node, which re-enters the update loop regardless
/// of the application-update-request flag (§7 recovery policy).
pub trait Watchdog {
    fn kick(&mut self);
}

/// Runs the update loop body for a single poll cycle: pulls at most one
/// frame from `can`, dispatches it, transmits the response if any, and
/// kicks the watchdog exactly once regardless of whether a frame was
/// present (§4.8: "each loop iteration refreshes the independent
/// watchdog").
///
/// Returns `true` if the caller should jump to the application now, because
/// the admitted frame was `fw_update_start_app` — the handoff itself is not
/// performed here; C9 lives behind its own `unsafe` boundary and the caller
/// decides when it is safe to give up this function's borrows of `ctx`.
pub fn run_once<C, H, B>(
    can: &mut C,
    ctx: &mut BootContext<H>,
    board: &mut B,
    watchdog: &mut impl Watchdog,
) -> bool
where
    C: CanHal,
    H: FlashHal,
    B: BoardOverride<H>,
{
    let mut start_app_requested = false;

    if let Some(request) = can.receive() {
        if request.arbitration_id.node_id == ctx.this_node.value()
            && MessageId::from_value(request.arbitration_id.message_id) == Some(MessageId::FwUpdateStartApp)
        {
            // §4.5: "no response; triggers handoff" — skip the dispatcher
            // entirely so no ack is ever queued for this message kind.
            start_app_requested = true;
        } else {
            let mut on_tick = || watchdog.kick();
            match dispatch::handle_message(ctx, board, &request, &mut on_tick) {
                DispatchOutcome::Response(response) => can.transmit(&response),
                DispatchOutcome::Ok | DispatchOutcome::Error | DispatchOutcome::NotHandled => {}
            }
        }
    }

    watchdog.kick();
    start_app_requested
}

/// Brings the CAN peripheral up and installs the §4.6 filter set. Call once
/// before the first `run_once`.
pub fn start_can<C: CanHal>(can: &mut C, this_node: NodeId) {
    can.configure_filters(this_node);
    can.start();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{compute_checksum, UPDATE_DATA_SIZE};
    use crate::dispatch::{DeviceInfo, NoOverride};
    use crate::ids::{ArbitrationId, ErrorCode, FunctionCode};
    use crate::message::Message;
    use crate::update_state::UpdateState;
    use core::ops::Range;
    use std::vec::Vec;

    struct FakeFlash {
        region: Range<u32>,
        memory: Vec<u8>,
    }

    impl FakeFlash {
        fn new() -> Self {
            let region = 0x0801_0000..0x0804_0000;
            let len = (region.end - region.start) as usize;
            Self { region, memory: vec![0xffu8; len] }
        }
    }

    impl FlashHal for FakeFlash {
        fn app_region(&self) -> Range<u32> {
            self.region.clone()
        }
        fn unlock(&mut self) {}
        fn lock(&mut self) {}
        fn program_double_word(&mut self, address: u32, word: u64) -> bool {
            let offset = (address - self.region.start) as usize;
            self.memory[offset..offset + 8].copy_from_slice(&word.to_be_bytes());
            true
        }
        fn start_erase(&mut self) {
            self.memory.fill(0xff);
        }
    }

    struct FakeCan {
        inbox: Vec<Message>,
        outbox: Vec<Message>,
        filters_installed: bool,
        started: bool,
    }

    impl FakeCan {
        fn new() -> Self {
            Self { inbox: Vec::new(), outbox: Vec::new(), filters_installed: false, started: false }
        }
    }

    impl CanHal for FakeCan {
        fn receive(&mut self) -> Option<Message> {
            if self.inbox.is_empty() {
                None
            } else {
                Some(self.inbox.remove(0))
            }
        }
        fn transmit(&mut self, message: &Message) {
            self.outbox.push(*message);
        }
        fn configure_filters(&mut self, _this_node: NodeId) {
            self.filters_installed = true;
        }
        fn start(&mut self) {
            self.started = true;
        }
    }

    #[derive(Default)]
    struct CountingWatchdog {
        kicks: u32,
    }

    impl Watchdog for CountingWatchdog {
        fn kick(&mut self) {
            self.kicks += 1;
        }
    }

    fn fresh_context<'a>(hal: &'a mut FakeFlash, state: &'a mut UpdateState) -> BootContext<'a, FakeFlash> {
        BootContext {
            this_node: NodeId::GantryXBootloader,
            hal,
            state,
            device_info: DeviceInfo {
                version: 1,
                flags: 0,
                sha: [0; 8],
                revision_primary: b'a',
                revision_secondary: b'1',
            },
            status_flags: 0,
        }
    }

    fn request(this_node: NodeId, message_id: MessageId, body: &[u8]) -> Message {
        let arb = ArbitrationId {
            function_code: FunctionCode::Bootloader as u8,
            node_id: this_node.value(),
            originating_node_id: NodeId::Host.value(),
            message_id: message_id.value(),
        };
        Message::new(arb, body)
    }

    #[test]
    fn start_can_configures_filters_then_starts() {
        let mut can = FakeCan::new();
        start_can(&mut can, NodeId::GantryXBootloader);
        assert!(can.filters_installed);
        assert!(can.started);
    }

    #[test]
    fn idle_poll_still_kicks_the_watchdog() {
        let mut hal = FakeFlash::new();
        let mut state = UpdateState::new();
        let mut ctx = fresh_context(&mut hal, &mut state);
        let mut can = FakeCan::new();
        let mut board = NoOverride;
        let mut watchdog = CountingWatchdog::default();

        let handoff = run_once(&mut can, &mut ctx, &mut board, &mut watchdog);
        assert!(!handoff);
        assert_eq!(watchdog.kicks, 1);
        assert!(can.outbox.is_empty());
    }

    #[test]
    fn a_device_info_request_is_answered_and_transmitted() {
        let mut hal = FakeFlash::new();
        let mut state = UpdateState::new();
        let mut ctx = fresh_context(&mut hal, &mut state);
        let mut can = FakeCan::new();
        can.inbox.push(request(ctx.this_node, MessageId::DeviceInfoRequest, &[0, 0, 0, 1]));
        let mut board = NoOverride;
        let mut watchdog = CountingWatchdog::default();

        let handoff = run_once(&mut can, &mut ctx, &mut board, &mut watchdog);
        assert!(!handoff);
        assert_eq!(can.outbox.len(), 1);
        assert_eq!(
            can.outbox[0].arbitration_id.message_id,
            MessageId::DeviceInfoResponse.value()
        );
    }

    #[test]
    fn start_app_request_is_reported_without_a_response() {
        let mut hal = FakeFlash::new();
        let mut state = UpdateState::new();
        let mut ctx = fresh_context(&mut hal, &mut state);
        let mut can = FakeCan::new();
        can.inbox.push(request(ctx.this_node, MessageId::FwUpdateStartApp, &[]));
        let mut board = NoOverride;
        let mut watchdog = CountingWatchdog::default();

        let handoff = run_once(&mut can, &mut ctx, &mut board, &mut watchdog);
        assert!(handoff);
        assert!(can.outbox.is_empty());
        assert_eq!(watchdog.kicks, 1);
    }

    #[test]
    fn a_bad_checksum_data_frame_still_gets_an_ack() {
        let mut hal = FakeFlash::new();
        let mut state = UpdateState::new();
        let mut ctx = fresh_context(&mut hal, &mut state);
        let mut can = FakeCan::new();

        let mut buf = [0u8; UPDATE_DATA_SIZE];
        buf[0..4].copy_from_slice(&0u32.to_be_bytes());
        buf[4..8].copy_from_slice(&0x0801_0000u32.to_be_bytes());
        buf[8] = 8;
        let checksum = compute_checksum(&buf[0..58]);
        buf[58..60].copy_from_slice(&checksum.to_be_bytes());
        buf[59] ^= 0xff;
        can.inbox.push(request(ctx.this_node, MessageId::FwUpdateData, &buf));

        let mut board = NoOverride;
        let mut watchdog = CountingWatchdog::default();
        run_once(&mut can, &mut ctx, &mut board, &mut watchdog);

        assert_eq!(can.outbox.len(), 1);
        let body = can.outbox[0].payload();
        assert_eq!(
            u16::from_be_bytes([body[body.len() - 2], body[body.len() - 1]]),
            ErrorCode::BadChecksum.value()
        );
    }
}
