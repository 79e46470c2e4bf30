// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! The CAN-FD transport boundary (C6's hardware half) and the admission
//! policy the dispatcher relies on having already been enforced in
//! hardware.
//!
//! `CanHal` is the capability interface the update loop (C8) drives; a
//! concrete implementation wraps `fdcan` on the embedded target, and a
//! `socketcan`-backed one drives the host debug CLI. Neither lives in this
//! crate — this module only fixes the contract and the filter math both
//! sides must agree on.

use crate::ids::{ArbitrationId, MessageId, NodeId};
use crate::message::Message;

/// Hardware length codes for CAN-FD payload sizes. `fdcan`/`socketcan` both
/// round a requested size up to one of these before transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataLengthCode {
    Bytes(u8),
    Bytes12,
    Bytes16,
    Bytes20,
    Bytes24,
    Bytes32,
    Bytes48,
    Bytes64,
}

/// Rounds a payload length up to the nearest CAN-FD hardware length code.
pub const fn length_to_hardware(len: u8) -> DataLengthCode {
    match len {
        0..=8 => DataLengthCode::Bytes(len),
        9..=12 => DataLengthCode::Bytes12,
        13..=16 => DataLengthCode::Bytes16,
        17..=20 => DataLengthCode::Bytes20,
        21..=24 => DataLengthCode::Bytes24,
        25..=32 => DataLengthCode::Bytes32,
        33..=48 => DataLengthCode::Bytes48,
        _ => DataLengthCode::Bytes64,
    }
}

/// Two hardware filter rules the bootloader installs at bring-up (§4.6):
/// frames addressed to this node from the host, or broadcast
/// `device_info_request`. Anything else is rejected before it ever reaches
/// the dispatcher.
///
/// This is reproduced here as plain logic (rather than only documented as a
/// hardware filter bank configuration) so that host-side tests can assert
/// the policy without instantiating real filter registers, and so a
/// software fallback is available on transports with coarser filtering
/// (e.g. a raw `socketcan` socket, which admits every frame on the bus).
pub fn admits(this_node: NodeId, arb: ArbitrationId) -> bool {
    let destined_here = arb.node_id == this_node.value() && arb.originating_node_id == NodeId::Host.value();
    let broadcast_info_request =
        arb.node_id == NodeId::Broadcast.value() && arb.message_id == MessageId::DeviceInfoRequest.value();
    destined_here || broadcast_info_request
}

/// Capability interface for a CAN-FD peripheral, driven by the update loop
/// (C8). Implementors own bring-up (clock divider, bit timing, filter
/// installation) before the first `receive` call.
pub trait CanHal {
    /// Polls for one received frame without blocking. Returns `None` if the
    /// RX FIFO is empty.
    fn receive(&mut self) -> Option<Message>;

    /// Blocks until a TX slot is free, then enqueues `message`.
    fn transmit(&mut self, message: &Message);

    /// Installs the §4.6 filter set. Called once at bring-up.
    fn configure_filters(&mut self, this_node: NodeId);

    /// Starts normal operation after init/filters are configured.
    fn start(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::FunctionCode;

    fn arb(node_id: u8, originating: u8, message_id: u16) -> ArbitrationId {
        ArbitrationId {
            function_code: FunctionCode::Bootloader as u8,
            node_id,
            originating_node_id: originating,
            message_id,
        }
    }

    #[test]
    fn admits_frames_destined_for_this_node_from_host() {
        let this_node = NodeId::GantryXBootloader;
        let id = arb(
            this_node.value(),
            NodeId::Host.value(),
            MessageId::FwUpdateData.value(),
        );
        assert!(admits(this_node, id));
    }

    #[test]
    fn admits_broadcast_device_info_request() {
        let this_node = NodeId::GantryXBootloader;
        let id = arb(
            NodeId::Broadcast.value(),
            NodeId::Host.value(),
            MessageId::DeviceInfoRequest.value(),
        );
        assert!(admits(this_node, id));
    }

    #[test]
    fn rejects_broadcast_frames_of_other_message_ids() {
        let this_node = NodeId::GantryXBootloader;
        let id = arb(
            NodeId::Broadcast.value(),
            NodeId::Host.value(),
            MessageId::FwUpdateData.value(),
        );
        assert!(!admits(this_node, id));
    }

    #[test]
    fn rejects_frames_destined_for_another_node() {
        let this_node = NodeId::GantryXBootloader;
        let id = arb(
            NodeId::GantryYBootloader.value(),
            NodeId::Host.value(),
            MessageId::FwUpdateData.value(),
        );
        assert!(!admits(this_node, id));
    }

    #[test]
    fn rejects_frames_not_originating_from_host() {
        let this_node = NodeId::GantryXBootloader;
        let id = arb(this_node.value(), NodeId::GripperBootloader.value(), MessageId::FwUpdateData.value());
        assert!(!admits(this_node, id));
    }

    #[test]
    fn length_to_hardware_rounds_up_to_the_nearest_code() {
        assert_eq!(length_to_hardware(0), DataLengthCode::Bytes(0));
        assert_eq!(length_to_hardware(8), DataLengthCode::Bytes(8));
        assert_eq!(length_to_hardware(9), DataLengthCode::Bytes12);
        assert_eq!(length_to_hardware(25), DataLengthCode::Bytes32);
        assert_eq!(length_to_hardware(60), DataLengthCode::Bytes64);
    }
}
