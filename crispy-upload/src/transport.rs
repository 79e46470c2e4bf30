// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! SocketCAN transport: the same 29-bit arbitration-id wire format the
//! bootloader itself speaks, carried over a Linux `can`/`vcan` interface
//! instead of a hardware FDCAN peripheral.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use socketcan::{CanAnyFrame, CanFdFrame, CanFdSocket, ExtendedId, Frame, Id, Socket};

use crispy_common::ids::FunctionCode;
use crispy_common::{ArbitrationId, Message, MessageId, NodeId};

/// How long to wait for one response frame before giving up.
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;
/// How long to wait for a response that involves a flash erase.
pub const ERASE_TIMEOUT_MS: u64 = 60_000;

pub struct Transport {
    socket: CanFdSocket,
    node: NodeId,
}

impl Transport {
    pub fn new(iface: &str, node: NodeId) -> Result<Self> {
        let socket =
            CanFdSocket::open(iface).with_context(|| format!("failed to open CAN interface {iface}"))?;
        socket
            .set_read_timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .context("failed to set read timeout")?;
        Ok(Self { socket, node })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Sends `body` as `message_id`, addressed to this transport's node, and
    /// waits for the matching response, as identified by `response_id`
    /// originating from that same node.
    pub fn request(&mut self, message_id: MessageId, body: &[u8]) -> Result<Message> {
        self.request_with_timeout(message_id, body, DEFAULT_TIMEOUT_MS)
    }

    pub fn request_with_timeout(
        &mut self,
        message_id: MessageId,
        body: &[u8],
        timeout_ms: u64,
    ) -> Result<Message> {
        let arb = ArbitrationId {
            function_code: FunctionCode::Bootloader as u8,
            node_id: self.node.value(),
            originating_node_id: NodeId::Host.value(),
            message_id: message_id.value(),
        };
        let request = Message::new(arb, body);
        self.send(&request)?;
        self.socket
            .set_read_timeout(Duration::from_millis(timeout_ms))
            .context("failed to set read timeout")?;
        let response = self.receive_from_this_node()?;
        self.socket
            .set_read_timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .context("failed to restore read timeout")?;
        Ok(response)
    }

    /// Broadcasts `device_info_request`: every node on the bus answers,
    /// so this doesn't wait for a specific originator.
    pub fn broadcast_device_info_request(&mut self, message_index: u32) -> Result<()> {
        let arb = ArbitrationId {
            function_code: FunctionCode::Bootloader as u8,
            node_id: NodeId::Broadcast.value(),
            originating_node_id: NodeId::Host.value(),
            message_id: MessageId::DeviceInfoRequest.value(),
        };
        let body = message_index.to_be_bytes();
        self.send(&Message::new(arb, &body))
    }

    /// Sends `fw_update_start_app` without waiting for a reply: §4.5 lists
    /// it among the messages the core table answers with "ok, no response".
    pub fn send_start_app(&mut self, body: &[u8]) -> Result<()> {
        let arb = ArbitrationId {
            function_code: FunctionCode::Bootloader as u8,
            node_id: self.node.value(),
            originating_node_id: NodeId::Host.value(),
            message_id: MessageId::FwUpdateStartApp.value(),
        };
        self.send(&Message::new(arb, body))
    }

    pub fn receive_one(&mut self, timeout_ms: u64) -> Result<Option<Message>> {
        self.socket
            .set_read_timeout(Duration::from_millis(timeout_ms))
            .context("failed to set read timeout")?;
        match self.socket.read_frame() {
            Ok(frame) => Ok(decode_frame(frame)),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
                Ok(None)
            }
            Err(e) => Err(e).context("CAN read error"),
        }
    }

    fn send(&mut self, message: &Message) -> Result<()> {
        let id = ExtendedId::new(message.arbitration_id.pack()).context("arbitration id out of range")?;
        let frame = CanFdFrame::new(Id::Extended(id), message.payload())
            .context("payload too long for one CAN-FD frame")?;
        self.socket.write_frame(&frame).context("CAN write error")?;
        Ok(())
    }

    fn receive_from_this_node(&mut self) -> Result<Message> {
        loop {
            let frame = self
                .socket
                .read_frame()
                .context("timed out waiting for a response")?;
            if let Some(message) = decode_frame(frame) {
                if message.arbitration_id.originating_node_id == self.node.value() {
                    return Ok(message);
                }
            }
        }
    }

    pub fn drain(&mut self) {
        let _ = self.socket.set_read_timeout(Duration::from_millis(1));
        while self.socket.read_frame().is_ok() {}
        let _ = self.socket.set_read_timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS));
    }
}

fn decode_frame(frame: CanAnyFrame) -> Option<Message> {
    let (id, data): (Id, &[u8]) = match &frame {
        CanAnyFrame::Normal(f) => (f.id(), f.data()),
        CanAnyFrame::Fd(f) => (f.id(), f.data()),
        _ => return None,
    };
    let Id::Extended(id) = id else {
        return None;
    };
    let arb = ArbitrationId::unpack(id.as_raw());
    Some(Message::new(arb, data))
}

/// Resolve the bootloader id answering for a given node name on the CLI.
pub fn parse_node(name: &str) -> Result<NodeId> {
    Ok(match name {
        "gantry-x" => NodeId::GantryXBootloader,
        "gantry-y" => NodeId::GantryYBootloader,
        "head" => NodeId::HeadBootloader,
        "gripper" => NodeId::GripperBootloader,
        "pipette-left" => NodeId::PipetteLeftBootloader,
        "pipette-right" => NodeId::PipetteRightBootloader,
        other => bail!(
            "unknown node '{other}': expected one of gantry-x, gantry-y, head, gripper, pipette-left, pipette-right"
        ),
    })
}
