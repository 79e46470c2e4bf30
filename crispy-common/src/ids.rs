// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! CAN identity catalogue: function codes, node ids, message ids and error
//! codes shared by every node's bootloader.
//!
//! Values are carried over from the historical `ids.h` catalogue (itself
//! generated from a single source of truth upstream) rather than invented,
//! so that a bootloader built from this crate interoperates with nodes that
//! predate it.

/// Coarse class of a CAN message, packed into the top 4 bits of the
/// arbitration id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum FunctionCode {
    NetworkManagement = 0x0,
    Sync = 0x1,
    Error = 0x2,
    Command = 0x3,
    Status = 0x4,
    Parameters = 0x5,
    Bootloader = 0x6,
    Heartbeat = 0x7,
}

impl FunctionCode {
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0x0 => Some(Self::NetworkManagement),
            0x1 => Some(Self::Sync),
            0x2 => Some(Self::Error),
            0x3 => Some(Self::Command),
            0x4 => Some(Self::Status),
            0x5 => Some(Self::Parameters),
            0x6 => Some(Self::Bootloader),
            0x7 => Some(Self::Heartbeat),
            _ => None,
        }
    }
}

/// A node's 7-bit identity. Every motor/peripheral node has a distinct
/// "bootloader" variant (low nibble forced to `0xf`) addressed separately
/// from its application identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum NodeId {
    Broadcast = 0x00,
    Host = 0x10,
    Gripper = 0x20,
    GripperBootloader = 0x2f,
    GantryX = 0x30,
    GantryXBootloader = 0x3f,
    GantryY = 0x40,
    GantryYBootloader = 0x4f,
    Head = 0x50,
    HeadBootloader = 0x5f,
    PipetteLeft = 0x60,
    PipetteLeftBootloader = 0x6f,
    PipetteRight = 0x70,
    PipetteRightBootloader = 0x7f,
}

impl NodeId {
    pub const fn value(self) -> u8 {
        self as u8
    }

    pub const fn from_value(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Broadcast),
            0x10 => Some(Self::Host),
            0x20 => Some(Self::Gripper),
            0x2f => Some(Self::GripperBootloader),
            0x30 => Some(Self::GantryX),
            0x3f => Some(Self::GantryXBootloader),
            0x40 => Some(Self::GantryY),
            0x4f => Some(Self::GantryYBootloader),
            0x50 => Some(Self::Head),
            0x5f => Some(Self::HeadBootloader),
            0x60 => Some(Self::PipetteLeft),
            0x6f => Some(Self::PipetteLeftBootloader),
            0x70 => Some(Self::PipetteRight),
            0x7f => Some(Self::PipetteRightBootloader),
            _ => None,
        }
    }

    /// The bootloader identity a node of this application identity answers
    /// to while in update mode. Idempotent on an id that is already a
    /// bootloader variant.
    pub const fn as_bootloader(self) -> Self {
        let v = self.value() | 0x0f;
        match Self::from_value(v) {
            Some(id) => id,
            None => self,
        }
    }

    pub const fn is_bootloader(self) -> bool {
        (self.value() & 0x0f) == 0x0f && self.value() != 0x0f
    }
}

/// Message kinds relevant to the bootloader core. Historical numeric values
/// kept verbatim so frames remain compatible with nodes built from the
/// original firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum MessageId {
    FwUpdateInitiate = 0x60,
    FwUpdateData = 0x61,
    FwUpdateDataAck = 0x62,
    FwUpdateComplete = 0x63,
    FwUpdateCompleteAck = 0x64,
    FwUpdateStatusRequest = 0x65,
    FwUpdateStatusResponse = 0x66,
    FwUpdateStartApp = 0x67,
    FwUpdateEraseApp = 0x68,
    FwUpdateEraseAppAck = 0x69,
    DeviceInfoRequest = 0x302,
    DeviceInfoResponse = 0x303,
}

impl MessageId {
    pub const fn value(self) -> u16 {
        self as u16
    }

    pub const fn from_value(value: u16) -> Option<Self> {
        match value {
            0x60 => Some(Self::FwUpdateInitiate),
            0x61 => Some(Self::FwUpdateData),
            0x62 => Some(Self::FwUpdateDataAck),
            0x63 => Some(Self::FwUpdateComplete),
            0x64 => Some(Self::FwUpdateCompleteAck),
            0x65 => Some(Self::FwUpdateStatusRequest),
            0x66 => Some(Self::FwUpdateStatusResponse),
            0x67 => Some(Self::FwUpdateStartApp),
            0x68 => Some(Self::FwUpdateEraseApp),
            0x69 => Some(Self::FwUpdateEraseAppAck),
            0x302 => Some(Self::DeviceInfoRequest),
            0x303 => Some(Self::DeviceInfoResponse),
            _ => None,
        }
    }
}

/// 16-bit status/error code carried big-endian in response bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum ErrorCode {
    Ok = 0x0000,
    InvalidSize = 0x0001,
    BadChecksum = 0x0002,
    InvalidByteCount = 0x0003,
    InvalidInput = 0x0004,
    Hardware = 0x0005,
}

impl ErrorCode {
    pub const fn value(self) -> u16 {
        self as u16
    }
}

/// Identity of the attachment sensed on a pipette/gripper mount, reported
/// as a subtype byte appended to `device_info_response` by board-specific
/// overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ToolType {
    NothingAttached = 0x00,
    Pipette = 0x01,
    Gripper = 0x02,
    ToolError = 0x03,
    UndefinedTool = 0xff,
}

/// The 29-bit extended arbitration id, packed LSB-first as
/// `[msg_id:11 | orig:7 | dest:7 | func:4]` with 3 reserved bits on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ArbitrationId {
    pub function_code: u8,
    pub node_id: u8,
    pub originating_node_id: u8,
    pub message_id: u16,
}

impl ArbitrationId {
    const FUNC_SHIFT: u32 = 0;
    const DEST_SHIFT: u32 = 4;
    const ORIG_SHIFT: u32 = 11;
    const MSG_SHIFT: u32 = 18;

    pub const fn pack(self) -> u32 {
        ((self.function_code as u32 & 0xf) << Self::FUNC_SHIFT)
            | ((self.node_id as u32 & 0x7f) << Self::DEST_SHIFT)
            | ((self.originating_node_id as u32 & 0x7f) << Self::ORIG_SHIFT)
            | ((self.message_id as u32 & 0x7ff) << Self::MSG_SHIFT)
    }

    pub const fn unpack(id: u32) -> Self {
        Self {
            function_code: ((id >> Self::FUNC_SHIFT) & 0xf) as u8,
            node_id: ((id >> Self::DEST_SHIFT) & 0x7f) as u8,
            originating_node_id: ((id >> Self::ORIG_SHIFT) & 0x7f) as u8,
            message_id: ((id >> Self::MSG_SHIFT) & 0x7ff) as u16,
        }
    }

    /// Build the arbitration id of a response frame: destination is the
    /// host, origin is this node, message id is the response's own id.
    pub const fn response(this_node: NodeId, response_message_id: MessageId) -> Self {
        Self {
            function_code: FunctionCode::Bootloader as u8,
            node_id: NodeId::Host.value(),
            originating_node_id: this_node.value(),
            message_id: response_message_id.value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_round_trip() {
        let id = ArbitrationId {
            function_code: 0x5,
            node_id: 0x6f,
            originating_node_id: 0x10,
            message_id: 0x302,
        };
        let packed = id.pack();
        assert!(packed <= 0x1FFF_FFFF);
        assert_eq!(ArbitrationId::unpack(packed), id);
    }

    #[test]
    fn reserved_bits_are_zero_on_pack() {
        let id = ArbitrationId {
            function_code: 0xff,
            node_id: 0xff,
            originating_node_id: 0xff,
            message_id: 0xffff,
        };
        let packed = id.pack();
        assert_eq!(packed & !0x1FFF_FFFF, 0);
    }

    #[test]
    fn bootloader_variant_of_application_id() {
        assert_eq!(NodeId::PipetteLeft.as_bootloader(), NodeId::PipetteLeftBootloader);
        assert!(NodeId::PipetteLeftBootloader.is_bootloader());
        assert!(!NodeId::PipetteLeft.is_bootloader());
    }

    #[test]
    fn response_arbitration_id_addresses_host() {
        let arb = ArbitrationId::response(NodeId::GantryXBootloader, MessageId::FwUpdateDataAck);
        assert_eq!(arb.node_id, NodeId::Host.value());
        assert_eq!(arb.originating_node_id, NodeId::GantryXBootloader.value());
        assert_eq!(arb.message_id, MessageId::FwUpdateDataAck.value());
    }
}
