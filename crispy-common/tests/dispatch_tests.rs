// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! End-to-end dispatcher scenarios, mirroring the documented request/response
//! fixtures: device info, bad/undersized data frames, a complete-size
//! mismatch, a status request, and a full 16-byte image round-trip.

use core::ops::Range;

use crispy_common::codec::{compute_checksum, UPDATE_DATA_SIZE};
use crispy_common::dispatch::{self, BootContext, DeviceInfo, DispatchOutcome, NoOverride};
use crispy_common::flash::FlashHal;
use crispy_common::update_state::UpdateState;
use crispy_common::{ArbitrationId, ErrorCode, FunctionCode, Message, MessageId, NodeId};

struct FakeFlash {
    region: Range<u32>,
    memory: Vec<u8>,
}

impl FakeFlash {
    fn new() -> Self {
        let region = 0x0801_0000..0x0804_0000;
        let len = (region.end - region.start) as usize;
        Self {
            region,
            memory: vec![0xffu8; len],
        }
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

fn request(this_node: NodeId, message_id: MessageId, body: &[u8]) -> Message {
    let arb = ArbitrationId {
        function_code: FunctionCode::Bootloader as u8,
        node_id: this_node.value(),
        originating_node_id: NodeId::Host.value(),
        message_id: message_id.value(),
    };
    Message::new(arb, body)
}

fn status(response: &Message) -> u16 {
    let body = response.payload();
    u16::from_be_bytes([body[body.len() - 2], body[body.len() - 1]])
}

fn fresh_context<'a>(
    hal: &'a mut FakeFlash,
    state: &'a mut UpdateState,
) -> BootContext<'a, FakeFlash> {
    BootContext {
        this_node: NodeId::GantryXBootloader,
        hal,
        state,
        device_info: DeviceInfo {
            version: 0x0001_0203,
            flags: 0,
            sha: [0xAA; 8],
            revision_primary: b'b',
            revision_secondary: b'1',
        },
        status_flags: 0x0000_0001,
    }
}

#[test]
fn s1_device_info_request_echoes_index_and_identity() {
    let mut hal = FakeFlash::new();
    let mut state = UpdateState::new();
    let mut ctx = fresh_context(&mut hal, &mut state);
    let req = request(
        ctx.this_node,
        MessageId::DeviceInfoRequest,
        &[0xDE, 0xAD, 0xBE, 0xEF],
    );

    let outcome = dispatch::handle_message(&mut ctx, &mut NoOverride, &req, &mut || {});
    let DispatchOutcome::Response(response) = outcome else {
        panic!("expected a response");
    };
    assert_eq!(response.payload().len(), 25);
    assert_eq!(&response.payload()[0..4], &[0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(response.arbitration_id.node_id, NodeId::Host.value());
    assert_eq!(
        response.arbitration_id.originating_node_id,
        ctx.this_node.value()
    );
}

fn data_frame(byte_count: u8, payload_fill: u8, corrupt_checksum: bool) -> [u8; UPDATE_DATA_SIZE] {
    let mut buf = [0u8; UPDATE_DATA_SIZE];
    buf[0..4].copy_from_slice(&0xDEAD_BEEFu32.to_be_bytes());
    buf[4..8].copy_from_slice(&0x0801_0000u32.to_be_bytes());
    buf[8] = byte_count;
    for b in &mut buf[10..10 + byte_count as usize] {
        *b = payload_fill;
    }
    let checksum = compute_checksum(&buf[0..58]);
    buf[58..60].copy_from_slice(&checksum.to_be_bytes());
    if corrupt_checksum {
        buf[59] ^= 0xff;
    }
    buf
}

#[test]
fn s2_bad_checksum_data_frame_reports_bad_checksum() {
    let mut hal = FakeFlash::new();
    let mut state = UpdateState::new();
    let mut ctx = fresh_context(&mut hal, &mut state);
    let req = request(ctx.this_node, MessageId::FwUpdateData, &data_frame(8, 0xC0, true));

    let outcome = dispatch::handle_message(&mut ctx, &mut NoOverride, &req, &mut || {});
    let DispatchOutcome::Response(response) = outcome else {
        panic!("expected a response");
    };
    assert_eq!(&response.payload()[0..4], &[0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(status(&response), ErrorCode::BadChecksum.value());
}

#[test]
fn s3_undersized_data_frame_reports_invalid_size() {
    let mut hal = FakeFlash::new();
    let mut state = UpdateState::new();
    let mut ctx = fresh_context(&mut hal, &mut state);
    let full = data_frame(8, 0xC0, false);
    let req = request(ctx.this_node, MessageId::FwUpdateData, &full[..8]);

    let outcome = dispatch::handle_message(&mut ctx, &mut NoOverride, &req, &mut || {});
    let DispatchOutcome::Response(response) = outcome else {
        panic!("expected a response");
    };
    assert_eq!(status(&response), ErrorCode::InvalidSize.value());
}

#[test]
fn s4_complete_with_size_mismatch_reports_invalid_size() {
    let mut hal = FakeFlash::new();
    let mut state = UpdateState::new();
    state.initialize();
    state.accept_payload(&[0xAA; 8]);

    let mut ctx = fresh_context(&mut hal, &mut state);
    let mut body = [0u8; 12];
    body[0..4].copy_from_slice(&1u32.to_be_bytes());
    body[4..8].copy_from_slice(&2u32.to_be_bytes()); // does not match num_messages_received == 1
    body[8..12].copy_from_slice(&0u32.to_be_bytes());
    let req = request(ctx.this_node, MessageId::FwUpdateComplete, &body);

    let outcome = dispatch::handle_message(&mut ctx, &mut NoOverride, &req, &mut || {});
    let DispatchOutcome::Response(response) = outcome else {
        panic!("expected a response");
    };
    assert_eq!(status(&response), ErrorCode::InvalidSize.value());
}

#[test]
fn s5_status_request_echoes_index_and_flags() {
    let mut hal = FakeFlash::new();
    let mut state = UpdateState::new();
    let mut ctx = fresh_context(&mut hal, &mut state);
    let req = request(
        ctx.this_node,
        MessageId::FwUpdateStatusRequest,
        &[0xDE, 0xAD, 0xBE, 0xEF],
    );

    let outcome = dispatch::handle_message(&mut ctx, &mut NoOverride, &req, &mut || {});
    let DispatchOutcome::Response(response) = outcome else {
        panic!("expected a response");
    };
    assert_eq!(response.payload().len(), 8);
    assert_eq!(&response.payload()[0..4], &[0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(&response.payload()[4..8], &1u32.to_be_bytes());
}

#[test]
fn s6_round_trip_of_one_sixteen_byte_image() {
    let mut hal = FakeFlash::new();
    let mut state = UpdateState::new();
    let mut ctx = fresh_context(&mut hal, &mut state);

    let init_req = request(ctx.this_node, MessageId::FwUpdateInitiate, &[0, 0, 0, 0]);
    dispatch::handle_message(&mut ctx, &mut NoOverride, &init_req, &mut || {});

    let mut first = [0u8; UPDATE_DATA_SIZE];
    first[0..4].copy_from_slice(&0u32.to_be_bytes());
    first[4..8].copy_from_slice(&0x0801_0000u32.to_be_bytes());
    first[8] = 8;
    let image: [u8; 16] = core::array::from_fn(|i| i as u8);
    first[10..18].copy_from_slice(&image[0..8]);
    let checksum = compute_checksum(&first[0..58]);
    first[58..60].copy_from_slice(&checksum.to_be_bytes());

    let mut second = [0u8; UPDATE_DATA_SIZE];
    second[0..4].copy_from_slice(&1u32.to_be_bytes());
    second[4..8].copy_from_slice(&0x0801_0008u32.to_be_bytes());
    second[8] = 8;
    second[10..18].copy_from_slice(&image[8..16]);
    let checksum = compute_checksum(&second[0..58]);
    second[58..60].copy_from_slice(&checksum.to_be_bytes());

    for frame in [&first, &second] {
        let req = request(ctx.this_node, MessageId::FwUpdateData, frame);
        let outcome = dispatch::handle_message(&mut ctx, &mut NoOverride, &req, &mut || {});
        let DispatchOutcome::Response(response) = outcome else {
            panic!("expected a response");
        };
        assert_eq!(status(&response), ErrorCode::Ok.value());
    }

    let crc = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC).checksum(&image);
    let mut complete_body = [0u8; 12];
    complete_body[0..4].copy_from_slice(&2u32.to_be_bytes());
    complete_body[4..8].copy_from_slice(&2u32.to_be_bytes());
    complete_body[8..12].copy_from_slice(&crc.to_be_bytes());
    let complete_req = request(ctx.this_node, MessageId::FwUpdateComplete, &complete_body);
    let outcome = dispatch::handle_message(&mut ctx, &mut NoOverride, &complete_req, &mut || {});
    let DispatchOutcome::Response(response) = outcome else {
        panic!("expected a response");
    };
    assert_eq!(status(&response), ErrorCode::Ok.value());
    assert_eq!(state.num_messages_received(), 2);
}
