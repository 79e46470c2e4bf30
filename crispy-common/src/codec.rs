// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Wire codec: big-endian integer packing, the ones-complement checksum,
//! and the three bootloader message-body parsers.
//!
//! Field sizes below correct a sizing error in the distilled design notes:
//! arithmetic on the stated 60-byte `UpdateData` frame (10-byte header + N
//! payload bytes + 2-byte checksum, with the checksum covering the first 58
//! bytes) only closes with a 48-byte payload, which the historical test
//! fixtures confirm exactly. See SPEC_FULL.md / DESIGN.md.

use crate::ids::ErrorCode;

/// Fixed total size of an `UpdateData` body.
pub const UPDATE_DATA_SIZE: usize = 60;
/// Fixed payload capacity of an `UpdateData` body.
pub const MAX_BYTE_COUNT: usize = 48;
/// Fixed total size of an `UpdateComplete` body.
pub const UPDATE_COMPLETE_SIZE: usize = 12;
/// Fixed total size of an empty (index-only) message body.
pub const EMPTY_MESSAGE_SIZE: usize = 4;

pub fn to_uint32(buf: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = buf.get(0..4)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

pub fn to_uint16(buf: &[u8]) -> Option<u16> {
    let bytes: [u8; 2] = buf.get(0..2)?.try_into().ok()?;
    Some(u16::from_be_bytes(bytes))
}

/// Writes `value` big-endian into `buf[0..4]`, returning the advanced
/// cursor. A buffer shorter than 4 bytes is a no-op that returns the
/// original offset.
pub fn write_uint32(buf: &mut [u8], value: u32) -> usize {
    match buf.get_mut(0..4) {
        Some(slot) => {
            slot.copy_from_slice(&value.to_be_bytes());
            4
        }
        None => 0,
    }
}

pub fn write_uint16(buf: &mut [u8], value: u16) -> usize {
    match buf.get_mut(0..2) {
        Some(slot) => {
            slot.copy_from_slice(&value.to_be_bytes());
            2
        }
        None => 0,
    }
}

/// Ones-complement-negated sum of `bytes`, low 16 bits. Matches the
/// historical `compute_checksum`: accumulate as a signed 32-bit sum, negate,
/// mask to 16 bits.
pub fn compute_checksum(bytes: &[u8]) -> u16 {
    let sum: i32 = bytes.iter().map(|&b| b as i32).sum();
    (0x1_0000_i32.wrapping_sub(sum) & 0xFFFF) as u16
}

/// Body of `fw_update_data`: a slice of firmware bytes destined for a flash
/// address, checksummed independently of the frame's CRC-32 accumulator.
#[derive(Debug, Clone, Copy)]
pub struct UpdateData {
    pub message_index: u32,
    pub address: u32,
    pub byte_count: u8,
    pub payload: [u8; MAX_BYTE_COUNT],
}

impl UpdateData {
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.byte_count as usize]
    }
}

/// Body of `fw_update_complete`: the message count and CRC-32 the host
/// expects the session to have accumulated.
#[derive(Debug, Clone, Copy)]
pub struct UpdateComplete {
    pub message_index: u32,
    pub num_messages: u32,
    pub expected_crc32: u32,
}

/// `size = 4`: just a message index, used by `fw_update_initiate`,
/// `fw_update_status_request`, `device_info_request` and `fw_update_start_app`.
pub fn parse_empty_message(buf: &[u8]) -> Result<u32, ErrorCode> {
    if buf.len() != EMPTY_MESSAGE_SIZE {
        return Err(ErrorCode::InvalidSize);
    }
    to_uint32(buf).ok_or(ErrorCode::InvalidInput)
}

pub fn parse_update_data(buf: &[u8]) -> Result<UpdateData, ErrorCode> {
    if buf.len() != UPDATE_DATA_SIZE {
        return Err(ErrorCode::InvalidSize);
    }

    let message_index = to_uint32(&buf[0..4]).ok_or(ErrorCode::InvalidInput)?;
    let address = to_uint32(&buf[4..8]).ok_or(ErrorCode::InvalidInput)?;
    let byte_count = buf[8];
    // buf[9] is reserved.

    if byte_count as usize > MAX_BYTE_COUNT {
        return Err(ErrorCode::InvalidByteCount);
    }

    let expected_checksum = compute_checksum(&buf[0..58]);
    let frame_checksum = to_uint16(&buf[58..60]).ok_or(ErrorCode::InvalidInput)?;
    if expected_checksum != frame_checksum {
        return Err(ErrorCode::BadChecksum);
    }

    let mut payload = [0u8; MAX_BYTE_COUNT];
    payload.copy_from_slice(&buf[10..58]);

    Ok(UpdateData {
        message_index,
        address,
        byte_count,
        payload,
    })
}

pub fn parse_update_complete(buf: &[u8]) -> Result<UpdateComplete, ErrorCode> {
    if buf.len() != UPDATE_COMPLETE_SIZE {
        return Err(ErrorCode::InvalidSize);
    }
    Ok(UpdateComplete {
        message_index: to_uint32(&buf[0..4]).ok_or(ErrorCode::InvalidInput)?,
        num_messages: to_uint32(&buf[4..8]).ok_or(ErrorCode::InvalidInput)?,
        expected_crc32: to_uint32(&buf[8..12]).ok_or(ErrorCode::InvalidInput)?,
    })
}

/// Walks a byte buffer (length ≤ `MAX_BYTE_COUNT`) as a sequence of
/// `(address, double_word)` pairs, 8 bytes per double word, starting at
/// `start_address` and advancing by 8 per word. Bytes are packed
/// little-endian within each word (buffer byte `8k+i` lands at bit
/// significance `i`, matching flash's natural byte order); the final
/// partial word is zero-padded in its high (most significant) bytes.
///
/// Returns `true` only if every callback invocation returned `true`.
pub fn dword_address_iter(
    start_address: u32,
    buffer: &[u8],
    mut callback: impl FnMut(u32, u64) -> bool,
) -> bool {
    let mut all_ok = true;
    let mut address = start_address;
    for chunk in buffer.chunks(8) {
        let mut word_bytes = [0u8; 8];
        word_bytes[..chunk.len()].copy_from_slice(chunk);
        let word = u64::from_le_bytes(word_bytes);
        all_ok &= callback(address, word);
        address = address.wrapping_add(8);
    }
    all_ok
}
