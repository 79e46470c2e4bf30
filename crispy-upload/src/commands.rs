// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations for bootloader operations, one per §4.5 message
//! pair plus the broadcast `device_info_request`.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use crc::{Crc, CRC_32_ISO_HDLC};
use indicatif::{ProgressBar, ProgressStyle};

use crispy_common::codec::{compute_checksum, to_uint16, to_uint32, write_uint16, write_uint32};
use crispy_common::{ErrorCode, MessageId, MAX_BYTE_COUNT, UPDATE_COMPLETE_SIZE, UPDATE_DATA_SIZE};

use crate::transport::{Transport, ERASE_TIMEOUT_MS};

static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

fn status_name(code: u16) -> &'static str {
    match code {
        0x0000 => "ok",
        0x0001 => "invalid_size",
        0x0002 => "bad_checksum",
        0x0003 => "invalid_byte_count",
        0x0004 => "invalid_input",
        0x0005 => "hardware",
        _ => "unknown",
    }
}

/// `device_info`: the bootloader's identity, version, build sha and board
/// revision letter pair.
pub fn device_info(transport: &mut Transport) -> Result<()> {
    let mut body = [0u8; 4];
    write_uint32(&mut body, 0);
    let response = transport.request(MessageId::DeviceInfoRequest, &body)?;
    let payload = response.payload();
    if payload.len() < 22 {
        bail!("device_info_response too short ({} bytes)", payload.len());
    }

    let version = to_uint32(&payload[4..8]).context("malformed version field")?;
    let flags = to_uint32(&payload[8..12]).context("malformed flags field")?;
    let sha = &payload[12..20];
    let revision_primary = payload[20] as char;
    let revision_secondary = payload[21] as char;

    println!("Device info for node 0x{:02x}:", transport.node().value());
    println!(
        "  Version:  {}.{}.{}",
        (version >> 16) & 0xff,
        (version >> 8) & 0xff,
        version & 0xff
    );
    println!("  Flags:    0x{flags:08x}");
    println!("  SHA:      {}", String::from_utf8_lossy(sha));
    println!("  Revision: {revision_primary}{revision_secondary}");
    Ok(())
}

/// `fw_update_status_request` / `fw_update_status_response`.
pub fn status(transport: &mut Transport) -> Result<()> {
    let mut body = [0u8; 4];
    write_uint32(&mut body, 0);
    let response = transport.request(MessageId::FwUpdateStatusRequest, &body)?;
    let flags = to_uint32(response.payload().get(4..8).unwrap_or(&[])).unwrap_or(0);
    println!("Status flags: 0x{flags:08x}");
    Ok(())
}

/// `fw_update_erase_app`: erase the application region. The bootloader does
/// not respond until the (possibly interrupt-driven) erase finishes.
pub fn erase(transport: &mut Transport) -> Result<()> {
    print!("Erasing application flash... ");
    let mut body = [0u8; 4];
    write_uint32(&mut body, 0);
    let response =
        transport.request_with_timeout(MessageId::FwUpdateEraseApp, &body, ERASE_TIMEOUT_MS)?;
    let status = to_uint16(response.payload().get(4..6).unwrap_or(&[])).unwrap_or(0xffff);
    if status == ErrorCode::Ok.value() {
        println!("ok");
        Ok(())
    } else {
        println!("failed ({})", status_name(status));
        bail!("erase failed: {}", status_name(status));
    }
}

/// `fw_update_start_app`: one-way trigger, no response expected (§4.5:
/// "everything else ... returns ok with no response").
pub fn start_app(transport: &mut Transport) -> Result<()> {
    let mut body = [0u8; 4];
    write_uint32(&mut body, 0);
    transport.send_start_app(&body)?;
    println!("Sent fw_update_start_app to node 0x{:02x}.", transport.node().value());
    Ok(())
}

/// `fw_update_initiate` → erase → `fw_update_data` (chunked at
/// `MAX_BYTE_COUNT`) → `fw_update_complete`, in the order §4.4 requires.
pub fn update(transport: &mut Transport, file: &Path, base_address: u32) -> Result<()> {
    let firmware = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let crc32 = CRC32.checksum(&firmware);
    println!(
        "Firmware: {} ({} bytes, CRC32: 0x{:08x})",
        file.display(),
        firmware.len(),
        crc32
    );

    print!("Initiating update session... ");
    let mut initiate_body = [0u8; 4];
    write_uint32(&mut initiate_body, 0);
    transport.request(MessageId::FwUpdateInitiate, &initiate_body)?;
    println!("ok");

    erase(transport)?;

    let pb = ProgressBar::new(firmware.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
            .progress_chars("#>-"),
    );

    let mut message_index = 0u32;
    let mut address = base_address;
    for chunk in firmware.chunks(MAX_BYTE_COUNT) {
        let mut body = [0u8; UPDATE_DATA_SIZE];
        write_uint32(&mut body[0..4], message_index);
        write_uint32(&mut body[4..8], address);
        body[8] = chunk.len() as u8;
        body[10..10 + chunk.len()].copy_from_slice(chunk);
        let checksum = compute_checksum(&body[0..58]);
        write_uint16(&mut body[58..60], checksum);

        let response = transport.request(MessageId::FwUpdateData, &body)?;
        let ack_status = to_uint16(response.payload().get(8..10).unwrap_or(&[])).unwrap_or(0xffff);
        if ack_status != ErrorCode::Ok.value() {
            pb.abandon();
            bail!(
                "fw_update_data failed at index {message_index} (address 0x{address:08x}): {}",
                status_name(ack_status)
            );
        }

        message_index += 1;
        address += chunk.len() as u32;
        pb.set_position(address.saturating_sub(base_address) as u64);
    }
    pb.finish_with_message("upload complete");

    print!("Finalizing... ");
    let mut complete_body = [0u8; UPDATE_COMPLETE_SIZE];
    write_uint32(&mut complete_body[0..4], message_index);
    write_uint32(&mut complete_body[4..8], message_index);
    write_uint32(&mut complete_body[8..12], crc32);
    let response = transport.request(MessageId::FwUpdateComplete, &complete_body)?;
    let status = to_uint16(response.payload().get(4..6).unwrap_or(&[])).unwrap_or(0xffff);
    if status == ErrorCode::Ok.value() {
        println!("ok");
        println!();
        println!("Firmware uploaded successfully.");
        println!("Use 'crispy-upload --node <node> start-app' to hand off to the application.");
        Ok(())
    } else {
        println!("failed ({})", status_name(status));
        bail!("fw_update_complete failed: {}", status_name(status));
    }
}
