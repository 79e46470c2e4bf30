// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;
use crate::transport::{parse_node, Transport};

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "crispy-upload")]
#[command(about = "Firmware upload tool for crispy-bootloader nodes over SocketCAN")]
pub struct Cli {
    /// SocketCAN interface (e.g. can0, vcan0)
    #[arg(short, long, default_value = "can0")]
    pub iface: String,

    /// Target node: gantry-x, gantry-y, head, gripper, pipette-left, pipette-right
    #[arg(short, long)]
    pub node: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Query the node's bootloader identity (`device_info_request`)
    DeviceInfo,

    /// Query the current update-session status flags
    Status,

    /// Erase the application flash region without uploading new firmware
    EraseApp,

    /// Run a full update session: initiate, erase, upload, complete
    Update {
        /// Firmware binary file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// First flash address to program, as hex (e.g. 0x08010000)
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0x08010000")]
        base_address: u32,
    },

    /// Request the bootloader hand off to the resident application
    StartApp,
}

fn parse_hex_u32(s: &str) -> Result<u32, String> {
    let s = s.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(s, 16).map_err(|e| e.to_string())
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    let node = parse_node(&cli.node)?;
    let mut transport = Transport::new(&cli.iface, node)?;

    match cli.command {
        Commands::DeviceInfo => commands::device_info(&mut transport),
        Commands::Status => commands::status(&mut transport),
        Commands::EraseApp => commands::erase(&mut transport),
        Commands::Update { file, base_address } => commands::update(&mut transport, &file, base_address),
        Commands::StartApp => commands::start_app(&mut transport),
    }
}
