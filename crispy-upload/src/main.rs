// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Firmware upload tool for crispy-bootloader nodes, over SocketCAN.
//!
//! Usage:
//!   crispy-upload --iface can0 --node gantry-x device-info
//!   crispy-upload --iface can0 --node gantry-x update firmware.bin
//!   crispy-upload --iface can0 --node gantry-x start-app

mod cli;
mod commands;
mod transport;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    cli::run(args)
}
