// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Shared, hardware-independent core of the CAN bootloader: wire codec,
//! identity resolution, update-state store, flash writer and message
//! dispatcher. `no_std` by default; the `std` feature is for host tooling
//! and for running this crate's own test suite.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod bitrate;
pub mod boot;
pub mod can;
pub mod codec;
pub mod dispatch;
pub mod flash;
#[cfg(feature = "embedded")]
pub mod handoff;
pub mod identity;
pub mod ids;
pub mod message;
pub mod update_loop;
pub mod update_state;

pub use codec::{MAX_BYTE_COUNT, UPDATE_COMPLETE_SIZE, UPDATE_DATA_SIZE};
pub use ids::{ArbitrationId, ErrorCode, FunctionCode, MessageId, NodeId, ToolType};
pub use message::Message;
