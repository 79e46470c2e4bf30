// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Per-node identity resolution (C2), selected at build configuration time
//! by exactly one `node-*` feature, mirroring the historical firmware's
//! `#if defined node_id_pipette` / `#elif defined node_id_head` chain in
//! `bootloader/firmware/node_id.c`.

use crispy_common::identity::resolve_pipette_identity_from_reading;
use crispy_common::NodeId;

use crate::peripherals::Peripherals;

/// Resolves this node's bootloader identity. Computed at most once per boot
/// (§4.2: "Identity is computed at most once per boot and cached") — the
/// caller is expected to store the result rather than calling this more
/// than once.
pub fn resolve(p: &mut Peripherals) -> NodeId {
    #[cfg(feature = "node-gantry-x")]
    return NodeId::GantryXBootloader;

    #[cfg(feature = "node-gantry-y")]
    return NodeId::GantryYBootloader;

    #[cfg(feature = "node-head")]
    return NodeId::HeadBootloader;

    #[cfg(feature = "node-gripper")]
    return NodeId::GripperBootloader;

    #[cfg(feature = "node-pipette-left")]
    return NodeId::PipetteLeftBootloader;

    #[cfg(feature = "node-pipette-right")]
    return NodeId::PipetteRightBootloader;

    #[cfg(feature = "node-pipette-sensed")]
    {
        let reading_mv = read_identity_mv(p);
        return resolve_pipette_identity_from_reading(reading_mv);
    }

    #[cfg(not(any(
        feature = "node-gantry-x",
        feature = "node-gantry-y",
        feature = "node-head",
        feature = "node-gripper",
        feature = "node-pipette-left",
        feature = "node-pipette-right",
        feature = "node-pipette-sensed",
    )))]
    compile_error!("exactly one node-* feature must be enabled, matching the historical #error \"No node id\"");
}

#[cfg(feature = "node-pipette-sensed")]
fn read_identity_mv(p: &mut Peripherals) -> u16 {
    use stm32g4xx_hal::adc::{config::SampleTime, Adc};

    let Some(adc_pac) = p.identity_adc.take() else {
        return 0;
    };
    let Some(pin) = p.identity_pin.take() else {
        return 0;
    };

    let mut adc = Adc::adc1(adc_pac, Default::default(), &p.rcc.clocks);
    let raw: u16 = adc.convert(&pin, SampleTime::Cycles_640_5);
    ((raw as u32 * 3300) / 4095) as u16
}
