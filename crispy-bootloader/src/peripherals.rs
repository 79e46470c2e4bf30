// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Peripheral bring-up for the STM32G4 bootloader: clocks, the identity
//! sensing pin/ADC, FDCAN1 and the independent watchdog.
//!
//! `FDCAN1_RX`/`FDCAN1_TX` live on `PA11`/`PA12` in alternate function 9,
//! matching the historical `HAL_FDCAN_MspInit` wiring.

use stm32g4xx_hal as hal;
use hal::prelude::*;
use hal::rcc::{Config, RccExt};
use hal::stm32;

pub type CanTxPin = hal::gpio::gpioa::PA12<hal::gpio::AF9>;
pub type CanRxPin = hal::gpio::gpioa::PA11<hal::gpio::AF9>;

pub struct Peripherals {
    pub can: stm32::FDCAN1,
    pub can_tx: CanTxPin,
    pub can_rx: CanRxPin,
    pub flash: stm32::FLASH,
    pub iwdg: stm32::IWDG,
    pub rcc: hal::rcc::Rcc,
    /// Analog tool-identity pin (ADC1_IN16 / PB1), present only on nodes
    /// built with a sensed-identity feature.
    pub identity_adc: Option<stm32::ADC1>,
    pub identity_pin: Option<hal::gpio::gpiob::PB1<hal::gpio::Analog>>,
}

/// Brings the system up on the internal oscillator, matching the historical
/// firmware's choice not to depend on an external crystal in bootloader
/// mode. `crispy-common::bitrate::derive_bit_timing` is computed against
/// whatever `sys_clk_hz` this returns.
pub fn init() -> Peripherals {
    let dp = unsafe { stm32::Peripherals::steal() };

    let mut rcc = dp.RCC.constrain();
    let gpioa = dp.GPIOA.split(&mut rcc);
    let gpiob = dp.GPIOB.split(&mut rcc);
    let rcc = rcc.freeze(Config::hsi());
    let identity_pin = gpiob.pb1.into_analog();
    let can_tx = gpioa.pa12.into_alternate();
    let can_rx = gpioa.pa11.into_alternate();

    Peripherals {
        can: dp.FDCAN1,
        can_tx,
        can_rx,
        flash: dp.FLASH,
        iwdg: dp.IWDG,
        rcc,
        identity_adc: Some(dp.ADC1),
        identity_pin: Some(identity_pin),
    }
}
