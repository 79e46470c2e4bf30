// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! `crispy_common::flash::FlashHal` for the STM32G4/L5 family: double-word
//! programming and interrupt-driven single/dual-bank erase (§4.4).
//!
//! `crispy_common::flash` already says this is where the concrete
//! implementation lives; this module is the promised counterpart.
//!
//! The erase completion/error callbacks (`HAL_FLASH_EndOfOperationCallback`
//! / `HAL_FLASH_OperationErrorCallback` in the historical firmware) run in
//! the `FLASH` interrupt, which cannot hold the update loop's `&mut
//! UpdateState`. They instead write a module-level atomic, which
//! [`sync_erase_state`] folds into the owned `UpdateState` once per loop
//! iteration — the same pattern the historical ISR/foreground split uses,
//! translated to an explicit value instead of a process-wide singleton.

use core::ops::Range;
use core::sync::atomic::{AtomicU8, Ordering};

use stm32g4xx_hal::stm32::FLASH;

use crispy_common::flash::FlashHal;
use crispy_common::update_state::{EraseState, UpdateState};

const ERASE_IDLE: u8 = 0;
const ERASE_RUNNING: u8 = 1;
const ERASE_DONE: u8 = 2;
const ERASE_ERROR: u8 = 3;

static ERASE_STATE: AtomicU8 = AtomicU8::new(ERASE_IDLE);

/// Whether this part has a second flash bank. Dual-bank G4/L5 variants
/// erase bank 1's application pages first, then all of bank 2 (§4.4 step 2);
/// single-bank variants erase straight to the end of flash.
#[cfg(feature = "dual-bank")]
const DUAL_BANK: bool = true;
#[cfg(not(feature = "dual-bank"))]
const DUAL_BANK: bool = false;

const FLASH_KEY1: u32 = 0x4567_0123;
const FLASH_KEY2: u32 = 0xCDEF_89AB;

pub struct Stm32FlashHal {
    flash: FLASH,
    app_region: Range<u32>,
}

impl Stm32FlashHal {
    pub fn new(flash: FLASH, app_region: Range<u32>) -> Self {
        Self { flash, app_region }
    }
}

impl FlashHal for Stm32FlashHal {
    fn app_region(&self) -> Range<u32> {
        self.app_region.clone()
    }

    fn unlock(&mut self) {
        if self.flash.cr.read().lock().bit_is_set() {
            self.flash.keyr.write(|w| unsafe { w.bits(FLASH_KEY1) });
            self.flash.keyr.write(|w| unsafe { w.bits(FLASH_KEY2) });
        }
    }

    fn lock(&mut self) {
        self.flash.cr.modify(|_, w| w.lock().set_bit());
    }

    fn program_double_word(&mut self, address: u32, word: u64) -> bool {
        while self.flash.sr.read().bsy().bit_is_set() {}

        self.flash.cr.modify(|_, w| w.pg().set_bit());

        let lo = word as u32;
        let hi = (word >> 32) as u32;
        unsafe {
            (address as *mut u32).write_volatile(lo);
            ((address + 4) as *mut u32).write_volatile(hi);
        }

        while self.flash.sr.read().bsy().bit_is_set() {}
        let sr = self.flash.sr.read();
        self.flash.cr.modify(|_, w| w.pg().clear_bit());

        let failed = sr.pgserr().bit_is_set()
            || sr.pgaerr().bit_is_set()
            || sr.wrperr().bit_is_set()
            || sr.progerr().bit_is_set();
        !failed
    }

    fn start_erase(&mut self) {
        ERASE_STATE.store(ERASE_RUNNING, Ordering::SeqCst);

        let page = first_app_page(&self.app_region);
        self.flash.cr.modify(|_, w| {
            w.per().set_bit();
            w.bker().bit(DUAL_BANK && page_in_bank2(&self.app_region));
            unsafe { w.pnb().bits(page) }
        });
        self.flash.cr.modify(|_, w| w.eopie().set_bit().errie().set_bit());
        self.flash.cr.modify(|_, w| w.start().set_bit());
    }
}

const PAGE_SIZE: u32 = 2048;
const FLASH_BASE: u32 = 0x0800_0000;
const BANK1_SIZE: u32 = 0x0004_0000;

fn first_app_page(app_region: &Range<u32>) -> u8 {
    let offset = (app_region.start - FLASH_BASE) % BANK1_SIZE;
    (offset / PAGE_SIZE) as u8
}

fn page_in_bank2(app_region: &Range<u32>) -> bool {
    app_region.start - FLASH_BASE >= BANK1_SIZE
}

/// Folds the ISR-observed erase outcome into the update loop's owned
/// `UpdateState`. Call once per loop iteration, the same cadence the update
/// loop already kicks the watchdog at.
pub fn sync_erase_state(state: &mut UpdateState) {
    let observed = match ERASE_STATE.load(Ordering::SeqCst) {
        ERASE_DONE => EraseState::Done,
        ERASE_ERROR => EraseState::Error,
        ERASE_RUNNING => EraseState::Running,
        _ => EraseState::Idle,
    };
    state.set_erase_state(observed);
}

/// `FLASH` global interrupt handler: the end-of-operation/error callback
/// pair from the historical firmware, collapsed into the two outcomes the
/// atomic can hold.
#[cortex_m_rt::interrupt]
fn FLASH() {
    let flash = unsafe { &*stm32g4xx_hal::stm32::FLASH::ptr() };
    let sr = flash.sr.read();

    if sr.eop().bit_is_set() {
        flash.sr.modify(|_, w| w.eop().set_bit());
        ERASE_STATE.store(ERASE_DONE, Ordering::SeqCst);
    }
    if sr.operr().bit_is_set() || sr.wrperr().bit_is_set() || sr.pgaerr().bit_is_set() {
        ERASE_STATE.store(ERASE_ERROR, Ordering::SeqCst);
    }

    crate::watchdog::kick_from_isr();
}
