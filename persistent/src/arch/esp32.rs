//! ESP32 RTC store register
//!
//! `RTC_CNTL_STORE0_REG` lives in the RTC domain: it keeps its value through
//! a digital-core reset and deep sleep, and is lost on power-down. The ROM
//! and the early-boot stage read it before anything else touches the RTC
//! controller.

use core::sync::atomic::{fence, Ordering};

use crate::register::RetainedRegister;

/// RTC controller base (DPORT view).
pub const RTC_CNTL_BASE: usize = 0x3FF4_8000;
/// First general purpose retention register.
pub const RTC_CNTL_STORE0_REG: usize = RTC_CNTL_BASE + 0x4C;

pub struct RtcStoreRegister {
    addr: *mut u32,
}

impl RtcStoreRegister {
    /// The `RTC_CNTL_STORE0_REG` register.
    ///
    /// # Safety
    /// Must only be called on an ESP32, by the single owner of the register.
    pub unsafe fn store0() -> Self {
        Self::at(RTC_CNTL_STORE0_REG as *mut u32)
    }

    /// A register at an arbitrary address.
    ///
    /// # Safety
    /// `addr` must be valid for volatile 32-bit reads and writes for the
    /// lifetime of the returned value.
    pub unsafe fn at(addr: *mut u32) -> Self {
        Self { addr }
    }
}

impl RetainedRegister for RtcStoreRegister {
    fn read(&self) -> u32 {
        unsafe { core::ptr::read_volatile(self.addr) }
    }

    fn write(&mut self, value: u32) {
        unsafe { core::ptr::write_volatile(self.addr, value) };
        fence(Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "RTC_CNTL_STORE0"
    }
}
