//! Launchpad persistent state
//!
//! State that has to outlive the running launcher: the boot-selection word in
//! the RTC retained domain and the handoff that commits it and resets the chip
//! through a deep-sleep/wake cycle.
//!
//! ```text
//!   launcher                     early-boot stage (next reset)
//!   ────────                     ─────────────────────────────
//!   request_boot(h)
//!   perform_handoff() ──write──▶ RTC_STORE0 ──take_boot_selection()──▶ jump
//!        │                                     (decode, clear)
//!        └─ retain slow mem, arm 10µs timer, deep sleep
//! ```

#![no_std]

#[cfg(test)]
extern crate std;

pub mod arch;
pub mod handoff;
pub mod register;

pub use handoff::{HandoffState, RebootHandoff, SleepControl, WAKE_DELAY_US};
pub use register::{take_boot_selection, BootSelection, RetainedRegister, RetainedWord, BOOT_MARKER};
