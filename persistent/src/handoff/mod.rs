//! Reboot handoff
//!
//! Commits a boot selection to the retained register and resets the chip
//! through a short deep-sleep/wake cycle. The sequence is strictly ordered:
//!
//! ```text
//! Idle ─request_*─▶ HandoffRequested ─▶ PersistRegister ─▶ RetainMemory
//!                                                              │
//!                          (never returns) Sleep ◀─ ArmTimer ◀─┘
//! ```
//!
//! The register write is verified by reading it back before the RTC slow
//! memory is pinned on and the wake timer armed; deep sleep is entered last.

use core::sync::atomic::{fence, Ordering};

use crate::register::{BootSelection, RetainedRegister};

/// Wake timer armed before deep sleep, in microseconds.
pub const WAKE_DELAY_US: u64 = 10;

/// Register writes attempted before falling back to a normal boot.
const PERSIST_ATTEMPTS: usize = 3;

/// Power management services used by the handoff.
pub trait SleepControl {
    /// Keep the RTC slow memory domain powered during deep sleep.
    fn retain_slow_memory(&mut self);

    /// Wake from deep sleep after `delay_us` microseconds.
    fn arm_timer_wakeup(&mut self, delay_us: u64);

    /// Enter deep sleep. Execution resumes at the reset vector.
    fn deep_sleep(&mut self) -> !;
}

/// Handoff progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffState {
    Idle,
    HandoffRequested(BootSelection),
    PersistRegister(BootSelection),
    RetainMemory,
    ArmTimer,
    Sleep,
}

impl HandoffState {
    /// Human-readable name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::HandoffRequested(_) => "Handoff requested",
            Self::PersistRegister(_) => "Writing boot selection",
            Self::RetainMemory => "Retaining RTC memory",
            Self::ArmTimer => "Arming wake timer",
            Self::Sleep => "Entering deep sleep",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sleep)
    }
}

/// Owns the boot-selection register and the sleep controller for one reboot.
pub struct RebootHandoff<R: RetainedRegister, S: SleepControl> {
    register: R,
    sleep: S,
    state: HandoffState,
}

impl<R: RetainedRegister, S: SleepControl> RebootHandoff<R, S> {
    pub fn new(register: R, sleep: S) -> Self {
        Self {
            register,
            sleep,
            state: HandoffState::Idle,
        }
    }

    pub fn state(&self) -> HandoffState {
        self.state
    }

    /// Request a boot into package `handle`. Out-of-range handles request a
    /// normal boot.
    pub fn request_boot(&mut self, handle: i32) -> BootSelection {
        let selection = BootSelection::for_handle(handle);
        self.state = HandoffState::HandoffRequested(selection);
        selection
    }

    pub fn request_normal_boot(&mut self) {
        self.state = HandoffState::HandoffRequested(BootSelection::Normal);
    }

    /// Selection that the next handoff will commit.
    pub fn pending(&self) -> Option<BootSelection> {
        match self.state {
            HandoffState::HandoffRequested(selection)
            | HandoffState::PersistRegister(selection) => Some(selection),
            _ => None,
        }
    }

    /// Commit the requested selection and reset through deep sleep.
    ///
    /// Without a prior request the device reboots normally.
    pub fn perform_handoff(&mut self) -> ! {
        let selection = self.pending().unwrap_or(BootSelection::Normal);
        log::info!("[HANDOFF] rebooting into {}", selection);

        self.enter(HandoffState::PersistRegister(selection));
        self.persist(selection);

        self.enter(HandoffState::RetainMemory);
        self.sleep.retain_slow_memory();

        self.enter(HandoffState::ArmTimer);
        self.sleep.arm_timer_wakeup(WAKE_DELAY_US);

        self.enter(HandoffState::Sleep);
        self.sleep.deep_sleep()
    }

    fn enter(&mut self, state: HandoffState) {
        log::debug!("[HANDOFF] {}", state.name());
        self.state = state;
    }

    fn persist(&mut self, selection: BootSelection) {
        let value = selection.encode();
        for attempt in 1..=PERSIST_ATTEMPTS {
            self.register.write(value);
            fence(Ordering::SeqCst);
            if self.register.read() == value {
                return;
            }
            log::warn!(
                "[HANDOFF] {} read-back mismatch (attempt {})",
                self.register.name(),
                attempt
            );
        }

        // A half-written value must not select a package
        log::error!("[HANDOFF] could not persist {}, booting normally", selection);
        self.register.write(BootSelection::Normal.encode());
        fence(Ordering::SeqCst);
    }

    pub fn register(&self) -> &R {
        &self.register
    }

    pub fn into_parts(self) -> (R, S) {
        (self.register, self.sleep)
    }
}
