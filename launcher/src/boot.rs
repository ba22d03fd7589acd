//! Boot entry point
//!
//! Selecting a package never jumps into it directly: the launcher records
//! the handle in the retained register and resets, and the early-boot stage
//! maps the package before anything else is initialised.

use launchpad_core::Handle;
use launchpad_persistent::{RebootHandoff, RetainedRegister, SleepControl};

/// Something that can reboot the device into a package.
pub trait BootTarget {
    fn boot(&mut self, handle: Handle) -> !;
}

impl<R: RetainedRegister, S: SleepControl> BootTarget for RebootHandoff<R, S> {
    fn boot(&mut self, handle: Handle) -> ! {
        self.request_boot(i32::from(handle.index()));
        self.perform_handoff()
    }
}

/// Reboot into the package with `handle`.
pub fn boot_package<T: BootTarget + ?Sized>(target: &mut T, handle: Handle) -> ! {
    log::info!("[BOOT] starting package {}", handle);
    target.boot(handle)
}
