//! Launchpad launcher
//!
//! The user-facing half of the package system: the app menu, the installer
//! that copies package files into the store, and the boot entry point that
//! hands the selected package to the early-boot stage.

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod boot;
pub mod config;
pub mod installer;
pub mod menu;

#[cfg(test)]
mod testing;

pub use boot::{boot_package, BootTarget};
pub use config::LauncherConfig;
pub use installer::{InstallOutcome, Installer, PayloadHeap, StatusDisplay};
pub use menu::{InputEvent, InputQueue, InputSource, LauncherMenu, MenuState, TextSurface};

use embedded_storage::nor_flash::NorFlash;
use launchpad_core::PackageStore;

/// Route `log` records into the in-memory ring shown by the status screens.
pub fn init_logging(level: log::LevelFilter) {
    launchpad_core::logger::init(level);
    log::info!("[LAUNCHER] logging at {}", level);
}

/// Show the app menu until the user backs out. Starting an app reboots
/// through `target` and does not return.
pub fn menu_launcher<F, Q, S, T>(
    store: &PackageStore<F>,
    queue: &mut Q,
    surface: &mut S,
    target: &mut T,
    config: &LauncherConfig,
) where
    F: NorFlash,
    Q: InputQueue + ?Sized,
    S: TextSurface + ?Sized,
    T: BootTarget + ?Sized,
{
    let mut menu = LauncherMenu::build(store);
    menu.run(queue, surface, target, config);
}
