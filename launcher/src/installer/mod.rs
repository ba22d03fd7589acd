//! Package installer
//!
//! Copies a package file into the store:
//!
//! ```text
//! open ─▶ load to RAM ─▶ create record ─▶ erase region ─▶ write ─▶ mark installed
//! ```
//!
//! Each step that fails stops the install with its own outcome and status
//! line. A record whose payload write did not complete stays flagged as not
//! installed and is never offered by the menu; installing again under the
//! same name replaces it.

pub mod buffer;
pub mod source;

pub use buffer::{PayloadBuffer, PayloadHeap};
pub use source::{load_to_ram, LoadError, PackageFile, PackageSource};

use embedded_storage::nor_flash::NorFlash;
use launchpad_core::{Handle, PackageStore, StoreError};

use crate::menu::{MenuRenderer, TextSurface};

pub const MSG_INSTALLING: &str = "Installing app...";
pub const MSG_OPEN_FAILED: &str = "Failed to open file";
pub const MSG_LOAD_FAILED: &str = "Failed to load app to RAM";
pub const MSG_CREATE_FAILED: &str = "Failed to create file";
pub const MSG_ERASE_FAILED: &str = "Failed to erase file";
pub const MSG_WRITE_FAILED: &str = "Failed to write file";
pub const MSG_INSTALLED: &str = "App installed!";

/// Shows install progress to the user.
pub trait StatusDisplay {
    fn show(&mut self, message: &str);

    /// Keep the current message up for `ms` milliseconds.
    fn hold(&mut self, ms: u32);
}

/// Status screen on a text surface, with a caller-supplied delay.
pub struct SurfaceStatus<'a, S: TextSurface + ?Sized, D: FnMut(u32)> {
    pub surface: &'a mut S,
    pub delay_ms: D,
}

impl<S: TextSurface + ?Sized, D: FnMut(u32)> StatusDisplay for SurfaceStatus<'_, S, D> {
    fn show(&mut self, message: &str) {
        MenuRenderer::render_status(&mut *self.surface, message);
    }

    fn hold(&mut self, ms: u32) {
        (self.delay_ms)(ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed(Handle),
    OpenFailed,
    LoadFailed(LoadError),
    CreateFailed(StoreError),
    EraseFailed(StoreError),
    WriteFailed(StoreError),
}

impl InstallOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Installed(_) => MSG_INSTALLED,
            Self::OpenFailed => MSG_OPEN_FAILED,
            Self::LoadFailed(_) => MSG_LOAD_FAILED,
            Self::CreateFailed(_) => MSG_CREATE_FAILED,
            Self::EraseFailed(_) => MSG_ERASE_FAILED,
            Self::WriteFailed(_) => MSG_WRITE_FAILED,
        }
    }

    pub fn is_installed(&self) -> bool {
        matches!(self, Self::Installed(_))
    }
}

pub struct Installer<'h> {
    heap: &'h PayloadHeap,
    status_hold_ms: u32,
}

impl<'h> Installer<'h> {
    pub fn new(heap: &'h PayloadHeap, status_hold_ms: u32) -> Self {
        Self {
            heap,
            status_hold_ms,
        }
    }

    /// Install the file at `path` as package `name`, replacing any package
    /// with that name.
    #[allow(clippy::too_many_arguments)]
    pub fn store_app_from_file<F, P, D>(
        &self,
        store: &mut PackageStore<F>,
        source: &mut P,
        display: &mut D,
        path: &str,
        name: &str,
        title: &str,
        version: u16,
    ) -> InstallOutcome
    where
        F: NorFlash,
        P: PackageSource + ?Sized,
        D: StatusDisplay + ?Sized,
    {
        display.show(MSG_INSTALLING);

        let outcome = self.install(store, source, path, name, title, version);
        match outcome {
            InstallOutcome::Installed(handle) => {
                log::info!("[INSTALL] '{}' installed as {}", name, handle)
            }
            InstallOutcome::OpenFailed => log::error!("[INSTALL] cannot open {}", path),
            InstallOutcome::LoadFailed(e) => log::error!("[INSTALL] load of {} failed: {}", path, e),
            InstallOutcome::CreateFailed(e)
            | InstallOutcome::EraseFailed(e)
            | InstallOutcome::WriteFailed(e) => {
                log::error!("[INSTALL] {} ({})", outcome.message(), e)
            }
        }

        display.show(outcome.message());
        display.hold(self.status_hold_ms);
        outcome
    }

    fn install<F, P>(
        &self,
        store: &mut PackageStore<F>,
        source: &mut P,
        path: &str,
        name: &str,
        title: &str,
        version: u16,
    ) -> InstallOutcome
    where
        F: NorFlash,
        P: PackageSource + ?Sized,
    {
        let Some(mut file) = source.open(path) else {
            return InstallOutcome::OpenFailed;
        };

        // The buffer is freed on every return path below
        let payload = match load_to_ram(&mut file, self.heap) {
            Ok(payload) => payload,
            Err(e) => return InstallOutcome::LoadFailed(e),
        };
        let Ok(size) = u32::try_from(payload.len()) else {
            return InstallOutcome::LoadFailed(LoadError::PayloadTooLarge);
        };

        let handle = match store.create(name, title, version, size) {
            Ok(handle) => handle,
            Err(e) => return InstallOutcome::CreateFailed(e),
        };

        let erase = store
            .payload_capacity(handle)
            .and_then(|capacity| store.erase_payload(handle, 0, capacity));
        if let Err(e) = erase {
            return InstallOutcome::EraseFailed(e);
        }

        if let Err(e) = store.write_payload(handle, 0, &payload) {
            return InstallOutcome::WriteFailed(e);
        }
        if let Err(e) = store.mark_installed(handle) {
            return InstallOutcome::WriteFailed(e);
        }
        InstallOutcome::Installed(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::LauncherMenu;
    use crate::testing::{
        faulty_store_on, payload_heap, store_on, Fault, GridSurface, MemorySource, StatusLog,
    };
    use embedded_storage::nor_flash::NorFlashErrorKind;
    use std::vec;
    use std::vec::Vec;

    const PATH: &str = "/sd/apps/app.bin";

    fn names<F: NorFlash>(store: &PackageStore<F>) -> Vec<std::string::String> {
        store.enumerate().map(|p| p.name.into()).collect()
    }

    #[test]
    fn test_install_reports_progress() {
        let mut image = vec![0xFF; 16 * 4096];
        let mut store = store_on(&mut image);
        let heap = payload_heap(16 * 1024);
        let mut source = MemorySource::with_file(PATH, &[0x5A; 5000]);
        let mut display = StatusLog::default();

        let outcome = Installer::new(&heap, 100).store_app_from_file(
            &mut store, &mut source, &mut display, PATH, "app", "App", 3,
        );
        let InstallOutcome::Installed(handle) = outcome else {
            panic!("{:?}", outcome);
        };
        assert_eq!(display.messages, [MSG_INSTALLING, MSG_INSTALLED]);
        assert_eq!(display.holds, [100]);

        let info = store.read_metadata(handle).unwrap();
        assert_eq!((info.name, info.title, info.version, info.size), ("app", "App", 3, 5000));
        assert!(info.installed);

        let mut back = vec![0u8; 5000];
        store.read_payload(handle, 0, &mut back).unwrap();
        assert!(back.iter().all(|b| *b == 0x5A));
        // Install buffer returned
        assert_eq!(heap.free(), heap.size());
    }

    #[test]
    fn test_missing_file() {
        let mut image = vec![0xFF; 16 * 4096];
        let mut store = store_on(&mut image);
        let heap = payload_heap(4096);
        let mut source = MemorySource::default();
        let mut display = StatusLog::default();

        let outcome = Installer::new(&heap, 100).store_app_from_file(
            &mut store, &mut source, &mut display, PATH, "app", "App", 1,
        );
        assert_eq!(outcome, InstallOutcome::OpenFailed);
        assert_eq!(display.messages, [MSG_INSTALLING, MSG_OPEN_FAILED]);
        assert!(store.is_empty());
    }

    #[test]
    fn test_payload_too_large_for_ram_writes_nothing() {
        let mut image = vec![0xFF; 16 * 4096];
        let mut store = store_on(&mut image);
        let heap = payload_heap(1024);
        let mut source = MemorySource::with_file(PATH, &[1; 4096]);
        let mut display = StatusLog::default();

        let outcome = Installer::new(&heap, 100).store_app_from_file(
            &mut store, &mut source, &mut display, PATH, "app", "App", 1,
        );
        assert_eq!(outcome, InstallOutcome::LoadFailed(LoadError::PayloadTooLarge));
        assert_eq!(display.last(), Some(MSG_LOAD_FAILED));
        assert!(store.is_empty());
    }

    #[test]
    fn test_payload_larger_than_flash() {
        let mut image = vec![0xFF; 8 * 4096];
        let mut store = store_on(&mut image);
        let heap = payload_heap(64 * 1024);
        let mut display = StatusLog::default();

        let mut source = MemorySource::with_file(PATH, &[1; 100]);
        Installer::new(&heap, 0).store_app_from_file(
            &mut store, &mut source, &mut display, PATH, "small", "", 1,
        );
        let before = names(&store);

        let big = vec![2u8; store.free_space() as usize + 1];
        let mut source = MemorySource::with_file(PATH, &big);
        let outcome = Installer::new(&heap, 0).store_app_from_file(
            &mut store, &mut source, &mut display, PATH, "big", "", 1,
        );
        assert!(matches!(
            outcome,
            InstallOutcome::CreateFailed(StoreError::AllocationFailed(_))
        ));
        assert_eq!(display.last(), Some(MSG_CREATE_FAILED));
        assert_eq!(names(&store), before);
    }

    #[test]
    fn test_reinstall_replaces_package() {
        let mut image = vec![0xFF; 16 * 4096];
        let mut store = store_on(&mut image);
        let heap = payload_heap(16 * 1024);
        let mut display = StatusLog::default();
        let installer = Installer::new(&heap, 0);

        let mut v1 = MemorySource::with_file(PATH, &[1; 3000]);
        let first = installer.store_app_from_file(&mut store, &mut v1, &mut display, PATH, "app", "App", 1);
        let mut v2 = MemorySource::with_file(PATH, &[2; 9000]);
        let second = installer.store_app_from_file(&mut store, &mut v2, &mut display, PATH, "app", "App 2", 2);

        assert!(first.is_installed() && second.is_installed());
        assert_eq!(first, second);
        assert_eq!(names(&store), ["app"]);
        let InstallOutcome::Installed(handle) = second else { unreachable!() };
        let info = store.read_metadata(handle).unwrap();
        assert_eq!((info.title, info.version, info.size), ("App 2", 2, 9000));
    }

    /// Install under `fault`, check the partial record, then reinstall cleanly.
    fn fail_then_recover(fault: Fault, expected: InstallOutcome, message: &str) {
        let mut image = vec![0xFF; 16 * 4096];
        let (mut store, switch) = faulty_store_on(&mut image);
        let heap = payload_heap(16 * 1024);
        let installer = Installer::new(&heap, 0);
        let mut display = StatusLog::default();

        switch.set(fault);
        let mut source = MemorySource::with_file(PATH, &[0x33; 6000]);
        let outcome = installer.store_app_from_file(
            &mut store, &mut source, &mut display, PATH, "app", "App", 1,
        );
        assert_eq!(outcome, expected);
        assert!(!outcome.is_installed());
        assert_eq!(display.last(), Some(message));
        assert_eq!(heap.free(), heap.size());

        // Record stays, flagged incomplete, and the menu skips it
        let partial = store.find("app").unwrap();
        assert!(!store.read_metadata(partial).unwrap().installed);
        assert!(LauncherMenu::build(&store).entries().is_empty());

        switch.set(Fault::None);
        let mut source = MemorySource::with_file(PATH, &[0x44; 7000]);
        let outcome = installer.store_app_from_file(
            &mut store, &mut source, &mut display, PATH, "app", "App", 2,
        );
        assert_eq!(outcome, InstallOutcome::Installed(partial));
        assert_eq!(names(&store), ["app"]);

        let menu = LauncherMenu::build(&store);
        assert_eq!(menu.entries().len(), 1);
        assert_eq!(menu.entries()[0].handle, partial);

        let mut back = vec![0u8; 7000];
        store.read_payload(partial, 0, &mut back).unwrap();
        assert!(back.iter().all(|b| *b == 0x44));
    }

    #[test]
    fn test_erase_failure_leaves_hidden_partial() {
        fail_then_recover(
            Fault::PayloadErase,
            InstallOutcome::EraseFailed(StoreError::FlashFault(NorFlashErrorKind::Other)),
            MSG_ERASE_FAILED,
        );
    }

    #[test]
    fn test_write_failure_leaves_hidden_partial() {
        fail_then_recover(
            Fault::PayloadWrite,
            InstallOutcome::WriteFailed(StoreError::FlashFault(NorFlashErrorKind::Other)),
            MSG_WRITE_FAILED,
        );
    }

    #[test]
    fn test_failed_installed_flag_commit_is_a_write_failure() {
        fail_then_recover(
            Fault::CommitAfterPayload,
            InstallOutcome::WriteFailed(StoreError::FlashFault(NorFlashErrorKind::Other)),
            MSG_WRITE_FAILED,
        );
    }

    #[test]
    fn test_surface_status_draws_and_waits() {
        let mut surface = GridSurface::new(60, 10);
        let mut waited = Vec::new();
        {
            let mut status = SurfaceStatus {
                surface: &mut surface,
                delay_ms: |ms: u32| waited.push(ms),
            };
            status.show(MSG_INSTALLED);
            status.hold(100);
        }
        assert!(surface.text().contains(MSG_INSTALLED));
        assert_eq!(waited, [100]);
    }
}
