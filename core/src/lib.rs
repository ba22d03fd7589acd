//! Launchpad core: the flash-resident package store.
//!
//! Packages live in a dedicated flash partition laid out as two metadata
//! table slots followed by erase-block aligned payload regions:
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────────────────────────────┐
//! │ table slot A │ table slot B │ data blocks (package regions)    │
//! └──────────────┴──────────────┴──────────────────────────────────┘
//! ```
//!
//! The store is generic over [`embedded_storage::nor_flash::NorFlash`], so the
//! same code runs against the SPI flash driver on the device and against
//! [`flash::EmulatedFlash`] on the host.

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod config;
pub mod flash;
pub mod logger;
pub mod store;

pub use config::StoreConfig;
pub use store::{Handle, PackageInfo, PackageStore, Region, StoreError};
