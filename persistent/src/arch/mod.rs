//! Target-specific retained register backends

pub mod esp32;

pub use esp32::RtcStoreRegister;
