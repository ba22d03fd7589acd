// Flash medium: fault type shared by all NOR backends

pub mod emulated;

pub use emulated::EmulatedFlash;

use embedded_storage::nor_flash::{NorFlashError, NorFlashErrorKind};

/// Error reported by a flash backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashFault {
    /// Offset or length not aligned to the device's read/write/erase unit
    NotAligned,
    /// Access beyond the end of the device
    OutOfBounds,
    /// Program would have to set a bit that is currently cleared
    NotErased,
    /// The underlying device reported an I/O error
    Device,
}

impl core::fmt::Display for FlashFault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotAligned => write!(f, "Unaligned flash access"),
            Self::OutOfBounds => write!(f, "Flash access out of bounds"),
            Self::NotErased => write!(f, "Write to non-erased flash"),
            Self::Device => write!(f, "Flash device error"),
        }
    }
}

impl NorFlashError for FlashFault {
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            Self::NotAligned => NorFlashErrorKind::NotAligned,
            Self::OutOfBounds => NorFlashErrorKind::OutOfBounds,
            Self::NotErased | Self::Device => NorFlashErrorKind::Other,
        }
    }
}

impl From<NorFlashErrorKind> for FlashFault {
    fn from(kind: NorFlashErrorKind) -> Self {
        match kind {
            NorFlashErrorKind::NotAligned => Self::NotAligned,
            NorFlashErrorKind::OutOfBounds => Self::OutOfBounds,
            _ => Self::Device,
        }
    }
}
