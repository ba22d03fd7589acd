// Package file sources (SD card, network download staging)

use super::buffer::{PayloadBuffer, PayloadHeap};

/// Why a package could not be loaded into RAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadError {
    /// Payload does not fit the install heap
    PayloadTooLarge,
    /// The source reported an I/O error
    ReadFailed,
    /// Fewer bytes than the file size announced
    Truncated,
}

impl core::fmt::Display for LoadError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::PayloadTooLarge => write!(f, "Payload too large"),
            Self::ReadFailed => write!(f, "Read failed"),
            Self::Truncated => write!(f, "File truncated"),
        }
    }
}

/// An open package file.
pub trait PackageFile {
    /// Size in bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the next chunk into `buf`; `Ok(0)` at end of file.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LoadError>;
}

/// Opens package files by path.
pub trait PackageSource {
    type File: PackageFile;

    fn open(&mut self, path: &str) -> Option<Self::File>;
}

/// Read a whole file into a buffer from `heap`.
pub fn load_to_ram<'h, P: PackageFile + ?Sized>(
    file: &mut P,
    heap: &'h PayloadHeap,
) -> Result<PayloadBuffer<'h>, LoadError> {
    let len = file.len();
    let mut buffer = heap.allocate(len).ok_or(LoadError::PayloadTooLarge)?;

    let mut filled = 0;
    while filled < len {
        let n = file.read(&mut buffer[filled..])?;
        if n == 0 {
            return Err(LoadError::Truncated);
        }
        filled += n;
    }
    Ok(buffer)
}
