//! NOR flash emulation on top of a block device.
//!
//! This module provides an `embedded_storage::nor_flash::NorFlash`
//! implementation that wraps any `gpt_disk_io::BlockIo`. It lets the package
//! store run against a partition image on the host (a dumped flash partition,
//! or a plain byte slice in tests) with the same rules the SPI flash enforces.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │            PackageStore                │
//! │        (uses NorFlash trait)           │
//! └───────────────────┬────────────────────┘
//!                     │ embedded_storage::nor_flash::NorFlash
//!                     ▼
//! ┌────────────────────────────────────────┐
//! │        EmulatedFlash (this)            │
//! │  erase = 0xFF fill, program = clear    │
//! └───────────────────┬────────────────────┘
//!                     │ gpt_disk_io::BlockIo
//!                     ▼
//! ┌────────────────────────────────────────┐
//! │   BlockIoAdapter / disk image / ...    │
//! └────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let mut image = vec![0xFF; 1024 * 1024];
//! let flash = EmulatedFlash::new(BlockIoAdapter::new(image.as_mut_slice(), BlockSize::BS_512))?;
//! let store = PackageStore::mount(flash, StoreConfig::new(4096, 16))?;
//! ```

use alloc::vec;
use alloc::vec::Vec;
use embedded_storage::nor_flash::{
    check_erase, check_read, check_write, ErrorType, NorFlash, ReadNorFlash,
};
use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;

use super::FlashFault;

/// Sector size of the emulated part (the SPI flash erase sector).
pub const EMULATED_ERASE_SIZE: usize = 4096;

/// Value every byte holds after an erase.
pub const ERASED_BYTE: u8 = 0xFF;

/// NOR flash emulated over a block device.
pub struct EmulatedFlash<B: BlockIo> {
    /// Backing block device
    block_io: B,
    /// Device block size in bytes
    block_size: usize,
    /// Usable size, truncated to whole erase sectors
    capacity: usize,
    /// One device block, reused for read-modify-write
    scratch: Vec<u8>,
}

impl<B: BlockIo> EmulatedFlash<B> {
    /// Wrap a block device.
    ///
    /// The device block size must divide the emulated erase size. The
    /// contents are taken as-is; a blank image should be filled with
    /// [`ERASED_BYTE`].
    pub fn new(mut block_io: B) -> Result<Self, FlashFault> {
        let block_size = block_io.block_size().to_u64() as usize;
        if block_size == 0 || EMULATED_ERASE_SIZE % block_size != 0 {
            return Err(FlashFault::NotAligned);
        }

        let num_blocks = block_io.num_blocks().map_err(|_| FlashFault::Device)?;
        let bytes = (num_blocks as usize).saturating_mul(block_size);
        let capacity = bytes - bytes % EMULATED_ERASE_SIZE;

        Ok(Self {
            block_io,
            block_size,
            capacity,
            scratch: vec![0; block_size],
        })
    }

    /// Give back the block device.
    pub fn into_inner(self) -> B {
        self.block_io
    }

    fn load_block(&mut self, lba: usize) -> Result<(), FlashFault> {
        self.block_io
            .read_blocks(Lba(lba as u64), &mut self.scratch)
            .map_err(|_| FlashFault::Device)
    }

    fn store_block(&mut self, lba: usize) -> Result<(), FlashFault> {
        self.block_io
            .write_blocks(Lba(lba as u64), &self.scratch)
            .map_err(|_| FlashFault::Device)
    }
}

impl<B: BlockIo> ErrorType for EmulatedFlash<B> {
    type Error = FlashFault;
}

impl<B: BlockIo> ReadNorFlash for EmulatedFlash<B> {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), FlashFault> {
        check_read(&*self, offset, bytes.len())?;

        let mut pos = offset as usize;
        let mut done = 0;
        while done < bytes.len() {
            let lba = pos / self.block_size;
            let within = pos % self.block_size;
            let n = (self.block_size - within).min(bytes.len() - done);

            self.load_block(lba)?;
            bytes[done..done + n].copy_from_slice(&self.scratch[within..within + n]);

            pos += n;
            done += n;
        }
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<B: BlockIo> NorFlash for EmulatedFlash<B> {
    const WRITE_SIZE: usize = 1;
    const ERASE_SIZE: usize = EMULATED_ERASE_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), FlashFault> {
        check_erase(&*self, from, to)?;

        self.scratch.fill(ERASED_BYTE);
        let first = from as usize / self.block_size;
        let last = to as usize / self.block_size;
        for lba in first..last {
            self.store_block(lba)?;
        }
        self.block_io.flush().map_err(|_| FlashFault::Device)
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), FlashFault> {
        check_write(&*self, offset, bytes.len())?;

        let mut pos = offset as usize;
        let mut done = 0;
        while done < bytes.len() {
            let lba = pos / self.block_size;
            let within = pos % self.block_size;
            let n = (self.block_size - within).min(bytes.len() - done);

            self.load_block(lba)?;
            let cells = &mut self.scratch[within..within + n];
            // Programming can only move bits from 1 to 0
            if cells
                .iter()
                .zip(&bytes[done..done + n])
                .any(|(old, new)| old & new != *new)
            {
                return Err(FlashFault::NotErased);
            }
            cells.copy_from_slice(&bytes[done..done + n]);
            self.store_block(lba)?;

            pos += n;
            done += n;
        }
        self.block_io.flush().map_err(|_| FlashFault::Device)
    }
}
