//! Erase-block region allocator for the package partition.
//!
//! The data area behind the metadata table is divided into fixed-size blocks.
//! A package owns one contiguous run of blocks (a [`Region`]); the allocator
//! only knows which blocks are taken, the owning record lives in the table.
//!
//! All I/O helpers take region-relative offsets and refuse to touch anything
//! outside the region, so a bad offset can never spill into a neighbour.

use alloc::vec;
use alloc::vec::Vec;
use embedded_storage::nor_flash::{NorFlash, NorFlashError};

use super::StoreError;

/// Contiguous run of data blocks owned by one package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// First block, relative to the start of the data area
    pub first_block: u16,
    /// Number of blocks
    pub block_count: u16,
}

impl Region {
    pub const fn new(first_block: u16, block_count: u16) -> Self {
        Self {
            first_block,
            block_count,
        }
    }

    /// One past the last block.
    pub const fn end_block(&self) -> u32 {
        self.first_block as u32 + self.block_count as u32
    }

    pub const fn overlaps(&self, other: &Region) -> bool {
        (self.first_block as u32) < other.end_block()
            && (other.first_block as u32) < self.end_block()
    }

    /// Size of the region in bytes, saturating at `u32::MAX`.
    pub const fn len_bytes(&self, block_size: u32) -> u32 {
        (self.block_count as u32).saturating_mul(block_size)
    }
}

/// Allocation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// No contiguous free run is large enough
    OutOfSpace,
    /// Region lies outside the data area or collides with a taken block
    InvalidRegion,
}

impl core::fmt::Display for AllocError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfSpace => write!(f, "No free flash region large enough"),
            Self::InvalidRegion => write!(f, "Invalid flash region"),
        }
    }
}

/// First-fit block allocator that also owns the flash device.
pub struct RegionAllocator<F: NorFlash> {
    flash: F,
    block_size: u32,
    /// Byte offset of data block 0 on the device
    data_start: u32,
    used: Vec<bool>,
}

impl<F: NorFlash> RegionAllocator<F> {
    pub fn new(flash: F, block_size: u32, data_start: u32, data_blocks: u16) -> Self {
        Self {
            flash,
            block_size,
            data_start,
            used: vec![false; data_blocks as usize],
        }
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn total_blocks(&self) -> usize {
        self.used.len()
    }

    pub fn free_blocks(&self) -> usize {
        self.used.iter().filter(|used| !**used).count()
    }

    /// Blocks needed for `byte_len` bytes; an empty payload still takes one.
    pub fn blocks_for(&self, byte_len: u32) -> u32 {
        byte_len.div_ceil(self.block_size).max(1)
    }

    /// Reserve the first free run large enough for `byte_len` bytes.
    pub fn allocate(&mut self, byte_len: u32) -> Result<Region, AllocError> {
        let needed = self.blocks_for(byte_len) as usize;
        if needed > self.used.len() {
            return Err(AllocError::OutOfSpace);
        }

        let mut run_start = 0;
        let mut run_len = 0;
        for (idx, used) in self.used.iter().enumerate() {
            if *used {
                run_start = idx + 1;
                run_len = 0;
                continue;
            }
            run_len += 1;
            if run_len == needed {
                let region = Region::new(run_start as u16, needed as u16);
                self.mark(region, true);
                return Ok(region);
            }
        }
        Err(AllocError::OutOfSpace)
    }

    /// Mark an existing region as taken (used when loading the table).
    pub fn claim(&mut self, region: Region) -> Result<(), AllocError> {
        let end = region.end_block() as usize;
        if region.block_count == 0 || end > self.used.len() {
            return Err(AllocError::InvalidRegion);
        }
        if self.used[region.first_block as usize..end].iter().any(|used| *used) {
            return Err(AllocError::InvalidRegion);
        }
        self.mark(region, true);
        Ok(())
    }

    pub fn release(&mut self, region: Region) {
        self.mark(region, false);
    }

    /// Forget every allocation.
    pub fn reset(&mut self) {
        self.used.fill(false);
    }

    fn mark(&mut self, region: Region, used: bool) {
        let end = (region.end_block() as usize).min(self.used.len());
        for slot in &mut self.used[region.first_block as usize..end] {
            *slot = used;
        }
    }

    /// Absolute device offset of the start of `region`.
    pub fn absolute_offset(&self, region: Region) -> u32 {
        self.data_start + region.first_block as u32 * self.block_size
    }

    fn checked_span(&self, region: Region, offset: u32, len: usize) -> Result<u32, StoreError> {
        let len = u32::try_from(len).map_err(|_| StoreError::OutOfRange)?;
        let end = offset.checked_add(len).ok_or(StoreError::OutOfRange)?;
        if end > region.len_bytes(self.block_size) {
            return Err(StoreError::OutOfRange);
        }
        Ok(self.absolute_offset(region) + offset)
    }

    /// Erase `len` bytes at `offset`; both must be block aligned.
    pub fn erase_range(&mut self, region: Region, offset: u32, len: u32) -> Result<(), StoreError> {
        if offset % self.block_size != 0 || len % self.block_size != 0 {
            return Err(StoreError::OutOfRange);
        }
        let start = self.checked_span(region, offset, len as usize)?;
        self.flash
            .erase(start, start + len)
            .map_err(|e| StoreError::FlashFault(e.kind()))
    }

    /// Program `bytes` at `offset`. The range must have been erased.
    ///
    /// A tail shorter than the device write unit is padded with 0xFF, which
    /// leaves the padding bytes in the erased state.
    pub fn write_range(&mut self, region: Region, offset: u32, bytes: &[u8]) -> Result<(), StoreError> {
        if offset as usize % F::WRITE_SIZE != 0 {
            return Err(StoreError::OutOfRange);
        }
        let start = self.checked_span(region, offset, bytes.len())?;

        let aligned = bytes.len() - bytes.len() % F::WRITE_SIZE;
        if aligned > 0 {
            self.flash
                .write(start, &bytes[..aligned])
                .map_err(|e| StoreError::FlashFault(e.kind()))?;
        }
        if aligned < bytes.len() {
            let mut tail = vec![0xFF; F::WRITE_SIZE];
            tail[..bytes.len() - aligned].copy_from_slice(&bytes[aligned..]);
            self.checked_span(region, offset + aligned as u32, tail.len())?;
            self.flash
                .write(start + aligned as u32, &tail)
                .map_err(|e| StoreError::FlashFault(e.kind()))?;
        }
        Ok(())
    }

    /// Read `buf.len()` bytes at `offset`.
    ///
    /// Spans that do not line up with the device read unit are widened to it
    /// and read through a scratch buffer. Regions are block aligned, so the
    /// widened window never leaves the region.
    pub fn read_range(&mut self, region: Region, offset: u32, buf: &mut [u8]) -> Result<(), StoreError> {
        let start = self.checked_span(region, offset, buf.len())?;
        let unit = F::READ_SIZE;
        let head = start as usize % unit;

        if head != 0 {
            let window = (head + buf.len()).div_ceil(unit) * unit;
            let mut scratch = vec![0u8; window];
            self.flash
                .read(start - head as u32, &mut scratch)
                .map_err(|e| StoreError::FlashFault(e.kind()))?;
            buf.copy_from_slice(&scratch[head..head + buf.len()]);
            return Ok(());
        }

        let aligned = buf.len() - buf.len() % unit;
        if aligned > 0 {
            self.flash
                .read(start, &mut buf[..aligned])
                .map_err(|e| StoreError::FlashFault(e.kind()))?;
        }
        if aligned < buf.len() {
            let mut tail = vec![0u8; unit];
            self.flash
                .read(start + aligned as u32, &mut tail)
                .map_err(|e| StoreError::FlashFault(e.kind()))?;
            let rest = buf.len() - aligned;
            buf[aligned..].copy_from_slice(&tail[..rest]);
        }
        Ok(())
    }

    pub(super) fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    pub fn into_flash(self) -> F {
        self.flash
    }
}
