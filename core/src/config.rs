// Package store geometry

use crate::store::StoreError;

/// One flash MMU page: packages are mapped for execution in units of this size.
pub const DEFAULT_BLOCK_SIZE: u32 = 64 * 1024;

/// Number of table entries reserved in a freshly formatted store.
pub const DEFAULT_MAX_PACKAGES: usize = 64;

/// Handles travel in the low byte of the boot-selection register.
pub const MAX_HANDLES: usize = 256;

/// Longest package name in bytes (the on-flash field keeps a trailing NUL).
pub const NAME_CAPACITY: usize = 47;

/// Longest package title in bytes (the on-flash field keeps a trailing NUL).
pub const TITLE_CAPACITY: usize = 63;

/// Store configuration, validated against the flash device at mount time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Allocation granularity in bytes; a multiple of the device erase size.
    pub block_size: u32,
    /// Capacity of the metadata table (and the highest handle + 1).
    pub max_packages: usize,
}

impl StoreConfig {
    pub const fn new(block_size: u32, max_packages: usize) -> Self {
        Self {
            block_size,
            max_packages,
        }
    }

    /// Check the configuration against the device's erase, write and read
    /// sizes.
    pub fn validate(&self, erase_size: usize, write_size: usize, read_size: usize) -> Result<(), StoreError> {
        let block_size = self.block_size as usize;
        if block_size == 0 || erase_size == 0 || block_size % erase_size != 0 {
            return Err(StoreError::InvalidConfig);
        }
        if self.max_packages == 0 || self.max_packages > MAX_HANDLES {
            return Err(StoreError::InvalidConfig);
        }
        // Table header and entries are written as separate chunks
        if write_size == 0 || crate::store::TABLE_WRITE_ALIGN % write_size != 0 {
            return Err(StoreError::InvalidConfig);
        }
        // The table is read in one piece and payload reads are widened
        // within their block
        if read_size == 0
            || crate::store::TABLE_WRITE_ALIGN % read_size != 0
            || block_size % read_size != 0
        {
            return Err(StoreError::InvalidConfig);
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_SIZE, DEFAULT_MAX_PACKAGES)
    }
}
