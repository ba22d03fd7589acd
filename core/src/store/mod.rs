//! Package store: metadata table + payload regions on a NOR flash partition.
//!
//! Every metadata change is committed to the inactive table slot with a
//! higher serial before the call returns, so the table on flash always
//! describes either the state before or the state after an operation.
//! Payload bytes are written separately (erase, then program) and a record is
//! only flagged installed once its payload is complete.

mod allocator;
mod crc;
mod record;
mod table;

pub use allocator::{AllocError, Region, RegionAllocator};
pub use record::{Handle, PackageInfo, PackageName, PackageRecord, PackageTitle};

use alloc::vec;
use alloc::vec::Vec;
use embedded_storage::nor_flash::{NorFlash, NorFlashError, NorFlashErrorKind};

use crate::config::{StoreConfig, NAME_CAPACITY, TITLE_CAPACITY};
use record::fixed_str;

/// Table chunks (header, entries) are multiples of this many bytes.
pub const TABLE_WRITE_ALIGN: usize = table::HEADER_SIZE;

/// Package store errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// Every table entry is in use
    StoreFull,
    /// A package with this name already exists
    NameConflict,
    /// No flash region could be allocated for the payload
    AllocationFailed(AllocError),
    /// Empty, oversized or NUL-containing name/title
    InvalidName,
    /// Handle does not refer to a live package
    InvalidHandle,
    /// Offset/length outside the package or not block aligned
    OutOfRange,
    /// The flash device reported an error
    FlashFault(NorFlashErrorKind),
    /// Store configuration does not fit the flash device
    InvalidConfig,
    /// Partition cannot hold the two table slots plus any data
    PartitionTooSmall,
}

impl core::fmt::Display for StoreError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::StoreFull => write!(f, "Package table is full"),
            Self::NameConflict => write!(f, "Package name already in use"),
            Self::AllocationFailed(e) => write!(f, "Allocation failed: {}", e),
            Self::InvalidName => write!(f, "Invalid package name or title"),
            Self::InvalidHandle => write!(f, "Invalid package handle"),
            Self::OutOfRange => write!(f, "Access outside package"),
            Self::FlashFault(kind) => write!(f, "Flash fault: {:?}", kind),
            Self::InvalidConfig => write!(f, "Invalid store configuration"),
            Self::PartitionTooSmall => write!(f, "Partition too small"),
        }
    }
}

fn fault<E: NorFlashError>(e: E) -> StoreError {
    StoreError::FlashFault(e.kind())
}

/// Flat, fixed-capacity table of packages on a flash partition.
pub struct PackageStore<F: NorFlash> {
    alloc: RegionAllocator<F>,
    config: StoreConfig,
    /// Indexed by handle
    records: Vec<Option<PackageRecord>>,
    /// Blocks per table slot
    table_blocks: u32,
    /// Slot holding the current table (0 or 1)
    active_slot: usize,
    serial: u32,
    next_seq: u32,
}

impl<F: NorFlash> PackageStore<F> {
    /// Open the store on `flash`, formatting it when no valid table is found.
    pub fn mount(mut flash: F, config: StoreConfig) -> Result<Self, StoreError> {
        config.validate(F::ERASE_SIZE, F::WRITE_SIZE, F::READ_SIZE)?;

        let block_size = config.block_size;
        let total_blocks = (flash.capacity() / block_size as usize) as u32;
        let table_bytes = table::table_len(config.max_packages);
        let table_blocks = (table_bytes as u32).div_ceil(block_size);

        if total_blocks <= 2 * table_blocks {
            return Err(StoreError::PartitionTooSmall);
        }
        let data_blocks =
            u16::try_from(total_blocks - 2 * table_blocks).map_err(|_| StoreError::InvalidConfig)?;

        // Pick the newest valid slot
        let mut best: Option<(usize, table::DecodedTable)> = None;
        let mut image = vec![0u8; table_bytes];
        for slot in 0..2 {
            flash
                .read(slot as u32 * table_blocks * block_size, &mut image)
                .map_err(fault)?;
            if let Some(decoded) = table::decode(&image, config.max_packages) {
                let newer = match &best {
                    Some((_, current)) => decoded.serial.wrapping_sub(current.serial) as i32 > 0,
                    None => true,
                };
                if newer {
                    best = Some((slot, decoded));
                }
            }
        }

        let data_start = 2 * table_blocks * block_size;
        let mut store = Self {
            alloc: RegionAllocator::new(flash, block_size, data_start, data_blocks),
            config,
            records: vec![None; config.max_packages],
            table_blocks,
            active_slot: 1,
            serial: 0,
            next_seq: 0,
        };

        match best {
            Some((slot, decoded)) => {
                store.active_slot = slot;
                store.serial = decoded.serial;
                store.load_records(decoded.records);
                log::info!(
                    "[STORE] mounted slot {} serial {}: {} packages, {} of {} blocks free",
                    slot,
                    store.serial,
                    store.len(),
                    store.alloc.free_blocks(),
                    store.alloc.total_blocks()
                );
            }
            None => {
                log::warn!("[STORE] no valid package table, formatting");
                store.format()?;
            }
        }
        Ok(store)
    }

    fn load_records(&mut self, records: Vec<Option<PackageRecord>>) {
        for (slot, record) in records.into_iter().enumerate() {
            let Some(record) = record else { continue };
            // A record is only visible if its region is sane and exclusive
            if self.alloc.claim(record.region).is_err() {
                log::warn!(
                    "[STORE] dropping '{}' in slot {}: bad region {:?}",
                    record.name.as_str(),
                    slot,
                    record.region
                );
                continue;
            }
            if record.size > record.region.len_bytes(self.config.block_size) {
                log::warn!(
                    "[STORE] dropping '{}' in slot {}: {} bytes do not fit {:?}",
                    record.name.as_str(),
                    slot,
                    record.size,
                    record.region
                );
                self.alloc.release(record.region);
                continue;
            }
            self.next_seq = self.next_seq.max(record.seq.wrapping_add(1));
            self.records[slot] = Some(record);
        }
    }

    /// Erase both table slots and start with an empty table.
    pub fn format(&mut self) -> Result<(), StoreError> {
        let slot_bytes = self.table_blocks * self.config.block_size;
        self.alloc
            .flash_mut()
            .erase(0, 2 * slot_bytes)
            .map_err(fault)?;

        self.records.iter_mut().for_each(|r| *r = None);
        self.alloc.reset();
        self.serial = 0;
        self.next_seq = 0;
        self.active_slot = 1;
        self.commit()
    }

    /// Write the in-memory table to the inactive slot and make it current.
    fn commit(&mut self) -> Result<(), StoreError> {
        let serial = self.serial.wrapping_add(1);
        let target = 1 - self.active_slot;
        let image = table::encode(&self.records, serial);

        let slot_bytes = self.table_blocks * self.config.block_size;
        let base = target as u32 * slot_bytes;
        let flash = self.alloc.flash_mut();

        flash.erase(base, base + slot_bytes).map_err(fault)?;
        flash
            .write(base + table::HEADER_SIZE as u32, &image[table::HEADER_SIZE..])
            .map_err(fault)?;
        // Header last: it is what makes the slot valid
        flash
            .write(base, &image[..table::HEADER_SIZE])
            .map_err(fault)?;

        #[cfg(feature = "store_debug")]
        log::debug!("[STORE] committed serial {} to slot {}", serial, target);

        self.active_slot = target;
        self.serial = serial;
        Ok(())
    }

    /// Commit, restoring `slot` to `previous` in memory if the commit fails.
    fn commit_or_restore(&mut self, slot: usize, previous: Option<PackageRecord>) -> Result<(), StoreError> {
        if let Err(e) = self.commit() {
            log::error!("[STORE] table commit failed: {}", e);
            if let Some(current) = self.records[slot].take() {
                self.alloc.release(current.region);
            }
            if let Some(previous) = &previous {
                // Was owned before this operation, cannot collide
                let _ = self.alloc.claim(previous.region);
            }
            self.records[slot] = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Create a package, replacing any package with the same name.
    ///
    /// The record is committed with `installed` cleared; the caller erases and
    /// writes the payload, then calls [`PackageStore::mark_installed`].
    pub fn create(&mut self, name: &str, title: &str, version: u16, size: u32) -> Result<Handle, StoreError> {
        match self.find(name) {
            Some(handle) => self.replace(handle, title, version, size),
            None => self.insert(name, title, version, size),
        }
    }

    /// Create a package whose name must not exist yet.
    pub fn create_new(&mut self, name: &str, title: &str, version: u16, size: u32) -> Result<Handle, StoreError> {
        if self.find(name).is_some() {
            return Err(StoreError::NameConflict);
        }
        self.insert(name, title, version, size)
    }

    fn insert(&mut self, name: &str, title: &str, version: u16, size: u32) -> Result<Handle, StoreError> {
        let name = fixed_str::<NAME_CAPACITY>(name, false)?;
        let title = fixed_str::<TITLE_CAPACITY>(title, true)?;

        let slot = self
            .records
            .iter()
            .position(Option::is_none)
            .ok_or(StoreError::StoreFull)?;
        let region = self
            .alloc
            .allocate(size)
            .map_err(StoreError::AllocationFailed)?;

        self.records[slot] = Some(PackageRecord {
            name,
            title,
            version,
            size,
            region,
            seq: self.next_seq,
            installed: false,
        });
        self.commit_or_restore(slot, None)?;
        self.next_seq = self.next_seq.wrapping_add(1);

        let handle = Handle::new(slot as u8);
        log::info!(
            "[STORE] created {} ({} bytes, blocks {}..{})",
            handle,
            size,
            region.first_block,
            region.end_block()
        );
        Ok(handle)
    }

    fn replace(&mut self, handle: Handle, title: &str, version: u16, size: u32) -> Result<Handle, StoreError> {
        let title = fixed_str::<TITLE_CAPACITY>(title, true)?;
        let slot = handle.slot();
        let previous = self.records[slot].clone().ok_or(StoreError::InvalidHandle)?;

        self.alloc.release(previous.region);
        let region = match self.alloc.allocate(size) {
            Ok(region) => region,
            Err(e) => {
                let _ = self.alloc.claim(previous.region);
                return Err(StoreError::AllocationFailed(e));
            }
        };

        self.records[slot] = Some(PackageRecord {
            name: previous.name.clone(),
            title,
            version,
            size,
            region,
            seq: previous.seq,
            installed: false,
        });
        self.commit_or_restore(slot, Some(previous))?;

        log::info!("[STORE] replaced {} ({} bytes)", handle, size);
        Ok(handle)
    }

    /// Flag a package as completely written and bootable.
    pub fn mark_installed(&mut self, handle: Handle) -> Result<(), StoreError> {
        let record = self.record(handle)?;
        if record.installed {
            return Ok(());
        }
        let previous = Some(record.clone());
        if let Some(record) = self.records[handle.slot()].as_mut() {
            record.installed = true;
        }
        self.commit_or_restore(handle.slot(), previous)
    }

    /// Remove a package and free its region; the handle becomes reusable.
    pub fn delete(&mut self, handle: Handle) -> Result<(), StoreError> {
        let slot = handle.slot();
        let previous = self.record(handle)?.clone();
        self.records[slot] = None;
        self.alloc.release(previous.region);
        self.commit_or_restore(slot, Some(previous))?;
        log::info!("[STORE] deleted {}", handle);
        Ok(())
    }

    fn record(&self, handle: Handle) -> Result<&PackageRecord, StoreError> {
        self.records
            .get(handle.slot())
            .and_then(Option::as_ref)
            .ok_or(StoreError::InvalidHandle)
    }

    /// Erase part of a package region. Offset and length must be multiples of
    /// the block size.
    pub fn erase_payload(&mut self, handle: Handle, offset: u32, len: u32) -> Result<(), StoreError> {
        let region = self.record(handle)?.region;
        self.alloc.erase_range(region, offset, len)
    }

    /// Program payload bytes into an erased part of the package.
    pub fn write_payload(&mut self, handle: Handle, offset: u32, bytes: &[u8]) -> Result<(), StoreError> {
        let record = self.record(handle)?;
        Self::check_payload_span(record, offset, bytes.len())?;
        let region = record.region;
        self.alloc.write_range(region, offset, bytes)
    }

    /// Read payload bytes back.
    pub fn read_payload(&mut self, handle: Handle, offset: u32, buf: &mut [u8]) -> Result<(), StoreError> {
        let record = self.record(handle)?;
        Self::check_payload_span(record, offset, buf.len())?;
        let region = record.region;
        self.alloc.read_range(region, offset, buf)
    }

    fn check_payload_span(record: &PackageRecord, offset: u32, len: usize) -> Result<(), StoreError> {
        let len = u32::try_from(len).map_err(|_| StoreError::OutOfRange)?;
        match offset.checked_add(len) {
            Some(end) if end <= record.size => Ok(()),
            _ => Err(StoreError::OutOfRange),
        }
    }

    /// Metadata of one package.
    pub fn read_metadata(&self, handle: Handle) -> Result<PackageInfo<'_>, StoreError> {
        self.record(handle)
            .map(|record| PackageInfo::from_record(handle, record))
    }

    /// Look a package up by name.
    pub fn find(&self, name: &str) -> Option<Handle> {
        self.records
            .iter()
            .position(|r| r.as_ref().is_some_and(|r| r.name.as_str() == name))
            .map(|slot| Handle::new(slot as u8))
    }

    /// Package following `after` in insertion order (`None` starts at the
    /// oldest one).
    pub fn next_entry(&self, after: Option<Handle>) -> Option<Handle> {
        let floor = match after {
            Some(handle) => Some(self.record(handle).ok()?.seq),
            None => None,
        };
        self.records
            .iter()
            .enumerate()
            .filter_map(|(slot, r)| r.as_ref().map(|r| (slot, r.seq)))
            .filter(|(_, seq)| floor.map_or(true, |floor| *seq > floor))
            .min_by_key(|(_, seq)| *seq)
            .map(|(slot, _)| Handle::new(slot as u8))
    }

    /// Walk all live packages in insertion order.
    pub fn enumerate(&self) -> Entries<'_, F> {
        Entries {
            store: self,
            cursor: None,
            done: false,
        }
    }

    /// Number of live packages.
    pub fn len(&self) -> usize {
        self.records.iter().filter(|r| r.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Region owned by a package.
    pub fn region(&self, handle: Handle) -> Result<Region, StoreError> {
        self.record(handle).map(|record| record.region)
    }

    /// Size of the package's region: the span `erase_payload` may cover.
    pub fn payload_capacity(&self, handle: Handle) -> Result<u32, StoreError> {
        self.region(handle)
            .map(|region| region.len_bytes(self.config.block_size))
    }

    /// Absolute flash offset of a package, as the early-boot stage maps it.
    pub fn boot_offset(&self, handle: Handle) -> Result<u32, StoreError> {
        self.region(handle)
            .map(|region| self.alloc.absolute_offset(region))
    }

    /// Free payload space in bytes.
    pub fn free_space(&self) -> u32 {
        self.alloc.free_blocks() as u32 * self.config.block_size
    }

    pub fn block_size(&self) -> u32 {
        self.config.block_size
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Give back the flash device.
    pub fn into_flash(self) -> F {
        self.alloc.into_flash()
    }
}

/// Lazy walk over the store in insertion order.
///
/// A clone continues from the same position; call
/// [`PackageStore::enumerate`] again to start over.
pub struct Entries<'a, F: NorFlash> {
    store: &'a PackageStore<F>,
    cursor: Option<Handle>,
    done: bool,
}

impl<F: NorFlash> Clone for Entries<'_, F> {
    fn clone(&self) -> Self {
        Self {
            store: self.store,
            cursor: self.cursor,
            done: self.done,
        }
    }
}

impl<'a, F: NorFlash> Iterator for Entries<'a, F> {
    type Item = PackageInfo<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.store.next_entry(self.cursor) {
            Some(handle) => {
                self.cursor = Some(handle);
                self.store.read_metadata(handle).ok()
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}
