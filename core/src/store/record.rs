// Package records as held in memory

use heapless::String;

use super::allocator::Region;
use super::StoreError;
use crate::config::{NAME_CAPACITY, TITLE_CAPACITY};

pub type PackageName = String<NAME_CAPACITY>;
pub type PackageTitle = String<TITLE_CAPACITY>;

/// Stable small integer identifying a package within the store.
///
/// The handle is the record's slot in the metadata table, so it survives
/// reboots and is only handed out again after the package is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(u8);

impl Handle {
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    pub const fn index(self) -> u8 {
        self.0
    }

    pub(crate) const fn slot(self) -> usize {
        self.0 as usize
    }
}

impl core::fmt::Display for Handle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One live entry of the metadata table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub name: PackageName,
    pub title: PackageTitle,
    pub version: u16,
    /// Exact payload length in bytes
    pub size: u32,
    pub region: Region,
    /// Insertion order; enumeration walks records by ascending sequence
    pub seq: u32,
    /// Set once the full payload has been written
    pub installed: bool,
}

/// Read-only view of a record handed out by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageInfo<'a> {
    pub handle: Handle,
    pub name: &'a str,
    pub title: &'a str,
    pub version: u16,
    pub size: u32,
    pub installed: bool,
}

impl<'a> PackageInfo<'a> {
    pub(super) fn from_record(handle: Handle, record: &'a PackageRecord) -> Self {
        Self {
            handle,
            name: record.name.as_str(),
            title: record.title.as_str(),
            version: record.version,
            size: record.size,
            installed: record.installed,
        }
    }
}

/// Copy `value` into a fixed-capacity string.
///
/// Names must be non-empty; NUL bytes are rejected because the on-flash
/// fields are NUL terminated.
pub(super) fn fixed_str<const N: usize>(value: &str, allow_empty: bool) -> Result<String<N>, StoreError> {
    if (!allow_empty && value.is_empty()) || value.contains('\0') {
        return Err(StoreError::InvalidName);
    }
    let mut out = String::new();
    out.push_str(value).map_err(|_| StoreError::InvalidName)?;
    Ok(out)
}
