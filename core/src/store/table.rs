//! On-flash metadata table.
//!
//! Layout of one table slot (all integers little-endian):
//!
//! ```text
//! header (32 bytes)
//!   0..4    magic "LPST"
//!   4..6    format version
//!   6..8    entry count
//!   8..12   serial (higher wins at mount)
//!   12..16  CRC-32 over bytes 0..12 and every entry
//!   16..32  reserved (0xFF)
//! entry (128 bytes) * entry count
//!   0       state: 0xFF free, 0x01 live
//!   1       flags: bit 0 installed
//!   2..4    version
//!   4..8    payload size
//!   8..10   first data block
//!   10..12  block count
//!   12..16  insertion sequence
//!   16..64  name, NUL padded
//!   64..128 title, NUL padded
//! ```
//!
//! The header is programmed after the entries, so a slot whose commit was
//! interrupted never carries a valid magic + CRC pair.

use alloc::vec;
use alloc::vec::Vec;
use gpt_disk_types::{U16Le, U32Le};

use super::allocator::Region;
use super::crc::Crc32;
use super::record::{fixed_str, PackageRecord};

pub const HEADER_SIZE: usize = 32;
pub const ENTRY_SIZE: usize = 128;

const MAGIC: [u8; 4] = *b"LPST";
const FORMAT_VERSION: u16 = 1;

const STATE_FREE: u8 = 0xFF;
const STATE_LIVE: u8 = 0x01;
const FLAG_INSTALLED: u8 = 0x01;

const NAME_FIELD: core::ops::Range<usize> = 16..64;
const TITLE_FIELD: core::ops::Range<usize> = 64..128;

/// Bytes occupied by a table with `entries` slots.
pub const fn table_len(entries: usize) -> usize {
    HEADER_SIZE + entries * ENTRY_SIZE
}

/// A table slot that passed validation.
pub struct DecodedTable {
    pub serial: u32,
    pub records: Vec<Option<PackageRecord>>,
}

fn u16_at(buf: &[u8], at: usize) -> u16 {
    U16Le([buf[at], buf[at + 1]]).to_u16()
}

fn u32_at(buf: &[u8], at: usize) -> u32 {
    U32Le([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]).to_u32()
}

fn put_u16(buf: &mut [u8], at: usize, value: u16) {
    buf[at..at + 2].copy_from_slice(&U16Le::from_u16(value).0);
}

fn put_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&U32Le::from_u32(value).0);
}

fn checksum(image: &[u8]) -> u32 {
    Crc32::new()
        .update(&image[..12])
        .update(&image[HEADER_SIZE..])
        .finish()
}

/// Serialize `records` into a full table image.
pub fn encode(records: &[Option<PackageRecord>], serial: u32) -> Vec<u8> {
    let mut image = vec![0xFF; table_len(records.len())];

    image[0..4].copy_from_slice(&MAGIC);
    put_u16(&mut image, 4, FORMAT_VERSION);
    put_u16(&mut image, 6, records.len() as u16);
    put_u32(&mut image, 8, serial);

    for (slot, record) in records.iter().enumerate() {
        let Some(record) = record else { continue };
        let at = HEADER_SIZE + slot * ENTRY_SIZE;
        let entry = &mut image[at..at + ENTRY_SIZE];

        entry[0] = STATE_LIVE;
        entry[1] = if record.installed { FLAG_INSTALLED } else { 0 };
        put_u16(entry, 2, record.version);
        put_u32(entry, 4, record.size);
        put_u16(entry, 8, record.region.first_block);
        put_u16(entry, 10, record.region.block_count);
        put_u32(entry, 12, record.seq);

        entry[NAME_FIELD].fill(0);
        entry[NAME_FIELD.start..NAME_FIELD.start + record.name.len()]
            .copy_from_slice(record.name.as_bytes());
        entry[TITLE_FIELD].fill(0);
        entry[TITLE_FIELD.start..TITLE_FIELD.start + record.title.len()]
            .copy_from_slice(record.title.as_bytes());
    }

    let crc = checksum(&image);
    put_u32(&mut image, 12, crc);
    image
}

/// Validate and parse a table image. Returns `None` for a blank, torn or
/// foreign slot.
pub fn decode(image: &[u8], entries: usize) -> Option<DecodedTable> {
    if image.len() < table_len(entries) || image[0..4] != MAGIC {
        return None;
    }
    if u16_at(image, 4) != FORMAT_VERSION || u16_at(image, 6) as usize != entries {
        log::warn!("[TABLE] geometry mismatch, ignoring slot");
        return None;
    }
    let image = &image[..table_len(entries)];
    if u32_at(image, 12) != checksum(image) {
        return None;
    }

    let records = (0..entries)
        .map(|slot| {
            let at = HEADER_SIZE + slot * ENTRY_SIZE;
            decode_entry(&image[at..at + ENTRY_SIZE], slot)
        })
        .collect();

    Some(DecodedTable {
        serial: u32_at(image, 8),
        records,
    })
}

fn decode_entry(entry: &[u8], slot: usize) -> Option<PackageRecord> {
    match entry[0] {
        STATE_FREE => return None,
        STATE_LIVE => {}
        other => {
            log::warn!("[TABLE] slot {} has unknown state {:#04x}", slot, other);
            return None;
        }
    }

    let name = field_str(&entry[NAME_FIELD]).and_then(|s| fixed_str(s, false).ok());
    let title = field_str(&entry[TITLE_FIELD]).and_then(|s| fixed_str(s, true).ok());
    let (Some(name), Some(title)) = (name, title) else {
        log::warn!("[TABLE] slot {} has a malformed name or title", slot);
        return None;
    };

    Some(PackageRecord {
        name,
        title,
        version: u16_at(entry, 2),
        size: u32_at(entry, 4),
        region: Region::new(u16_at(entry, 8), u16_at(entry, 10)),
        seq: u32_at(entry, 12),
        installed: entry[1] & FLAG_INSTALLED != 0,
    })
}

fn field_str(field: &[u8]) -> Option<&str> {
    let end = field.iter().position(|b| *b == 0)?;
    core::str::from_utf8(&field[..end]).ok()
}
