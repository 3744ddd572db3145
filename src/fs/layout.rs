//! On-disk data structures: the superblock and the inode record.
//!
//! Layout, sector by sector:
//!
//! - sector 0: [`SuperBlock`] (three raw u32 fields)
//! - sector 1: inode occupancy bitmap (scalar header + packed words)
//! - sector 2: data-sector occupancy bitmap (same encoding)
//! - sectors 3..3+[`TOTAL_INODE_SECTORS`]: inode table, 4 records per sector
//! - everything after: data sectors, reachable only through block lists
//!
//! Records are packed little-endian by hand: the 114-byte inode stride puts
//! three of the four slots per sector at unaligned offsets, so casting
//! in-place references is not an option.

use super::{
    FsError, FsResult, INODES_PER_SECTOR, INODE_SIZE, INODE_TABLE_START, MAX_BLOCKS_TRACKED,
    MAX_FILE_SECTORS, MAX_INODE_COUNT, MAX_NAME_BYTES, SECTOR_SIZE,
};

pub(super) fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

pub(super) fn write_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// The record anchoring all other layout math. Written once by format,
/// read once by mount, constant in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    pub inode_count: u32,
    pub data_block_count: u32,
    pub inode_table_start: u32,
}

impl SuperBlock {
    /// The one superblock this build ever writes; all sizing is fixed at
    /// compile time.
    pub fn formatted() -> Self {
        Self {
            inode_count: MAX_INODE_COUNT,
            data_block_count: MAX_BLOCKS_TRACKED,
            inode_table_start: INODE_TABLE_START as u32,
        }
    }

    /// A store is "formatted" iff its persisted superblock matches the
    /// baked layout; there is no separate magic number.
    pub fn is_valid(&self) -> bool {
        *self == Self::formatted()
    }

    pub fn store_into(&self, sector: &mut [u8; SECTOR_SIZE]) {
        write_u32(sector, 0, self.inode_count);
        write_u32(sector, 4, self.data_block_count);
        write_u32(sector, 8, self.inode_table_start);
    }

    pub fn load_from(sector: &[u8; SECTOR_SIZE]) -> Self {
        Self {
            inode_count: read_u32(sector, 0),
            data_block_count: read_u32(sector, 4),
            inode_table_start: read_u32(sector, 8),
        }
    }
}

/// Per-file metadata record, 114 bytes packed, four to a table sector.
///
/// A resident copy lives inside an open [`FileHandle`](super::FileHandle)
/// and is written back on close; the on-disk copy is the authority for
/// everything else.
#[derive(Debug, Clone)]
pub struct Inode {
    /// Self-identifying slot number, stable for the inode's lifetime.
    pub inode_num: u32,
    /// Bytes of reserved sectors; always a multiple of the sector size.
    pub allocated_bytes: u32,
    /// High-water mark of bytes actually written: the reported file size.
    pub used_bytes: u32,
    /// Offset just past the last successful write; append resumes here.
    pub write_cursor: u32,
    name: [u8; MAX_NAME_BYTES],
    /// Sector numbers backing the file, in logical order.
    pub block_list: [u32; MAX_FILE_SECTORS],
}

// Field offsets within a packed record.
const NAME_OFFSET: usize = 16;
const BLOCK_LIST_OFFSET: usize = NAME_OFFSET + MAX_NAME_BYTES;
const _: () = assert!(BLOCK_LIST_OFFSET + MAX_FILE_SECTORS * 4 == INODE_SIZE);

impl Inode {
    /// An empty record carrying nothing but its own slot number, exactly as
    /// format stamps the whole table.
    pub fn empty(inode_num: u32) -> Self {
        Self {
            inode_num,
            allocated_bytes: 0,
            used_bytes: 0,
            write_cursor: 0,
            name: [0; MAX_NAME_BYTES],
            block_list: [0; MAX_FILE_SECTORS],
        }
    }

    /// Containing table sector and byte offset of this record's slot.
    pub fn table_slot(inode_num: u32) -> (usize, usize) {
        (
            INODE_TABLE_START + inode_num as usize / INODES_PER_SECTOR,
            inode_num as usize % INODES_PER_SECTOR * INODE_SIZE,
        )
    }

    pub fn set_name(&mut self, name: &str) -> FsResult<()> {
        if name.len() > MAX_NAME_BYTES - 1 {
            return Err(FsError::NameTooLong);
        }
        self.name = [0; MAX_NAME_BYTES];
        self.name[..name.len()].copy_from_slice(name.as_bytes());
        Ok(())
    }

    /// Stored name up to the first NUL.
    pub fn name(&self) -> String {
        let len = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_NAME_BYTES);
        String::from_utf8_lossy(&self.name[..len]).into_owned()
    }

    pub fn name_matches(&self, other: &str) -> bool {
        let bytes = other.as_bytes();
        bytes.len() < MAX_NAME_BYTES && self.name[..bytes.len()] == *bytes && self.name[bytes.len()] == 0
    }

    /// Sectors currently reserved for this file.
    pub fn sectors_allocated(&self) -> u32 {
        self.allocated_bytes / SECTOR_SIZE as u32
    }

    /// Pack this record into its 114-byte slot.
    pub fn store_into(&self, slot: &mut [u8]) {
        write_u32(slot, 0, self.inode_num);
        write_u32(slot, 4, self.allocated_bytes);
        write_u32(slot, 8, self.used_bytes);
        write_u32(slot, 12, self.write_cursor);
        slot[NAME_OFFSET..NAME_OFFSET + MAX_NAME_BYTES].copy_from_slice(&self.name);
        for (i, block) in self.block_list.iter().enumerate() {
            write_u32(slot, BLOCK_LIST_OFFSET + i * 4, *block);
        }
    }

    /// Unpack a record from its 114-byte slot.
    pub fn load_from(slot: &[u8]) -> Self {
        let mut name = [0u8; MAX_NAME_BYTES];
        name.copy_from_slice(&slot[NAME_OFFSET..NAME_OFFSET + MAX_NAME_BYTES]);
        let mut block_list = [0u32; MAX_FILE_SECTORS];
        for (i, block) in block_list.iter_mut().enumerate() {
            *block = read_u32(slot, BLOCK_LIST_OFFSET + i * 4);
        }
        Self {
            inode_num: read_u32(slot, 0),
            allocated_bytes: read_u32(slot, 4),
            used_bytes: read_u32(slot, 8),
            write_cursor: read_u32(slot, 12),
            name,
            block_list,
        }
    }
}
