mod bitmap;
mod block_dev;
mod error;
mod flat_fs;
mod layout;
mod sector_cache;
mod vfs;

/// Fixed physical sector size of the backing store.
pub const SECTOR_SIZE: usize = 512;
/// How many sectors may be resident in the cache at once.
pub const SECTOR_CACHE_SIZE: usize = 16;

/// The superblock always lives in sector 0.
pub const SUPER_BLOCK_SECTOR: usize = 0;
/// Sector holding the serialized inode occupancy bitmap.
pub const INODE_BITMAP_SECTOR: usize = 1;
/// Sector holding the serialized data-sector occupancy bitmap.
pub const DATA_BITMAP_SECTOR: usize = 2;
/// First sector of the inode table.
pub const INODE_TABLE_START: usize = 3;

/// Maximum number of inodes, and thus of files.
pub const MAX_INODE_COUNT: u32 = 3950;
/// Maximum number of sectors tracked by the data bitmap.
pub const MAX_BLOCKS_TRACKED: u32 = 3950;
/// Max sectors a single file can span (22 * 512 = 11 KiB of content).
pub const MAX_FILE_SECTORS: usize = 22;
/// On-disk name buffer, terminator included (9 usable bytes).
pub const MAX_NAME_BYTES: usize = 10;
/// Packed size of one on-disk inode record.
pub const INODE_SIZE: usize = 114;
/// Inode records per table sector (4 * 114 = 456 <= 512).
pub const INODES_PER_SECTOR: usize = 4;
/// Sectors spanned by the inode table; the +1 absorbs the rounding remainder.
pub const TOTAL_INODE_SECTORS: usize = MAX_INODE_COUNT as usize / INODES_PER_SECTOR + 1;

/// Bits packed into one bitmap word.
pub const BITS_PER_WORD: u32 = 32;
/// Words backing the inode occupancy bitmap.
pub const INODE_BITMAP_WORDS: usize = (MAX_INODE_COUNT / BITS_PER_WORD) as usize + 1;
/// Words backing the data-sector occupancy bitmap.
pub const DATA_BITMAP_WORDS: usize = (MAX_BLOCKS_TRACKED / BITS_PER_WORD) as usize + 1;

// A serialized bitmap (two scalar fields plus its words) must fit in exactly
// one sector; this bounds the trackable counts at compile time.
const _: () = assert!(8 + INODE_BITMAP_WORDS * 4 <= SECTOR_SIZE);
const _: () = assert!(8 + DATA_BITMAP_WORDS * 4 <= SECTOR_SIZE);
const _: () = assert!(INODES_PER_SECTOR * INODE_SIZE <= SECTOR_SIZE);

pub use bitmap::BitVec;
pub use block_dev::BlockDevice;
pub use error::{FsError, FsResult};
pub use flat_fs::FileSystem;
pub use layout::{Inode, SuperBlock};
pub use vfs::{list_all, FileHandle, FileInfo, ListAll};
