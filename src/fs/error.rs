use std::io;

use thiserror::Error;

use super::{MAX_BLOCKS_TRACKED, MAX_FILE_SECTORS, MAX_INODE_COUNT, MAX_NAME_BYTES};

/// Everything a file-system operation can fail with. Exhaustion and sector
/// I/O faults are unrecoverable for the operation that hit them, but the
/// caller decides whether they are fatal to the program.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("a file with this name already exists")]
    AlreadyExists,
    #[error("no file with this name exists")]
    NotFound,
    #[error("file name longer than {} bytes", MAX_NAME_BYTES - 1)]
    NameTooLong,
    #[error("could not reserve memory for resident file-system state")]
    InitFailed,
    #[error("all {} inode slots are occupied", MAX_INODE_COUNT)]
    InodesExhausted,
    #[error("all {} tracked data sectors are occupied", MAX_BLOCKS_TRACKED)]
    BlocksExhausted,
    #[error("file cannot grow past {} sectors", MAX_FILE_SECTORS)]
    FileTooLarge,
    #[error("bit index {index} out of range for capacity {capacity}")]
    BitOutOfRange { index: u32, capacity: u32 },
    #[error("store is not formatted")]
    Unformatted,
    #[error("sector i/o failed: {0}")]
    Disk(#[from] io::Error),
}

pub type FsResult<T> = Result<T, FsError>;
