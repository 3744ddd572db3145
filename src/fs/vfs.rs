//! Per-file interface over the mounted [`FileSystem`]: handles for
//! byte-addressed reads and writes, plus a directory-listing iterator.
//!
//! A handle holds a resident copy of its inode; metadata edits (size,
//! cursor, block list) accumulate there and reach the table when the
//! handle is closed. Data and bitmap changes are persisted eagerly as
//! they happen.

use spin::Mutex;
use std::sync::Arc;

use super::{
    FileSystem, FsError, FsResult, Inode, MAX_FILE_SECTORS, SECTOR_SIZE,
};

pub struct FileHandle {
    inode: Inode,
    fs: Arc<Mutex<FileSystem>>,
}

impl FileHandle {
    /// Create a new empty file with one data sector reserved.
    ///
    /// Both allocations are located before either bitmap is touched, and
    /// if persisting the new state fails the bits are released again, so a
    /// failed create leaves the store as it was.
    pub fn create(fs: &Arc<Mutex<FileSystem>>, name: &str) -> FsResult<Self> {
        let mut inode = Inode::empty(0);
        inode.set_name(name)?;

        let mut guard = fs.lock();
        if guard.lookup(name)?.is_some() {
            return Err(FsError::AlreadyExists);
        }
        let (inode_num, first_sector) = guard.alloc_file()?;
        inode.inode_num = inode_num;
        inode.allocated_bytes = SECTOR_SIZE as u32;
        inode.block_list[0] = first_sector;

        let persist = (|| {
            guard.flush_bitmaps()?;
            guard.write_inode(&inode)
        })();
        if let Err(err) = persist {
            guard.unwind_file(inode_num, first_sector);
            let _ = guard.flush_bitmaps();
            return Err(err);
        }
        log::debug!("created {:?} (inode {})", name, inode_num);
        drop(guard);
        Ok(Self {
            inode,
            fs: fs.clone(),
        })
    }

    /// Open an existing file by name.
    pub fn open(fs: &Arc<Mutex<FileSystem>>, name: &str) -> FsResult<Self> {
        let mut guard = fs.lock();
        let inode_num = guard.lookup(name)?.ok_or(FsError::NotFound)?;
        let inode = guard.read_inode(inode_num)?;
        drop(guard);
        Ok(Self {
            inode,
            fs: fs.clone(),
        })
    }

    /// File size in bytes: the high-water mark of written data.
    pub fn size(&self) -> u32 {
        self.inode.used_bytes
    }

    pub fn name(&self) -> String {
        self.inode.name()
    }

    pub fn sectors_allocated(&self) -> u32 {
        self.inode.sectors_allocated()
    }

    /// Sector numbers currently backing this file, in logical order.
    pub fn sectors(&self) -> &[u32] {
        &self.inode.block_list[..self.inode.sectors_allocated() as usize]
    }

    /// Ensure logical sector `index` is backed, reserving sectors as
    /// needed. The fixed block list bounds file size; the check runs
    /// before any bitmap is touched so an oversized request mutates
    /// nothing.
    fn grow_to(&mut self, guard: &mut FileSystem, index: u32) -> FsResult<()> {
        if index as usize >= MAX_FILE_SECTORS {
            return Err(FsError::FileTooLarge);
        }
        if self.inode.sectors_allocated() > index {
            return Ok(());
        }
        while self.inode.sectors_allocated() <= index {
            let sector = guard.alloc_block()?;
            self.inode.block_list[self.inode.sectors_allocated() as usize] = sector;
            self.inode.allocated_bytes += SECTOR_SIZE as u32;
        }
        guard.flush_bitmaps()
    }

    /// Read `buf.len()` bytes starting at byte `offset`, spanning sectors
    /// as needed. Reading past the current allocation reserves the sectors
    /// (and yields their zeroed contents) but never changes the file size.
    pub fn read_at(&mut self, mut offset: u32, buf: &mut [u8]) -> FsResult<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let fs = self.fs.clone();
        let mut guard = fs.lock();
        let mut done = 0usize;
        while done < buf.len() {
            let index = offset / SECTOR_SIZE as u32;
            let intra = (offset % SECTOR_SIZE as u32) as usize;
            self.grow_to(&mut guard, index)?;
            let sector = self.inode.block_list[index as usize] as usize;
            let take = (buf.len() - done).min(SECTOR_SIZE - intra);
            let dst = &mut buf[done..done + take];
            guard.cache.read(sector, |sec| {
                dst.copy_from_slice(&sec[intra..intra + take]);
            })?;
            offset += take as u32;
            done += take;
        }
        Ok(())
    }

    /// Write `buf` starting at byte `offset`, spanning sectors as needed
    /// and growing the file on the way. Each completed sector is flushed
    /// before the next begins, and the size mark is only raised once data
    /// covering it is on disk.
    pub fn write_at(&mut self, mut offset: u32, buf: &[u8]) -> FsResult<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let end = offset
            .checked_add(buf.len() as u32)
            .ok_or(FsError::FileTooLarge)?;
        let fs = self.fs.clone();
        let mut guard = fs.lock();
        let mut done = 0usize;
        while done < buf.len() {
            let index = offset / SECTOR_SIZE as u32;
            let intra = (offset % SECTOR_SIZE as u32) as usize;
            self.grow_to(&mut guard, index)?;
            let sector = self.inode.block_list[index as usize] as usize;
            let take = (buf.len() - done).min(SECTOR_SIZE - intra);
            let src = &buf[done..done + take];
            guard.cache.modify(sector, |sec| {
                sec[intra..intra + take].copy_from_slice(src);
            })?;
            guard.cache.flush(sector)?;
            offset += take as u32;
            done += take;
            if end > self.inode.used_bytes {
                self.inode.used_bytes = end;
            }
        }
        self.inode.write_cursor = end;
        Ok(())
    }

    /// Write at the cursor left by the previous write.
    pub fn append(&mut self, buf: &[u8]) -> FsResult<()> {
        self.write_at(self.inode.write_cursor, buf)
    }

    /// Persist the handle's inode and drain the sector cache.
    pub fn close(self) -> FsResult<()> {
        let mut guard = self.fs.lock();
        guard.write_inode(&self.inode)?;
        guard.cache.sync_all()
    }
}

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub used_bytes: u32,
}

/// Iterator over every file in the store, in inode-slot order.
pub struct ListAll {
    fs: Arc<Mutex<FileSystem>>,
    next: u32,
}

pub fn list_all(fs: &Arc<Mutex<FileSystem>>) -> ListAll {
    ListAll {
        fs: fs.clone(),
        next: 0,
    }
}

impl Iterator for ListAll {
    type Item = FsResult<FileInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut guard = self.fs.lock();
        let inode_num = guard.next_occupied(self.next)?;
        self.next = inode_num + 1;
        Some(guard.read_inode(inode_num).map(|inode| FileInfo {
            name: inode.name(),
            used_bytes: inode.used_bytes,
        }))
    }
}
