//! Resident sector buffers.
//!
//! Every sector access funnels through a small FIFO pool of in-memory
//! copies, so repeated touches of the same sector (bitmap flushes, inode
//! table read-modify-writes) do not hit the device each time. The pool is a
//! field of the owning [`FileSystem`](super::FileSystem), never a
//! process-wide global.

use std::collections::VecDeque;
use std::sync::Arc;

use super::{BlockDevice, FsResult, SECTOR_CACHE_SIZE, SECTOR_SIZE};

/// One sector loaded into memory, with a dirty flag deciding whether it is
/// written back.
struct SectorCache {
    buf: [u8; SECTOR_SIZE],
    sector: usize,
    modified: bool,
}

impl SectorCache {
    fn load(sector: usize, device: &Arc<dyn BlockDevice>) -> FsResult<Self> {
        let mut buf = [0u8; SECTOR_SIZE];
        device.read_sector(sector, &mut buf)?;
        Ok(Self {
            buf,
            sector,
            modified: false,
        })
    }

    fn sync(&mut self, device: &Arc<dyn BlockDevice>) -> FsResult<()> {
        if self.modified {
            device.write_sector(self.sector, &self.buf)?;
            self.modified = false;
        }
        Ok(())
    }
}

/// FIFO pool of up to [`SECTOR_CACHE_SIZE`] resident sectors.
pub struct SectorCacheManager {
    device: Arc<dyn BlockDevice>,
    queue: VecDeque<SectorCache>,
}

impl SectorCacheManager {
    pub fn new(device: Arc<dyn BlockDevice>) -> Self {
        Self {
            device,
            queue: VecDeque::new(),
        }
    }

    /// Resident entry for `sector`, loading it (and possibly evicting the
    /// oldest entry) on a miss.
    fn entry(&mut self, sector: usize) -> FsResult<&mut SectorCache> {
        if let Some(at) = self.queue.iter().position(|c| c.sector == sector) {
            return Ok(&mut self.queue[at]);
        }
        if self.queue.len() == SECTOR_CACHE_SIZE {
            if let Some(mut oldest) = self.queue.pop_front() {
                oldest.sync(&self.device)?;
            }
        }
        self.queue.push_back(SectorCache::load(sector, &self.device)?);
        let last = self.queue.len() - 1;
        Ok(&mut self.queue[last])
    }

    /// Run `f` over the resident copy of `sector`.
    pub fn read<V>(&mut self, sector: usize, f: impl FnOnce(&[u8; SECTOR_SIZE]) -> V) -> FsResult<V> {
        let entry = self.entry(sector)?;
        Ok(f(&entry.buf))
    }

    /// Run `f` over the resident copy of `sector`, marking it dirty.
    pub fn modify<V>(
        &mut self,
        sector: usize,
        f: impl FnOnce(&mut [u8; SECTOR_SIZE]) -> V,
    ) -> FsResult<V> {
        let entry = self.entry(sector)?;
        entry.modified = true;
        Ok(f(&mut entry.buf))
    }

    /// Write-through flush of one sector, if resident and dirty.
    pub fn flush(&mut self, sector: usize) -> FsResult<()> {
        if let Some(entry) = self.queue.iter_mut().find(|c| c.sector == sector) {
            entry.sync(&self.device)?;
        }
        Ok(())
    }

    /// Flush every dirty resident sector.
    pub fn sync_all(&mut self) -> FsResult<()> {
        for entry in self.queue.iter_mut() {
            entry.sync(&self.device)?;
        }
        Ok(())
    }
}

impl Drop for SectorCacheManager {
    /// Best-effort write-back; operations that care about the outcome have
    /// already called `sync_all` themselves.
    fn drop(&mut self) {
        let _ = self.sync_all();
    }
}
