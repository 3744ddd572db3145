//! The mounted file system: superblock, both occupancy bitmaps, and the
//! inode table, all funneled through one sector cache.
//!
//! Callers share the file system as an `Arc<spin::Mutex<FileSystem>>` and
//! go through [`FileHandle`](super::FileHandle) for per-file I/O; the
//! methods here cover allocation, the inode table, and whole-store
//! maintenance.

use spin::Mutex;
use std::sync::Arc;

use super::sector_cache::SectorCacheManager;
use super::{
    BitVec, BlockDevice, FsError, FsResult, Inode, SuperBlock, DATA_BITMAP_SECTOR,
    DATA_BITMAP_WORDS, INODES_PER_SECTOR, INODE_BITMAP_SECTOR, INODE_BITMAP_WORDS, INODE_SIZE,
    INODE_TABLE_START, MAX_BLOCKS_TRACKED, MAX_INODE_COUNT, SUPER_BLOCK_SECTOR,
    TOTAL_INODE_SECTORS,
};

pub struct FileSystem {
    pub(super) cache: SectorCacheManager,
    pub(crate) inode_bitmap: BitVec,
    pub(crate) data_bitmap: BitVec,
    superblock: SuperBlock,
}

impl FileSystem {
    fn build(device: Arc<dyn BlockDevice>) -> FsResult<Self> {
        Ok(Self {
            cache: SectorCacheManager::new(device),
            inode_bitmap: BitVec::new(INODE_BITMAP_WORDS)?,
            data_bitmap: BitVec::new(DATA_BITMAP_WORDS)?,
            superblock: SuperBlock::formatted(),
        })
    }

    /// Lay down a fresh store: superblock, bitmaps with the metadata
    /// sectors pre-marked, and a zeroed inode table with every slot
    /// stamped with its own number.
    pub fn format(device: Arc<dyn BlockDevice>) -> FsResult<Arc<Mutex<Self>>> {
        let mut fs = Self::build(device)?;
        fs.write_format()?;
        log::info!("store formatted: {} inode slots", MAX_INODE_COUNT);
        Ok(Arc::new(Mutex::new(fs)))
    }

    /// Attach to an existing store. An image whose superblock does not
    /// match the baked layout gets formatted once; if the superblock still
    /// reads back wrong after that, the device is refusing writes and the
    /// mount fails.
    pub fn mount(device: Arc<dyn BlockDevice>) -> FsResult<Arc<Mutex<Self>>> {
        let mut fs = Self::build(device)?;
        if !fs.read_superblock()?.is_valid() {
            log::warn!("superblock mismatch, formatting store");
            fs.write_format()?;
            if !fs.read_superblock()?.is_valid() {
                return Err(FsError::Unformatted);
            }
        }
        let words = fs.cache.read(INODE_BITMAP_SECTOR, |sector| *sector)?;
        fs.inode_bitmap.load_from(&words);
        let words = fs.cache.read(DATA_BITMAP_SECTOR, |sector| *sector)?;
        fs.data_bitmap.load_from(&words);
        Ok(Arc::new(Mutex::new(fs)))
    }

    fn write_format(&mut self) -> FsResult<()> {
        self.superblock = SuperBlock::formatted();
        let superblock = self.superblock;
        self.cache.modify(SUPER_BLOCK_SECTOR, |sector| {
            sector.fill(0);
            superblock.store_into(sector);
        })?;

        self.inode_bitmap = BitVec::new(INODE_BITMAP_WORDS)?;
        self.data_bitmap = BitVec::new(DATA_BITMAP_WORDS)?;
        // Metadata sectors are never handed out as file data.
        self.data_bitmap.set(SUPER_BLOCK_SECTOR as u32)?;
        self.data_bitmap.set(INODE_BITMAP_SECTOR as u32)?;
        self.data_bitmap.set(DATA_BITMAP_SECTOR as u32)?;
        for i in 0..TOTAL_INODE_SECTORS {
            self.data_bitmap.set((INODE_TABLE_START + i) as u32)?;
        }
        // Sentinel one past the last tracked sector; the allocator scan
        // stops short of it.
        self.data_bitmap.set(MAX_INODE_COUNT)?;
        self.flush_bitmaps()?;

        for table_sector in 0..TOTAL_INODE_SECTORS {
            self.cache
                .modify(INODE_TABLE_START + table_sector, |sector| {
                    sector.fill(0);
                    for slot in 0..INODES_PER_SECTOR {
                        let inode_num = (table_sector * INODES_PER_SECTOR + slot) as u32;
                        Inode::empty(inode_num)
                            .store_into(&mut sector[slot * INODE_SIZE..(slot + 1) * INODE_SIZE]);
                    }
                })?;
        }
        self.cache.sync_all()
    }

    fn read_superblock(&mut self) -> FsResult<SuperBlock> {
        self.cache.read(SUPER_BLOCK_SECTOR, SuperBlock::load_from)
    }

    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    /// Push both in-memory bitmaps through the cache to disk. Called after
    /// every allocation-state change so a crash never strands sectors that
    /// an inode already references.
    pub(super) fn flush_bitmaps(&mut self) -> FsResult<()> {
        let inode_bitmap = &self.inode_bitmap;
        self.cache.modify(INODE_BITMAP_SECTOR, |sector| {
            inode_bitmap.store_into(sector);
        })?;
        let data_bitmap = &self.data_bitmap;
        self.cache.modify(DATA_BITMAP_SECTOR, |sector| {
            data_bitmap.store_into(sector);
        })?;
        self.cache.flush(INODE_BITMAP_SECTOR)?;
        self.cache.flush(DATA_BITMAP_SECTOR)
    }

    pub(super) fn alloc_block(&mut self) -> FsResult<u32> {
        let sector = self
            .data_bitmap
            .first_clear(MAX_BLOCKS_TRACKED)
            .ok_or(FsError::BlocksExhausted)?;
        self.data_bitmap.set(sector)?;
        Ok(sector)
    }

    pub(super) fn free_block(&mut self, sector: u32) -> FsResult<()> {
        self.data_bitmap.clear(sector)
    }

    /// Reserve an inode slot and a first data sector as a unit: both free
    /// positions are located before either bit is flipped, so exhaustion
    /// of one pool never leaks from the other.
    pub(super) fn alloc_file(&mut self) -> FsResult<(u32, u32)> {
        let inode_num = self
            .inode_bitmap
            .first_clear(MAX_INODE_COUNT)
            .ok_or(FsError::InodesExhausted)?;
        let sector = self
            .data_bitmap
            .first_clear(MAX_BLOCKS_TRACKED)
            .ok_or(FsError::BlocksExhausted)?;
        self.inode_bitmap.set(inode_num)?;
        self.data_bitmap.set(sector)?;
        Ok((inode_num, sector))
    }

    /// Roll back [`alloc_file`](Self::alloc_file) after a persist failure.
    pub(super) fn unwind_file(&mut self, inode_num: u32, sector: u32) {
        let _ = self.inode_bitmap.clear(inode_num);
        let _ = self.data_bitmap.clear(sector);
    }

    /// Next occupied inode slot at or after `from`.
    pub(super) fn next_occupied(&self, from: u32) -> Option<u32> {
        self.inode_bitmap.next_set(from, MAX_INODE_COUNT)
    }

    pub(super) fn read_inode(&mut self, inode_num: u32) -> FsResult<Inode> {
        let (sector, offset) = Inode::table_slot(inode_num);
        self.cache.read(sector, |sec| {
            Inode::load_from(&sec[offset..offset + INODE_SIZE])
        })
    }

    pub(super) fn write_inode(&mut self, inode: &Inode) -> FsResult<()> {
        let (sector, offset) = Inode::table_slot(inode.inode_num);
        self.cache.modify(sector, |sec| {
            inode.store_into(&mut sec[offset..offset + INODE_SIZE]);
        })?;
        self.cache.flush(sector)
    }

    /// Scan occupied slots for an exact name match.
    pub(super) fn lookup(&mut self, name: &str) -> FsResult<Option<u32>> {
        let mut from = 0;
        while let Some(inode_num) = self.next_occupied(from) {
            if self.read_inode(inode_num)?.name_matches(name) {
                return Ok(Some(inode_num));
            }
            from = inode_num + 1;
        }
        Ok(None)
    }

    /// Remove a file: release its data sectors and its inode slot, then
    /// persist both bitmaps. The table record is left behind and simply
    /// reinitialized on the slot's next use.
    pub fn delete(&mut self, name: &str) -> FsResult<()> {
        let inode_num = self.lookup(name)?.ok_or(FsError::NotFound)?;
        let inode = self.read_inode(inode_num)?;
        for i in 0..inode.sectors_allocated() as usize {
            self.free_block(inode.block_list[i])?;
        }
        self.inode_bitmap.clear(inode_num)?;
        self.flush_bitmaps()?;
        log::debug!("deleted {:?} (inode {})", name, inode_num);
        Ok(())
    }
}
