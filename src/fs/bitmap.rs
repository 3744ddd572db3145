//! Packed occupancy bitmaps.
//!
//! Two of these track the inode slots and the data sectors. Both are
//! resident in memory while the file system is up and are mirrored to their
//! dedicated sectors on demand, not continuously.

use super::layout::{read_u32, write_u32};
use super::{FsError, FsResult, BITS_PER_WORD, SECTOR_SIZE};

/// A packed set of single-bit flags over a preallocated index range.
///
/// The vector is the sole mutator of its words. Every index is checked
/// against the tracked bit count, so an out-of-range access is a typed
/// error rather than silent corruption.
pub struct BitVec {
    bit_count: u32,
    words: Vec<u32>,
}

impl BitVec {
    /// Zero-initialized vector of `word_count` packed words.
    pub fn new(word_count: usize) -> FsResult<Self> {
        let mut words = Vec::new();
        words
            .try_reserve_exact(word_count)
            .map_err(|_| FsError::InitFailed)?;
        words.resize(word_count, 0);
        Ok(Self {
            bit_count: word_count as u32 * BITS_PER_WORD,
            words,
        })
    }

    pub fn bit_count(&self) -> u32 {
        self.bit_count
    }

    /// Backing words, exposed for persistence and for state comparisons.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    fn check(&self, bit: u32) -> FsResult<()> {
        if bit < self.bit_count {
            Ok(())
        } else {
            Err(FsError::BitOutOfRange {
                index: bit,
                capacity: self.bit_count,
            })
        }
    }

    fn is_set(&self, bit: u32) -> bool {
        self.words[(bit / BITS_PER_WORD) as usize] & (1 << (bit % BITS_PER_WORD)) != 0
    }

    pub fn set(&mut self, bit: u32) -> FsResult<()> {
        self.check(bit)?;
        self.words[(bit / BITS_PER_WORD) as usize] |= 1 << (bit % BITS_PER_WORD);
        Ok(())
    }

    pub fn clear(&mut self, bit: u32) -> FsResult<()> {
        self.check(bit)?;
        self.words[(bit / BITS_PER_WORD) as usize] &= !(1 << (bit % BITS_PER_WORD));
        Ok(())
    }

    pub fn test(&self, bit: u32) -> FsResult<bool> {
        self.check(bit)?;
        Ok(self.is_set(bit))
    }

    /// First clear bit below `limit`, scanning linearly from 0. `None`
    /// means the range is exhausted.
    pub fn first_clear(&self, limit: u32) -> Option<u32> {
        (0..limit.min(self.bit_count)).find(|&bit| !self.is_set(bit))
    }

    /// Next set bit in `from..limit`.
    pub fn next_set(&self, from: u32, limit: u32) -> Option<u32> {
        (from..limit.min(self.bit_count)).find(|&bit| self.is_set(bit))
    }

    /// Pack `bit_count`, the word count, then the words into one sector
    /// image. The compile-time capacity bound guarantees the fit.
    pub fn store_into(&self, sector: &mut [u8; SECTOR_SIZE]) {
        sector.fill(0);
        write_u32(sector, 0, self.bit_count);
        write_u32(sector, 4, self.words.len() as u32);
        for (i, word) in self.words.iter().enumerate() {
            write_u32(sector, 8 + i * 4, *word);
        }
    }

    /// Transcribe a sector written by [`store_into`](Self::store_into) back
    /// into this resident vector.
    pub fn load_from(&mut self, sector: &[u8; SECTOR_SIZE]) {
        self.bit_count = read_u32(sector, 0);
        let word_count = (read_u32(sector, 4) as usize).min(self.words.len());
        for (i, word) in self.words.iter_mut().take(word_count).enumerate() {
            *word = read_u32(sector, 8 + i * 4);
        }
    }
}
