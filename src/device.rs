//! Host-side block device: a plain image file addressed in 512-byte
//! sectors.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Mutex;

use crate::fs::{BlockDevice, SECTOR_SIZE};

pub struct BlockFile(pub Mutex<File>);

fn lock_poisoned() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "device mutex poisoned")
}

impl BlockDevice for BlockFile {
    fn read_sector(&self, sector: usize, buf: &mut [u8]) -> io::Result<()> {
        let mut file = self.0.lock().map_err(|_| lock_poisoned())?;
        file.seek(SeekFrom::Start((sector * SECTOR_SIZE) as u64))?;
        file.read_exact(buf)
    }

    fn write_sector(&self, sector: usize, buf: &[u8]) -> io::Result<()> {
        let mut file = self.0.lock().map_err(|_| lock_poisoned())?;
        file.seek(SeekFrom::Start((sector * SECTOR_SIZE) as u64))?;
        file.write_all(buf)
    }
}
