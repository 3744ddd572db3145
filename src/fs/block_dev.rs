use std::io;

/// One fixed-size sector read or written by numeric index.
///
/// On a host this is an image file standing in for an SD card; an embedded
/// target would plug in a real flash/SD driver with the same semantics.
/// `buf` is always exactly [`SECTOR_SIZE`](super::SECTOR_SIZE) bytes.
pub trait BlockDevice: Send + Sync {
    fn read_sector(&self, sector: usize, buf: &mut [u8]) -> io::Result<()>;
    fn write_sector(&self, sector: usize, buf: &[u8]) -> io::Result<()>;
}
