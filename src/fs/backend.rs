//! Byte-block backend: the abstract 512-byte block provider the filesystem
//! is built on top of. Shaped after a `DiskDevice`-style trait — one trait
//! describing the standard operations, implemented once per physical
//! backend, with a host-side double standing in for hardware in tests.
//!
//! Block addresses here are fixed at 512 bytes and the backend is
//! block-indexed rather than sector/LBA-indexed, matching the filesystem's
//! own layout directly.

use crate::err::FsError;

pub const BLOCK_SIZE: usize = 512;

/// Abstract 512-byte block read/write/erase provider.
///
/// `erase_sector` is optional — a backend that has no notion of sector
/// erase (e.g. a RAM disk) may treat it as a no-op returning `Ok(())`.
pub trait BlockDevice {
    /// Total number of addressable 512-byte blocks.
    fn block_count(&self) -> u32;

    fn read_block(&self, block_addr: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<(), FsError>;

    fn write_block(&self, block_addr: u32, buf: &[u8; BLOCK_SIZE]) -> Result<(), FsError>;

    /// Erases the sector containing `sector_addr`. Optional: the default
    /// implementation is a no-op success.
    fn erase_sector(&self, _sector_addr: u32) -> Result<(), FsError> {
        Ok(())
    }

    /// Bounds-checks `block_addr` against [`BlockDevice::block_count`],
    /// shared by every concrete backend's `read_block`/`write_block`.
    fn check_bounds(&self, block_addr: u32) -> Result<(), FsError> {
        if block_addr >= self.block_count() {
            Err(FsError::InvalidBlock)
        } else {
            Ok(())
        }
    }
}

/// In-memory block device backed by a byte vector, the host-side stand-in
/// for the real flash-backed device.
#[cfg(any(feature = "std", test))]
pub struct MemoryBlockDevice {
    blocks: std::sync::Mutex<std::vec::Vec<[u8; BLOCK_SIZE]>>,
}

#[cfg(any(feature = "std", test))]
impl MemoryBlockDevice {
    pub fn new(block_count: u32) -> Self {
        Self {
            blocks: std::sync::Mutex::new(std::vec![[0u8; BLOCK_SIZE]; block_count as usize]),
        }
    }
}

#[cfg(any(feature = "std", test))]
impl BlockDevice for MemoryBlockDevice {
    fn block_count(&self) -> u32 {
        self.blocks.lock().unwrap().len() as u32
    }

    fn read_block(&self, block_addr: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<(), FsError> {
        self.check_bounds(block_addr)?;
        buf.copy_from_slice(&self.blocks.lock().unwrap()[block_addr as usize]);
        Ok(())
    }

    fn write_block(&self, block_addr: u32, buf: &[u8; BLOCK_SIZE]) -> Result<(), FsError> {
        self.check_bounds(block_addr)?;
        self.blocks.lock().unwrap()[block_addr as usize].copy_from_slice(buf);
        Ok(())
    }

    fn erase_sector(&self, sector_addr: u32) -> Result<(), FsError> {
        self.check_bounds(sector_addr)?;
        self.blocks.lock().unwrap()[sector_addr as usize] = [0u8; BLOCK_SIZE];
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn out_of_range_block_is_rejected() {
        let dev = MemoryBlockDevice::new(4);
        let buf = [0u8; BLOCK_SIZE];
        assert_eq!(dev.write_block(4, &buf), Err(FsError::InvalidBlock));
    }

    #[test]
    fn write_then_read_round_trips() {
        let dev = MemoryBlockDevice::new(4);
        let mut buf = [0xABu8; BLOCK_SIZE];
        dev.write_block(1, &buf).unwrap();
        buf = [0u8; BLOCK_SIZE];
        dev.read_block(1, &mut buf).unwrap();
        assert_eq!(buf, [0xABu8; BLOCK_SIZE]);
    }

    #[test]
    fn erase_sector_zeroes_the_block() {
        let dev = MemoryBlockDevice::new(4);
        dev.write_block(0, &[0xFFu8; BLOCK_SIZE]).unwrap();
        dev.erase_sector(0).unwrap();
        let mut buf = [0xFFu8; BLOCK_SIZE];
        dev.read_block(0, &mut buf).unwrap();
        assert_eq!(buf, [0u8; BLOCK_SIZE]);
    }
}
