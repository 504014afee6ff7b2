//! Inode I/O: log-structured load/store plus direct-only
//! block mapping.

use crate::err::FsError;

use super::backend::{BlockDevice, BLOCK_SIZE};
use super::mount::Mount;
use super::types::{Inode, InodeMode, NatEntry, NodeType, DIRECT_BLOCKS, INVALID_BLOCK};

impl<'d, D: BlockDevice> Mount<'d, D> {
    /// Reads the block named by `nat[id]`, asserting `inode.inode_num == id`.
    pub fn load_inode(&self, device: &D, id: u32) -> Result<Inode, FsError> {
        let entry = self.nat.get(id as usize).ok_or(FsError::InvalidInode)?;
        if !entry.is_valid() {
            return Err(FsError::InvalidInode);
        }
        let mut buf = [0u8; BLOCK_SIZE];
        device.read_block(entry.block_addr, &mut buf)?;
        let inode = Inode::from_bytes(&buf);
        if inode.inode_num != id {
            return Err(FsError::Corrupted);
        }
        Ok(inode)
    }

    /// Writes `inode` log-structured: fresh block, mark it valid, decrement
    /// free-blocks, bump `nat[id]`'s version and point it at the new block
    ///. The old block becomes garbage, reclaimed by a
    /// future GC pass not specified here.
    pub fn store_inode(&mut self, device: &D, inode: &Inode) -> Result<(), FsError> {
        let id = inode.inode_num;
        let old_version = self
            .nat
            .get(id as usize)
            .map(|e| e.version)
            .ok_or(FsError::InvalidInode)?;

        let block = self.sit.find_first_free_data_block().ok_or(FsError::NoSpace)?;
        device.write_block(block, &inode.to_bytes())?;
        self.sit.mark_block_valid(block)?;
        self.decrement_free_blocks();

        self.nat[id as usize] = NatEntry {
            block_addr: block,
            version: old_version.wrapping_add(1),
            node_type: NodeType::Inode,
        };
        self.mark_nat_dirty();
        Ok(())
    }

    /// Allocates a fresh node id and writes an empty inode for it
    /// (used by `open` with `O_CREAT` and by `mkdir`).
    pub fn create_inode(&mut self, device: &D, parent: u32, mode: InodeMode, now_ms: u64) -> Result<Inode, FsError> {
        let id = self.alloc_node_id()?;
        let inode = Inode::new_empty(id, parent, mode, now_ms);
        self.store_inode(device, &inode)?;
        Ok(inode)
    }

    /// `bmap(inode, logical_block, create)`. Only the
    /// direct array (`logical_block < 10`) is addressable; higher logical
    /// blocks are `Unsupported`. On a `create` miss, allocates a fresh data
    /// block, records it in `inode.direct_blocks`, and marks it valid — the
    /// inode is now dirty, the caller must `store_inode` it back.
    pub fn bmap(&mut self, inode: &mut Inode, logical_block: usize, create: bool) -> Result<u32, FsError> {
        if logical_block >= DIRECT_BLOCKS {
            return Err(FsError::Unsupported);
        }
        let existing = inode.direct_blocks[logical_block];
        if existing != INVALID_BLOCK {
            return Ok(existing);
        }
        if !create {
            return Ok(INVALID_BLOCK);
        }
        let block = self.sit.find_first_free_data_block().ok_or(FsError::NoSpace)?;
        self.sit.mark_block_valid(block)?;
        self.decrement_free_blocks();
        inode.direct_blocks[logical_block] = block;
        Ok(block)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fs::backend::MemoryBlockDevice;
    use crate::fs::format::format;

    #[test]
    fn load_inode_round_trips_the_root() {
        let dev = MemoryBlockDevice::new(64);
        format(&dev, 0).unwrap();
        let mount = Mount::mount(&dev).unwrap();
        let root = mount.load_inode(&dev, 2).unwrap();
        assert_eq!(root.inode_num, 2);
        assert_eq!(root.mode, InodeMode::Directory);
    }

    #[test]
    fn store_inode_bumps_nat_version_and_block() {
        let dev = MemoryBlockDevice::new(64);
        format(&dev, 0).unwrap();
        let mut mount = Mount::mount(&dev).unwrap();
        let before = mount.nat[2];
        let mut root = mount.load_inode(&dev, 2).unwrap();
        root.size = 512;
        mount.store_inode(&dev, &root).unwrap();
        let after = mount.nat[2];
        assert_eq!(after.version, before.version.wrapping_add(1));
        assert_ne!(after.block_addr, before.block_addr);
        let reloaded = mount.load_inode(&dev, 2).unwrap();
        assert_eq!(reloaded.size, 512);
    }

    #[test]
    fn bmap_beyond_direct_range_is_unsupported() {
        let dev = MemoryBlockDevice::new(64);
        format(&dev, 0).unwrap();
        let mut mount = Mount::mount(&dev).unwrap();
        let mut root = mount.load_inode(&dev, 2).unwrap();
        assert_eq!(mount.bmap(&mut root, 10, true), Err(FsError::Unsupported));
    }

    #[test]
    fn bmap_without_create_returns_invalid_sentinel() {
        let dev = MemoryBlockDevice::new(64);
        format(&dev, 0).unwrap();
        let mut mount = Mount::mount(&dev).unwrap();
        let mut root = mount.load_inode(&dev, 2).unwrap();
        assert_eq!(mount.bmap(&mut root, 0, false).unwrap(), INVALID_BLOCK);
    }

    #[test]
    fn bmap_with_create_allocates_and_is_stable() {
        let dev = MemoryBlockDevice::new(64);
        format(&dev, 0).unwrap();
        let mut mount = Mount::mount(&dev).unwrap();
        let mut root = mount.load_inode(&dev, 2).unwrap();
        let b1 = mount.bmap(&mut root, 0, true).unwrap();
        let b2 = mount.bmap(&mut root, 0, true).unwrap();
        assert_eq!(b1, b2);
    }
}
