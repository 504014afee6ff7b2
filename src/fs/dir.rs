//! Directory operations: djb2 name hashing and the packed
//! variable-length directory entry format.
//!
//! Entry layout, 4-byte aligned:
//! `entry_size:u16 | inode_number:u32 | name_len:u8 | entry_type:u8 | name_hash:u32 | name bytes`.
//! A zero `entry_size` terminates the live entries within a block; since
//! every directory data block starts life zeroed, the tail of a block is
//! already an implicit terminator and never needs to be written explicitly.

use alloc::vec::Vec;

use crate::err::FsError;

use super::backend::{BlockDevice, BLOCK_SIZE};
use super::mount::Mount;
use super::types::{Inode, InodeMode, INVALID_BLOCK};

pub const ENTRY_TYPE_FILE: u8 = 1;
pub const ENTRY_TYPE_DIR: u8 = 2;

const HEADER_LEN: usize = 12;

/// djb2: `h = 5381; h = h*33 + c` over the raw bytes, no
/// terminating NUL folded in.
pub fn hash_name(name: &[u8]) -> u32 {
    let mut h: u32 = 5381;
    for &c in name {
        h = h.wrapping_mul(33).wrapping_add(c as u32);
    }
    h
}

fn align4(n: usize) -> usize {
    (n + 3) & !3
}

struct ParsedEntry {
    offset: usize,
    entry_size: u16,
    inode_number: u32,
    name_len: u8,
    entry_type: u8,
    name_hash: u32,
}

fn parse_entry(buf: &[u8; BLOCK_SIZE], offset: usize) -> Option<ParsedEntry> {
    if offset + 2 > BLOCK_SIZE {
        return None;
    }
    let entry_size = u16::from_le_bytes(buf[offset..offset + 2].try_into().unwrap());
    if entry_size == 0 {
        return None;
    }
    let inode_number = u32::from_le_bytes(buf[offset + 2..offset + 6].try_into().unwrap());
    let name_len = buf[offset + 6];
    let entry_type = buf[offset + 7];
    let name_hash = u32::from_le_bytes(buf[offset + 8..offset + 12].try_into().unwrap());
    Some(ParsedEntry {
        offset,
        entry_size,
        inode_number,
        name_len,
        entry_type,
        name_hash,
    })
}

fn entry_name<'a>(buf: &'a [u8; BLOCK_SIZE], e: &ParsedEntry) -> &'a [u8] {
    let start = e.offset + HEADER_LEN;
    &buf[start..start + e.name_len as usize]
}

fn write_entry(buf: &mut [u8; BLOCK_SIZE], offset: usize, entry_size: u16, inode_number: u32, entry_type: u8, name: &[u8]) {
    buf[offset..offset + 2].copy_from_slice(&entry_size.to_le_bytes());
    buf[offset + 2..offset + 6].copy_from_slice(&inode_number.to_le_bytes());
    buf[offset + 6] = name.len() as u8;
    buf[offset + 7] = entry_type;
    buf[offset + 8..offset + 12].copy_from_slice(&hash_name(name).to_le_bytes());
    buf[offset + HEADER_LEN..offset + HEADER_LEN + name.len()].copy_from_slice(name);
}

impl<'d, D: BlockDevice> Mount<'d, D> {
    /// Reads the single entry living at `offset` within `block`, used by
    /// `readdir` to advance one entry at a time. Returns
    /// `(name, inode_number, entry_type, entry_size)`.
    pub(super) fn dir_read_entry_at(
        &self,
        device: &D,
        block: u32,
        offset: usize,
    ) -> Result<Option<(Vec<u8>, u32, u8, u16)>, FsError> {
        let mut buf = [0u8; BLOCK_SIZE];
        device.read_block(block, &mut buf)?;
        match parse_entry(&buf, offset) {
            None => Ok(None),
            Some(e) => Ok(Some((entry_name(&buf, &e).to_vec(), e.inode_number, e.entry_type, e.entry_size))),
        }
    }

    /// Walks `dir_inode`'s logical blocks looking for an entry whose hash
    /// and stored name match `name` exactly.
    pub fn dir_lookup(&self, device: &D, dir_inode: &Inode, name: &[u8]) -> Result<u32, FsError> {
        if dir_inode.mode != InodeMode::Directory {
            return Err(FsError::NotDirectory);
        }
        let target_hash = hash_name(name);
        let mut buf = [0u8; BLOCK_SIZE];
        for &block in &dir_inode.direct_blocks {
            if block == INVALID_BLOCK {
                continue;
            }
            device.read_block(block, &mut buf)?;
            let mut offset = 0usize;
            while let Some(e) = parse_entry(&buf, offset) {
                if e.name_hash == target_hash && e.name_len as usize == name.len() && entry_name(&buf, &e) == name {
                    return Ok(e.inode_number);
                }
                offset += e.entry_size as usize;
                if offset >= BLOCK_SIZE {
                    break;
                }
            }
        }
        Err(FsError::NotFound)
    }

    /// Lists every live entry in `dir_inode` as `(name, inode_number, entry_type)`.
    pub fn dir_list(&self, device: &D, dir_inode: &Inode) -> Result<Vec<(Vec<u8>, u32, u8)>, FsError> {
        let mut out = Vec::new();
        let mut buf = [0u8; BLOCK_SIZE];
        for &block in &dir_inode.direct_blocks {
            if block == INVALID_BLOCK {
                continue;
            }
            device.read_block(block, &mut buf)?;
            let mut offset = 0usize;
            while let Some(e) = parse_entry(&buf, offset) {
                out.push((entry_name(&buf, &e).to_vec(), e.inode_number, e.entry_type));
                offset += e.entry_size as usize;
                if offset >= BLOCK_SIZE {
                    break;
                }
            }
        }
        Ok(out)
    }

    /// Appends a `(name, inode_number, entry_type)` entry to the first
    /// directory block with sufficient tail slack, allocating a fresh block
    /// if none has room. Updates `dir_inode.size` to whole blocks.
    pub fn dir_add(
        &mut self,
        device: &D,
        dir_inode: &mut Inode,
        name: &[u8],
        inode_number: u32,
        entry_type: u8,
    ) -> Result<(), FsError> {
        if dir_inode.mode != InodeMode::Directory {
            return Err(FsError::NotDirectory);
        }
        if self.dir_lookup(device, dir_inode, name).is_ok() {
            return Err(FsError::Exists);
        }
        let needed = align4(HEADER_LEN + name.len());
        if needed > BLOCK_SIZE {
            return Err(FsError::InvalidArg);
        }

        let mut buf = [0u8; BLOCK_SIZE];
        for (logical, &block) in dir_inode.direct_blocks.iter().enumerate() {
            if block == INVALID_BLOCK {
                continue;
            }
            device.read_block(block, &mut buf)?;
            let mut offset = 0usize;
            while let Some(e) = parse_entry(&buf, offset) {
                offset += e.entry_size as usize;
                if offset >= BLOCK_SIZE {
                    break;
                }
            }
            let slack = BLOCK_SIZE - offset;
            if slack >= needed {
                write_entry(&mut buf, offset, needed as u16, inode_number, entry_type, name);
                device.write_block(block, &buf)?;
                dir_inode.size = dir_inode.size.max((logical as u64 + 1) * BLOCK_SIZE as u64);
                return Ok(());
            }
        }

        let next_logical = dir_inode
            .direct_blocks
            .iter()
            .position(|&b| b == INVALID_BLOCK)
            .ok_or(FsError::NoSpace)?;
        let block = self.bmap(dir_inode, next_logical, true)?;
        let mut fresh = [0u8; BLOCK_SIZE];
        write_entry(&mut fresh, 0, needed as u16, inode_number, entry_type, name);
        device.write_block(block, &fresh)?;
        dir_inode.size = dir_inode.size.max((next_logical as u64 + 1) * BLOCK_SIZE as u64);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fs::backend::MemoryBlockDevice;
    use crate::fs::format::format;
    use crate::fs::types::InodeMode;

    #[test]
    fn djb2_matches_known_vector() {
        assert_eq!(hash_name(b""), 5381);
        assert_eq!(hash_name(b"a"), 5381u32.wrapping_mul(33).wrapping_add(b'a' as u32));
    }

    #[test]
    fn add_then_lookup_round_trips() {
        let dev = MemoryBlockDevice::new(64);
        format(&dev, 0).unwrap();
        let mut mount = Mount::mount(&dev).unwrap();
        let mut root = mount.load_inode(&dev, 2).unwrap();
        let file_inode = mount.create_inode(&dev, 2, InodeMode::Regular, 10).unwrap();
        mount
            .dir_add(&dev, &mut root, b"hello.txt", file_inode.inode_num, ENTRY_TYPE_FILE)
            .unwrap();
        assert_eq!(mount.dir_lookup(&dev, &root, b"hello.txt").unwrap(), file_inode.inode_num);
        assert_eq!(root.size, BLOCK_SIZE as u64);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let dev = MemoryBlockDevice::new(64);
        format(&dev, 0).unwrap();
        let mut mount = Mount::mount(&dev).unwrap();
        let mut root = mount.load_inode(&dev, 2).unwrap();
        let a = mount.create_inode(&dev, 2, InodeMode::Regular, 0).unwrap();
        mount.dir_add(&dev, &mut root, b"a", a.inode_num, ENTRY_TYPE_FILE).unwrap();
        let b = mount.create_inode(&dev, 2, InodeMode::Regular, 0).unwrap();
        assert_eq!(
            mount.dir_add(&dev, &mut root, b"a", b.inode_num, ENTRY_TYPE_FILE),
            Err(FsError::Exists)
        );
    }

    #[test]
    fn missing_entry_is_not_found() {
        let dev = MemoryBlockDevice::new(64);
        format(&dev, 0).unwrap();
        let mount = Mount::mount(&dev).unwrap();
        let root = mount.load_inode(&dev, 2).unwrap();
        assert_eq!(mount.dir_lookup(&dev, &root, b"nope"), Err(FsError::NotFound));
    }

    #[test]
    fn dir_list_sees_every_added_entry() {
        let dev = MemoryBlockDevice::new(64);
        format(&dev, 0).unwrap();
        let mut mount = Mount::mount(&dev).unwrap();
        let mut root = mount.load_inode(&dev, 2).unwrap();
        for n in [b"a".as_slice(), b"b".as_slice(), b"c".as_slice()] {
            let inode = mount.create_inode(&dev, 2, InodeMode::Regular, 0).unwrap();
            mount.dir_add(&dev, &mut root, n, inode.inode_num, ENTRY_TYPE_FILE).unwrap();
        }
        let entries = mount.dir_list(&dev, &root).unwrap();
        assert_eq!(entries.len(), 3);
    }
}
