//! File operations: path resolution, open/read/write/seek,
//! mkdir, opendir/readdir, close, and the (unsupported) unlink.

use alloc::vec::Vec;

use bitflags::bitflags;

use crate::err::FsError;

use super::backend::{BlockDevice, BLOCK_SIZE};
use super::dir::{ENTRY_TYPE_DIR, ENTRY_TYPE_FILE};
use super::mount::Mount;
use super::types::{InodeMode, DIRECT_BLOCKS, INVALID_BLOCK, ROOT_INODE};

bitflags! {
    /// Flags accepted by [`Mount::open`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const CREATE = 1 << 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

/// An open file handle: inode id, byte cursor, the flags it was opened with.
#[derive(Debug, Clone, Copy)]
pub struct FileHandle {
    pub inode_id: u32,
    position: u64,
    flags: OpenFlags,
}

/// An open directory handle: inode id, byte cursor into the directory's
/// logical entry stream.
#[derive(Debug, Clone, Copy)]
pub struct DirHandle {
    pub inode_id: u32,
    position: u64,
}

pub struct ReadDirEntry {
    pub name: Vec<u8>,
    pub inode_number: u32,
    pub entry_type: u8,
}

fn split_path(path: &[u8]) -> Result<Vec<&[u8]>, FsError> {
    if path.first() != Some(&b'/') {
        return Err(FsError::InvalidArg);
    }
    Ok(path.split(|&c| c == b'/').filter(|s| !s.is_empty()).collect())
}

impl<'d, D: BlockDevice> Mount<'d, D> {
    /// Tokenises `path` on `/` starting from root, doing a directory lookup
    /// at each step. Returns the resolved inode id.
    pub fn resolve(&self, device: &D, path: &[u8]) -> Result<u32, FsError> {
        let components = split_path(path)?;
        let mut current = ROOT_INODE;
        for component in components {
            let inode = self.load_inode(device, current)?;
            current = self.dir_lookup(device, &inode, component)?;
        }
        Ok(current)
    }

    fn resolve_parent<'p>(&self, device: &D, path: &'p [u8]) -> Result<(u32, &'p [u8]), FsError> {
        let mut components = split_path(path)?;
        let last = components.pop().ok_or(FsError::InvalidArg)?;
        let mut current = ROOT_INODE;
        for component in components {
            let inode = self.load_inode(device, current)?;
            current = self.dir_lookup(device, &inode, component)?;
        }
        Ok((current, last))
    }

    /// `open(path, flags)`. With `O_CREATE` and a missing
    /// last component, allocates a regular-file inode, stores it, and adds
    /// a dirent to the parent.
    pub fn open(&mut self, device: &D, path: &[u8], flags: OpenFlags, now_ms: u64) -> Result<FileHandle, FsError> {
        let (parent_id, name) = self.resolve_parent(device, path)?;
        let mut parent = self.load_inode(device, parent_id)?;
        if parent.mode != InodeMode::Directory {
            return Err(FsError::NotDirectory);
        }
        let inode_id = match self.dir_lookup(device, &parent, name) {
            Ok(id) => id,
            Err(FsError::NotFound) if flags.contains(OpenFlags::CREATE) => {
                let inode = self.create_inode(device, parent_id, InodeMode::Regular, now_ms)?;
                self.dir_add(device, &mut parent, name, inode.inode_num, ENTRY_TYPE_FILE)?;
                self.store_inode(device, &parent)?;
                inode.inode_num
            }
            Err(e) => return Err(e),
        };
        Ok(FileHandle {
            inode_id,
            position: 0,
            flags,
        })
    }

    pub fn close(&self, _handle: FileHandle) {}

    /// `read(fd, buf, n)`. Sparse-file semantics: an
    /// `INVALID` physical block reads back as zeros.
    pub fn read(&self, device: &D, handle: &mut FileHandle, out: &mut [u8]) -> Result<usize, FsError> {
        let inode = self.load_inode(device, handle.inode_id)?;
        if handle.position >= inode.size {
            return Ok(0);
        }
        let remaining_in_file = (inode.size - handle.position) as usize;
        let to_read = out.len().min(remaining_in_file);
        let mut done = 0usize;
        let mut buf = [0u8; BLOCK_SIZE];
        while done < to_read {
            let position = handle.position + done as u64;
            let logical = (position / BLOCK_SIZE as u64) as usize;
            let offset_in_block = (position % BLOCK_SIZE as u64) as usize;
            let take = (BLOCK_SIZE - offset_in_block).min(to_read - done);
            if logical >= DIRECT_BLOCKS {
                return Err(FsError::Unsupported);
            }
            let physical = inode.direct_blocks[logical];
            if physical == INVALID_BLOCK {
                out[done..done + take].fill(0);
            } else {
                device.read_block(physical, &mut buf)?;
                out[done..done + take].copy_from_slice(&buf[offset_in_block..offset_in_block + take]);
            }
            done += take;
        }
        handle.position += done as u64;
        Ok(done)
    }

    /// `write(fd, buf, n)`. Partial-block writes are
    /// read-modify-write; full-block writes go straight through.
    pub fn write(&mut self, device: &D, handle: &mut FileHandle, data: &[u8], now_ms: u64) -> Result<usize, FsError> {
        let mut inode = self.load_inode(device, handle.inode_id)?;
        let mut done = 0usize;
        let mut buf = [0u8; BLOCK_SIZE];
        while done < data.len() {
            let position = handle.position + done as u64;
            let logical = (position / BLOCK_SIZE as u64) as usize;
            let offset_in_block = (position % BLOCK_SIZE as u64) as usize;
            let take = (BLOCK_SIZE - offset_in_block).min(data.len() - done);

            let physical = self.bmap(&mut inode, logical, true)?;
            if offset_in_block == 0 && take == BLOCK_SIZE {
                buf[..].copy_from_slice(&data[done..done + take]);
            } else {
                device.read_block(physical, &mut buf)?;
                buf[offset_in_block..offset_in_block + take].copy_from_slice(&data[done..done + take]);
            }
            device.write_block(physical, &buf)?;
            done += take;
        }
        handle.position += done as u64;
        if handle.position > inode.size {
            inode.size = handle.position;
        }
        inode.mtime = now_ms;
        self.store_inode(device, &inode)?;
        Ok(done)
    }

    /// `seek(fd, offset, whence)`. A negative resulting
    /// position is `InvalidArg`.
    pub fn seek(&self, device: &D, handle: &mut FileHandle, offset: i64, whence: Whence) -> Result<u64, FsError> {
        let base: i64 = match whence {
            Whence::Set => 0,
            Whence::Cur => handle.position as i64,
            Whence::End => self.load_inode(device, handle.inode_id)?.size as i64,
        };
        let new_position = base.checked_add(offset).ok_or(FsError::InvalidArg)?;
        if new_position < 0 {
            return Err(FsError::InvalidArg);
        }
        handle.position = new_position as u64;
        Ok(handle.position)
    }

    /// `mkdir(path)`: like open-with-create but
    /// `mode=Directory`, link count 2, entry type 2 in the parent dirent.
    /// The new directory's direct pointers stay all `INVALID` — its first
    /// data block is lazily created on the first `dir_add`.
    pub fn mkdir(&mut self, device: &D, path: &[u8], now_ms: u64) -> Result<(), FsError> {
        let (parent_id, name) = self.resolve_parent(device, path)?;
        let mut parent = self.load_inode(device, parent_id)?;
        if parent.mode != InodeMode::Directory {
            return Err(FsError::NotDirectory);
        }
        if self.dir_lookup(device, &parent, name).is_ok() {
            return Err(FsError::Exists);
        }
        let inode = self.create_inode(device, parent_id, InodeMode::Directory, now_ms)?;
        self.dir_add(device, &mut parent, name, inode.inode_num, ENTRY_TYPE_DIR)?;
        self.store_inode(device, &parent)?;
        Ok(())
    }

    pub fn opendir(&self, device: &D, path: &[u8]) -> Result<DirHandle, FsError> {
        let inode_id = self.resolve(device, path)?;
        let inode = self.load_inode(device, inode_id)?;
        if inode.mode != InodeMode::Directory {
            return Err(FsError::NotDirectory);
        }
        Ok(DirHandle { inode_id, position: 0 })
    }

    /// Returns the next non-zero-length entry, advancing `handle`'s
    /// position by that entry's `entry_size`. A zero-length terminator
    /// mid-block only ends that block, not the directory — the scan
    /// advances to the next populated `direct_blocks` slot and retries.
    pub fn readdir(&self, device: &D, handle: &mut DirHandle) -> Result<Option<ReadDirEntry>, FsError> {
        let inode = self.load_inode(device, handle.inode_id)?;
        loop {
            let logical = (handle.position / BLOCK_SIZE as u64) as usize;
            if logical >= DIRECT_BLOCKS {
                return Ok(None);
            }
            let block = inode.direct_blocks[logical];
            if block == INVALID_BLOCK {
                return Ok(None);
            }
            let offset_in_block = (handle.position % BLOCK_SIZE as u64) as usize;
            match self.dir_read_entry_at(device, block, offset_in_block)? {
                None => {
                    handle.position = (logical as u64 + 1) * BLOCK_SIZE as u64;
                    continue;
                }
                Some((name, inode_number, entry_type, entry_size)) => {
                    handle.position += entry_size as u64;
                    return Ok(Some(ReadDirEntry {
                        name,
                        inode_number,
                        entry_type,
                    }));
                }
            }
        }
    }

    /// `unlink` is not part of the required surface; kept as an explicit
    /// `Unsupported` until a GC-aware implementation exists.
    pub fn unlink(&mut self, _device: &D, _path: &[u8]) -> Result<(), FsError> {
        Err(FsError::Unsupported)
    }
}
