//! Mount state, sync, unmount, fsck.
//!
//! A [`Mount`] owns the in-memory NAT/SIT caches and both checkpoint slots
//! for a single mounted device. It is not internally serialised: callers
//! must ensure single-threaded access or wrap it externally, pushing that
//! responsibility out to the caller instead of baking in a lock, since the
//! filesystem here runs on a single core at a time by construction.

use alloc::vec::Vec;

use crate::err::FsError;

use super::alloc::SegmentTable;
use super::backend::{BlockDevice, BLOCK_SIZE};
use super::types::{Checkpoint, NatEntry, Superblock, SB_MAGIC, SB_VERSION};

pub const FIXED_METADATA_BLOCKS: u32 = 3;
const NAT_ENTRIES_PER_BLOCK: u32 = (BLOCK_SIZE / NatEntry::SIZE) as u32;
const SIT_ENTRIES_PER_BLOCK: u32 = (BLOCK_SIZE / super::types::SitEntry::SIZE) as u32;

pub(super) fn nat_blocks_for(total_inodes: u32) -> u32 {
    total_inodes.div_ceil(NAT_ENTRIES_PER_BLOCK)
}

pub(super) fn sit_blocks_for(total_segments: u32) -> u32 {
    total_segments.div_ceil(SIT_ENTRIES_PER_BLOCK)
}

fn read_nat<D: BlockDevice>(device: &D, sb: &Superblock) -> Result<Vec<NatEntry>, FsError> {
    let mut nat = Vec::with_capacity(sb.total_inodes as usize);
    let mut buf = [0u8; BLOCK_SIZE];
    'outer: for block in 0..sb.nat_blocks {
        device.read_block(sb.nat_start + block, &mut buf)?;
        for i in 0..NAT_ENTRIES_PER_BLOCK {
            if nat.len() as u32 >= sb.total_inodes {
                break 'outer;
            }
            let off = (i as usize) * NatEntry::SIZE;
            let entry_bytes: [u8; NatEntry::SIZE] = buf[off..off + NatEntry::SIZE].try_into().unwrap();
            nat.push(NatEntry::from_bytes(&entry_bytes));
        }
    }
    Ok(nat)
}

fn write_nat<D: BlockDevice>(device: &D, sb: &Superblock, nat: &[NatEntry]) -> Result<(), FsError> {
    for block in 0..sb.nat_blocks {
        let mut buf = [0u8; BLOCK_SIZE];
        for i in 0..NAT_ENTRIES_PER_BLOCK {
            let idx = (block * NAT_ENTRIES_PER_BLOCK + i) as usize;
            let entry = nat.get(idx).copied().unwrap_or(NatEntry::invalid());
            let off = (i as usize) * NatEntry::SIZE;
            buf[off..off + NatEntry::SIZE].copy_from_slice(&entry.to_bytes());
        }
        device.write_block(sb.nat_start + block, &buf)?;
    }
    Ok(())
}

fn read_sit<D: BlockDevice>(device: &D, sb: &Superblock) -> Result<SegmentTable, FsError> {
    let mut entries = Vec::with_capacity(sb.total_segments as usize);
    let mut buf = [0u8; BLOCK_SIZE];
    'outer: for block in 0..sb.sit_blocks {
        device.read_block(sb.sit_start + block, &mut buf)?;
        for i in 0..SIT_ENTRIES_PER_BLOCK {
            if entries.len() as u32 >= sb.total_segments {
                break 'outer;
            }
            let off = (i as usize) * super::types::SitEntry::SIZE;
            let bytes: [u8; super::types::SitEntry::SIZE] =
                buf[off..off + super::types::SitEntry::SIZE].try_into().unwrap();
            entries.push(super::types::SitEntry::from_bytes(&bytes));
        }
    }
    let main_start_segment = sb.main_start / super::types::BLOCKS_PER_SEGMENT;
    Ok(SegmentTable::from_entries(entries, main_start_segment))
}

fn write_sit<D: BlockDevice>(device: &D, sb: &Superblock, sit: &SegmentTable) -> Result<(), FsError> {
    let entries = sit.entries();
    for block in 0..sb.sit_blocks {
        let mut buf = [0u8; BLOCK_SIZE];
        for i in 0..SIT_ENTRIES_PER_BLOCK {
            let idx = (block * SIT_ENTRIES_PER_BLOCK + i) as usize;
            let entry = entries.get(idx).copied().unwrap_or_default();
            let off = (i as usize) * super::types::SitEntry::SIZE;
            buf[off..off + super::types::SitEntry::SIZE].copy_from_slice(&entry.to_bytes());
        }
        device.write_block(sb.sit_start + block, &buf)?;
    }
    Ok(())
}

/// A mounted filesystem: superblock, both checkpoint slots, and the
/// in-memory NAT/SIT caches.
pub struct Mount<'d, D: BlockDevice> {
    device: &'d D,
    pub(super) sb: Superblock,
    cp: [Checkpoint; 2],
    active_slot: usize,
    pub(super) nat: Vec<NatEntry>,
    pub(super) sit: SegmentTable,
    nat_dirty: bool,
    sb_dirty: bool,
}

impl<'d, D: BlockDevice> Mount<'d, D> {
    /// Reads and validates the superblock, picks the higher-`checkpoint_num`
    /// CRC-valid checkpoint slot, then loads NAT and SIT into memory.
    pub fn mount(device: &'d D) -> Result<Self, FsError> {
        let mut buf = [0u8; BLOCK_SIZE];
        device.read_block(0, &mut buf)?;
        let mut sb = Superblock::from_bytes(&buf);
        if sb.magic != SB_MAGIC || sb.version != SB_VERSION || sb.block_size as usize != BLOCK_SIZE {
            return Err(FsError::Corrupted);
        }
        if !sb.crc_valid() {
            return Err(FsError::Corrupted);
        }

        device.read_block(1, &mut buf)?;
        let cp0 = Checkpoint::from_bytes(&buf);
        device.read_block(2, &mut buf)?;
        let cp1 = Checkpoint::from_bytes(&buf);

        let active_slot = match (cp0.crc_valid(), cp1.crc_valid()) {
            (true, true) => {
                if cp0.checkpoint_num >= cp1.checkpoint_num {
                    0
                } else {
                    1
                }
            }
            (true, false) => 0,
            (false, true) => 1,
            (false, false) => return Err(FsError::Corrupted),
        };

        let nat = read_nat(device, &sb)?;
        let sit = read_sit(device, &sb)?;

        sb.mount_count += 1;

        Ok(Self {
            device,
            sb,
            cp: [cp0, cp1],
            active_slot,
            nat,
            sit,
            nat_dirty: false,
            sb_dirty: true,
        })
    }

    pub fn superblock(&self) -> &Superblock {
        &self.sb
    }

    pub fn active_checkpoint(&self) -> &Checkpoint {
        &self.cp[self.active_slot]
    }

    pub(super) fn mark_nat_dirty(&mut self) {
        self.nat_dirty = true;
    }

    pub(super) fn free_blocks(&self) -> u32 {
        self.cp[self.active_slot].free_blocks
    }

    pub(super) fn decrement_free_blocks(&mut self) {
        let cp = &mut self.cp[self.active_slot];
        cp.free_blocks = cp.free_blocks.saturating_sub(1);
    }

    pub(super) fn alloc_node_id(&mut self) -> Result<u32, FsError> {
        self.nat
            .iter()
            .position(|e| !e.is_valid())
            .map(|idx| idx as u32)
            .ok_or(FsError::NoSpace)
    }

    /// Writes dirty NAT/SIT blocks, then atomically rolls a checkpoint into
    /// the currently inactive slot, then rewrites the superblock if dirty.
    pub fn sync(&mut self, now_ms: u64) -> Result<(), FsError> {
        if self.nat_dirty {
            write_nat(self.device, &self.sb, &self.nat)?;
            self.nat_dirty = false;
        }
        if self.sit.is_dirty() {
            write_sit(self.device, &self.sb, &self.sit)?;
            self.sit.clear_dirty();
        }

        let inactive = 1 - self.active_slot;
        let mut next_cp = self.cp[self.active_slot];
        next_cp.checkpoint_num += 1;
        next_cp.timestamp = now_ms;
        next_cp.free_blocks = self.free_blocks();
        next_cp.update_crc();

        let block_num = inactive as u32 + 1; // slot 0 -> block 1, slot 1 -> block 2
        self.device.write_block(block_num, &next_cp.to_bytes())?;
        self.cp[inactive] = next_cp;
        self.active_slot = inactive;

        if self.sb_dirty {
            self.sb.last_sync_time = now_ms;
            self.sb.update_crc();
            self.device.write_block(0, &self.sb.to_bytes())?;
            self.sb_dirty = false;
        }
        Ok(())
    }

    /// `sync` + drop the in-memory NAT/SIT caches.
    pub fn unmount(mut self, now_ms: u64) -> Result<(), FsError> {
        self.sync(now_ms)
    }

    /// Verifies magic, version, block/segment sizes, NAT-start invariant,
    /// NAT/SIT/main-area contiguity, main-start bounds, and that the root
    /// inode is present and located in the main area.
    pub fn fsck(&self) -> Result<(), FsError> {
        let sb = &self.sb;
        if sb.magic != SB_MAGIC || sb.version != SB_VERSION {
            return Err(FsError::Corrupted);
        }
        if sb.block_size as usize != BLOCK_SIZE {
            return Err(FsError::Corrupted);
        }
        if sb.nat_start != FIXED_METADATA_BLOCKS {
            return Err(FsError::Corrupted);
        }
        if sb.nat_start + sb.nat_blocks != sb.sit_start {
            return Err(FsError::Corrupted);
        }
        if sb.sit_start + sb.sit_blocks != sb.main_start {
            return Err(FsError::Corrupted);
        }
        if sb.main_start >= sb.total_blocks {
            return Err(FsError::Corrupted);
        }
        let root = self
            .nat
            .get(super::types::ROOT_INODE as usize)
            .ok_or(FsError::Corrupted)?;
        if !root.is_valid() || root.block_addr < sb.main_start {
            return Err(FsError::Corrupted);
        }
        Ok(())
    }
}
