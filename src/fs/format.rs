//! `format`: lays out the superblock, both checkpoint
//! slots, NAT, SIT, and the root directory inode on a fresh device.

use alloc::vec;

use crate::err::FsError;

use super::alloc::SegmentTable;
use super::backend::{BlockDevice, BLOCK_SIZE};
use super::mount::{nat_blocks_for, sit_blocks_for, FIXED_METADATA_BLOCKS};
use super::types::{
    Checkpoint, Inode, InodeMode, NatEntry, Superblock, BLOCKS_PER_SEGMENT, INVALID_NODE_ID, ROOT_INODE, SB_MAGIC,
    SB_VERSION,
};

pub const DEFAULT_TOTAL_INODES: u32 = 256;

fn round_up_to_segment(blocks: u32) -> u32 {
    blocks.div_ceil(BLOCKS_PER_SEGMENT) * BLOCKS_PER_SEGMENT
}

/// Computes `(nat_start, nat_blocks, sit_start, sit_blocks, main_start,
/// total_segments)` for a device of `total_blocks` blocks and
/// `total_inodes` inodes, fixed-pointing `sit_blocks` against `main_start`
/// since the two are mutually dependent.
fn layout(total_blocks: u32, total_inodes: u32) -> Result<(u32, u32, u32, u32, u32, u32), FsError> {
    let nat_start = FIXED_METADATA_BLOCKS;
    let nat_blocks = nat_blocks_for(total_inodes);
    let mut sit_blocks = 1u32;
    for _ in 0..8 {
        let sit_start = nat_start + nat_blocks;
        let main_start = round_up_to_segment(sit_start + sit_blocks);
        if main_start >= total_blocks {
            return Err(FsError::NoSpace);
        }
        let total_segments = (total_blocks - main_start) / BLOCKS_PER_SEGMENT;
        let needed = sit_blocks_for(total_segments).max(1);
        if needed == sit_blocks {
            return Ok((nat_start, nat_blocks, sit_start, sit_blocks, main_start, total_segments));
        }
        sit_blocks = needed;
    }
    Err(FsError::NoSpace)
}

/// Formats `device`, materialising the root directory inode (id
/// [`ROOT_INODE`]) into the first free main-area block.
pub fn format<D: BlockDevice>(device: &D, now_ms: u64) -> Result<(), FsError> {
    format_with_inodes(device, DEFAULT_TOTAL_INODES, now_ms)
}

pub fn format_with_inodes<D: BlockDevice>(device: &D, total_inodes: u32, now_ms: u64) -> Result<(), FsError> {
    let total_blocks = device.block_count();
    let (nat_start, nat_blocks, sit_start, sit_blocks, main_start, total_segments) =
        layout(total_blocks, total_inodes)?;

    let mut sit = SegmentTable::new(total_segments, main_start / BLOCKS_PER_SEGMENT);
    sit.mark_metadata_and_root_valid(main_start, 0);

    let root_block = sit.find_first_free_data_block().ok_or(FsError::NoSpace)?;
    sit.mark_block_valid(root_block)?;

    let mut root_inode = Inode::new_empty(ROOT_INODE, ROOT_INODE, InodeMode::Directory, now_ms);
    root_inode.update_crc();
    device.write_block(root_block, &root_inode.to_bytes())?;

    let mut nat = vec![NatEntry::invalid(); total_inodes as usize];
    nat[ROOT_INODE as usize] = NatEntry {
        block_addr: root_block,
        version: 1,
        node_type: super::types::NodeType::Inode,
    };

    write_nat_at_format(device, nat_start, nat_blocks, &nat)?;
    write_sit_at_format(device, sit_start, sit_blocks, &sit)?;

    let free_blocks = total_blocks - main_start - 1;
    let mut cp_active = Checkpoint {
        checkpoint_num: 1,
        timestamp: now_ms,
        free_blocks,
        next_free_node_id: ROOT_INODE + 1,
        active_node_segment: main_start / BLOCKS_PER_SEGMENT,
        active_inode_segment: main_start / BLOCKS_PER_SEGMENT,
        active_data_segment: main_start / BLOCKS_PER_SEGMENT,
        orphan_list: [INVALID_NODE_ID; super::types::ORPHAN_LIST_LEN],
        crc32: 0,
    };
    cp_active.update_crc();
    let mut cp_inactive = cp_active;
    cp_inactive.checkpoint_num = 0;
    cp_inactive.update_crc();

    device.write_block(1, &cp_active.to_bytes())?;
    device.write_block(2, &cp_inactive.to_bytes())?;

    let mut sb = Superblock {
        magic: SB_MAGIC,
        version: SB_VERSION,
        block_size: BLOCK_SIZE as u32,
        segment_size: (BLOCKS_PER_SEGMENT as usize * BLOCK_SIZE) as u32,
        total_blocks,
        total_segments,
        total_inodes,
        root_inode: ROOT_INODE,
        nat_start,
        nat_blocks,
        sit_start,
        sit_blocks,
        main_start,
        flags: 0,
        mount_count: 0,
        last_sync_time: now_ms,
        creation_time: now_ms,
        crc32: 0,
    };
    sb.update_crc();
    device.write_block(0, &sb.to_bytes())?;

    Ok(())
}

fn write_nat_at_format<D: BlockDevice>(
    device: &D,
    nat_start: u32,
    nat_blocks: u32,
    nat: &[NatEntry],
) -> Result<(), FsError> {
    const PER_BLOCK: usize = BLOCK_SIZE / NatEntry::SIZE;
    for block in 0..nat_blocks {
        let mut buf = [0u8; BLOCK_SIZE];
        for i in 0..PER_BLOCK {
            let idx = block as usize * PER_BLOCK + i;
            let entry = nat.get(idx).copied().unwrap_or(NatEntry::invalid());
            let off = i * NatEntry::SIZE;
            buf[off..off + NatEntry::SIZE].copy_from_slice(&entry.to_bytes());
        }
        device.write_block(nat_start + block, &buf)?;
    }
    Ok(())
}

fn write_sit_at_format<D: BlockDevice>(
    device: &D,
    sit_start: u32,
    sit_blocks: u32,
    sit: &SegmentTable,
) -> Result<(), FsError> {
    const PER_BLOCK: usize = BLOCK_SIZE / super::types::SitEntry::SIZE;
    let entries = sit.entries();
    for block in 0..sit_blocks {
        let mut buf = [0u8; BLOCK_SIZE];
        for i in 0..PER_BLOCK {
            let idx = block as usize * PER_BLOCK + i;
            let entry = entries.get(idx).copied().unwrap_or_default();
            let off = i * super::types::SitEntry::SIZE;
            buf[off..off + super::types::SitEntry::SIZE].copy_from_slice(&entry.to_bytes());
        }
        device.write_block(sit_start + block, &buf)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fs::backend::MemoryBlockDevice;
    use crate::fs::mount::Mount;

    #[test]
    fn format_and_mount_root_is_empty() {
        let dev = MemoryBlockDevice::new(64);
        format(&dev, 0).unwrap();
        let mount = Mount::mount(&dev).unwrap();
        assert!(mount.fsck().is_ok());
        assert_eq!(mount.superblock().magic, SB_MAGIC);
    }

    #[test]
    fn format_lays_out_contiguous_metadata_regions() {
        let dev = MemoryBlockDevice::new(64);
        format(&dev, 0).unwrap();
        let mount = Mount::mount(&dev).unwrap();
        let sb = mount.superblock();
        assert_eq!(sb.nat_start + sb.nat_blocks, sb.sit_start);
        assert_eq!(sb.sit_start + sb.sit_blocks, sb.main_start);
        assert!(sb.main_start < sb.total_blocks);
    }

    #[test]
    fn superblock_crc_is_valid_after_format() {
        let dev = MemoryBlockDevice::new(64);
        format(&dev, 0).unwrap();
        let mount = Mount::mount(&dev).unwrap();
        assert!(mount.superblock().crc_valid());
    }

    #[test]
    fn device_too_small_fails_with_no_space() {
        let dev = MemoryBlockDevice::new(4);
        assert_eq!(format(&dev, 0), Err(FsError::NoSpace));
    }
}
