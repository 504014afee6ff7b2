//! On-disk layout for the log-structured filesystem: superblock, checkpoint,
//! NAT/SIT entries, and inodes.
//!
//! Every structure here is bit-exact and little-endian. Rather than lean on
//! `#[repr(C)]`/`bytemuck::Pod` the way an ext4-style superblock type might
//! (which works there because every field's natural Rust alignment already
//! matches the on-disk layout), these types hand-roll `to_bytes`/`from_bytes`
//! — the byte offsets are the contract, not whatever the compiler happens to
//! pick for struct layout, and getting that wrong silently would corrupt
//! every record on disk.

use super::backend::BLOCK_SIZE;
use super::crc::crc32;

pub const SB_MAGIC: u32 = 0xF2FE;
pub const SB_VERSION: u32 = 1;
pub const ROOT_INODE: u32 = 2;
pub const INVALID_BLOCK: u32 = u32::MAX;
pub const INVALID_NODE_ID: u32 = u32::MAX;
pub const BLOCKS_PER_SEGMENT: u32 = 8;
pub const DIRECT_BLOCKS: usize = 10;
pub const ORPHAN_LIST_LEN: usize = 32;

fn put_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}
fn put_u64(buf: &mut [u8], off: usize, v: u64) {
    buf[off..off + 8].copy_from_slice(&v.to_le_bytes());
}
fn get_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(buf[off..off + 4].try_into().unwrap())
}
fn get_u64(buf: &[u8], off: usize) -> u64 {
    u64::from_le_bytes(buf[off..off + 8].try_into().unwrap())
}

/// Node type tag stored in a [`NatEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    None,
    Inode,
    Indirect,
    Data,
}

impl NodeType {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Inode,
            2 => Self::Indirect,
            3 => Self::Data,
            _ => Self::None,
        }
    }
    fn to_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Inode => 1,
            Self::Indirect => 2,
            Self::Data => 3,
        }
    }
}

/// Inode mode: regular file vs directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeMode {
    Regular,
    Directory,
}

impl InodeMode {
    fn from_u32(v: u32) -> Self {
        if v == 2 {
            Self::Directory
        } else {
            Self::Regular
        }
    }
    fn to_u32(self) -> u32 {
        match self {
            Self::Regular => 1,
            Self::Directory => 2,
        }
    }
}

/// The 512-byte superblock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    pub magic: u32,
    pub version: u32,
    pub block_size: u32,
    pub segment_size: u32,
    pub total_blocks: u32,
    pub total_segments: u32,
    pub total_inodes: u32,
    pub root_inode: u32,
    pub nat_start: u32,
    pub nat_blocks: u32,
    pub sit_start: u32,
    pub sit_blocks: u32,
    pub main_start: u32,
    pub flags: u32,
    pub mount_count: u32,
    pub last_sync_time: u64,
    pub creation_time: u64,
    pub crc32: u32,
}

impl Superblock {
    pub fn to_bytes(&self) -> [u8; BLOCK_SIZE] {
        let mut buf = [0u8; BLOCK_SIZE];
        put_u32(&mut buf, 0, self.magic);
        put_u32(&mut buf, 4, self.version);
        put_u32(&mut buf, 8, self.block_size);
        put_u32(&mut buf, 12, self.segment_size);
        put_u32(&mut buf, 16, self.total_blocks);
        put_u32(&mut buf, 20, self.total_segments);
        put_u32(&mut buf, 24, self.total_inodes);
        put_u32(&mut buf, 28, self.root_inode);
        put_u32(&mut buf, 32, self.nat_start);
        put_u32(&mut buf, 36, self.nat_blocks);
        put_u32(&mut buf, 40, self.sit_start);
        put_u32(&mut buf, 44, self.sit_blocks);
        put_u32(&mut buf, 48, self.main_start);
        put_u32(&mut buf, 52, self.flags);
        put_u32(&mut buf, 56, self.mount_count);
        put_u64(&mut buf, 60, self.last_sync_time);
        put_u64(&mut buf, 68, self.creation_time);
        put_u32(&mut buf, 76, self.crc32);
        buf
    }

    pub fn from_bytes(buf: &[u8; BLOCK_SIZE]) -> Self {
        Self {
            magic: get_u32(buf, 0),
            version: get_u32(buf, 4),
            block_size: get_u32(buf, 8),
            segment_size: get_u32(buf, 12),
            total_blocks: get_u32(buf, 16),
            total_segments: get_u32(buf, 20),
            total_inodes: get_u32(buf, 24),
            root_inode: get_u32(buf, 28),
            nat_start: get_u32(buf, 32),
            nat_blocks: get_u32(buf, 36),
            sit_start: get_u32(buf, 40),
            sit_blocks: get_u32(buf, 44),
            main_start: get_u32(buf, 48),
            flags: get_u32(buf, 52),
            mount_count: get_u32(buf, 56),
            last_sync_time: get_u64(buf, 60),
            creation_time: get_u64(buf, 68),
            crc32: get_u32(buf, 76),
        }
    }

    /// CRC-32 over the record with the `crc32` field zeroed.
    pub fn compute_crc(&self) -> u32 {
        let mut copy = *self;
        copy.crc32 = 0;
        crc32(&copy.to_bytes())
    }

    pub fn update_crc(&mut self) {
        self.crc32 = self.compute_crc();
    }

    pub fn crc_valid(&self) -> bool {
        self.crc32 == self.compute_crc()
    }
}

/// A 512-byte checkpoint slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub checkpoint_num: u64,
    pub timestamp: u64,
    pub free_blocks: u32,
    pub next_free_node_id: u32,
    pub active_node_segment: u32,
    pub active_inode_segment: u32,
    pub active_data_segment: u32,
    pub orphan_list: [u32; ORPHAN_LIST_LEN],
    pub crc32: u32,
}

impl Checkpoint {
    pub fn to_bytes(&self) -> [u8; BLOCK_SIZE] {
        let mut buf = [0u8; BLOCK_SIZE];
        put_u64(&mut buf, 0, self.checkpoint_num);
        put_u64(&mut buf, 8, self.timestamp);
        put_u32(&mut buf, 16, self.free_blocks);
        put_u32(&mut buf, 20, self.next_free_node_id);
        put_u32(&mut buf, 24, self.active_node_segment);
        put_u32(&mut buf, 28, self.active_inode_segment);
        put_u32(&mut buf, 32, self.active_data_segment);
        let mut off = 36;
        for entry in &self.orphan_list {
            put_u32(&mut buf, off, *entry);
            off += 4;
        }
        put_u32(&mut buf, off, self.crc32);
        buf
    }

    pub fn from_bytes(buf: &[u8; BLOCK_SIZE]) -> Self {
        let mut orphan_list = [0u32; ORPHAN_LIST_LEN];
        let mut off = 36;
        for entry in orphan_list.iter_mut() {
            *entry = get_u32(buf, off);
            off += 4;
        }
        Self {
            checkpoint_num: get_u64(buf, 0),
            timestamp: get_u64(buf, 8),
            free_blocks: get_u32(buf, 16),
            next_free_node_id: get_u32(buf, 20),
            active_node_segment: get_u32(buf, 24),
            active_inode_segment: get_u32(buf, 28),
            active_data_segment: get_u32(buf, 32),
            orphan_list,
            crc32: get_u32(buf, off),
        }
    }

    pub fn compute_crc(&self) -> u32 {
        let mut copy = *self;
        copy.crc32 = 0;
        crc32(&copy.to_bytes())
    }

    pub fn update_crc(&mut self) {
        self.crc32 = self.compute_crc();
    }

    pub fn crc_valid(&self) -> bool {
        self.crc32 == self.compute_crc()
    }
}

/// One 8-byte NAT entry: inode/node id -> physical block address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NatEntry {
    pub block_addr: u32,
    pub version: u16,
    pub node_type: NodeType,
}

impl NatEntry {
    pub const SIZE: usize = 8;

    pub const fn invalid() -> Self {
        Self {
            block_addr: INVALID_BLOCK,
            version: 0,
            node_type: NodeType::None,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        put_u32(&mut buf, 0, self.block_addr);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6] = self.node_type.to_u8();
        buf
    }

    pub fn from_bytes(buf: &[u8; Self::SIZE]) -> Self {
        Self {
            block_addr: get_u32(buf, 0),
            version: u16::from_le_bytes(buf[4..6].try_into().unwrap()),
            node_type: NodeType::from_u8(buf[6]),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.block_addr != INVALID_BLOCK
    }
}

/// One 4-byte SIT entry: per-segment valid-block bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SitEntry {
    pub valid_count: u16,
    pub flags: u8,
    pub age: u8,
}

impl SitEntry {
    pub const SIZE: usize = 4;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..2].copy_from_slice(&self.valid_count.to_le_bytes());
        buf[2] = self.flags;
        buf[3] = self.age;
        buf
    }

    pub fn from_bytes(buf: &[u8; Self::SIZE]) -> Self {
        Self {
            valid_count: u16::from_le_bytes(buf[0..2].try_into().unwrap()),
            flags: buf[2],
            age: buf[3],
        }
    }
}

/// A 512-byte inode. Only the first 10 logical blocks are directly
/// addressable; the single/double indirect pointers are carried for
/// on-disk compatibility but never populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    pub mode: InodeMode,
    pub size: u64,
    pub atime: u64,
    pub mtime: u64,
    pub ctime: u64,
    pub link_count: u32,
    pub direct_blocks: [u32; DIRECT_BLOCKS],
    pub indirect_block: u32,
    pub double_indirect_block: u32,
    pub inode_num: u32,
    pub parent_inode_num: u32,
    pub generation: u32,
    pub crc32: u32,
}

impl Inode {
    pub fn new_empty(inode_num: u32, parent: u32, mode: InodeMode, now_ms: u64) -> Self {
        Self {
            mode,
            size: 0,
            atime: now_ms,
            mtime: now_ms,
            ctime: now_ms,
            link_count: if mode == InodeMode::Directory { 2 } else { 1 },
            direct_blocks: [INVALID_BLOCK; DIRECT_BLOCKS],
            indirect_block: INVALID_BLOCK,
            double_indirect_block: INVALID_BLOCK,
            inode_num,
            parent_inode_num: parent,
            generation: 0,
            crc32: 0,
        }
    }

    pub fn to_bytes(&self) -> [u8; BLOCK_SIZE] {
        let mut buf = [0u8; BLOCK_SIZE];
        put_u32(&mut buf, 0, self.mode.to_u32());
        put_u64(&mut buf, 4, self.size);
        put_u64(&mut buf, 12, self.atime);
        put_u64(&mut buf, 20, self.mtime);
        put_u64(&mut buf, 28, self.ctime);
        put_u32(&mut buf, 36, self.link_count);
        let mut off = 40;
        for b in &self.direct_blocks {
            put_u32(&mut buf, off, *b);
            off += 4;
        }
        put_u32(&mut buf, off, self.indirect_block);
        off += 4;
        put_u32(&mut buf, off, self.double_indirect_block);
        off += 4;
        put_u32(&mut buf, off, self.inode_num);
        off += 4;
        put_u32(&mut buf, off, self.parent_inode_num);
        off += 4;
        put_u32(&mut buf, off, self.generation);
        off += 4;
        put_u32(&mut buf, off, self.crc32);
        buf
    }

    pub fn from_bytes(buf: &[u8; BLOCK_SIZE]) -> Self {
        let mut direct_blocks = [0u32; DIRECT_BLOCKS];
        let mut off = 40;
        for b in direct_blocks.iter_mut() {
            *b = get_u32(buf, off);
            off += 4;
        }
        let indirect_block = get_u32(buf, off);
        off += 4;
        let double_indirect_block = get_u32(buf, off);
        off += 4;
        let inode_num = get_u32(buf, off);
        off += 4;
        let parent_inode_num = get_u32(buf, off);
        off += 4;
        let generation = get_u32(buf, off);
        off += 4;
        let crc32 = get_u32(buf, off);
        Self {
            mode: InodeMode::from_u32(get_u32(buf, 0)),
            size: get_u64(buf, 4),
            atime: get_u64(buf, 12),
            mtime: get_u64(buf, 20),
            ctime: get_u64(buf, 28),
            link_count: get_u32(buf, 36),
            direct_blocks,
            indirect_block,
            double_indirect_block,
            inode_num,
            parent_inode_num,
            generation,
            crc32,
        }
    }

    pub fn compute_crc(&self) -> u32 {
        let mut copy = *self;
        copy.crc32 = 0;
        crc32(&copy.to_bytes())
    }

    pub fn update_crc(&mut self) {
        self.crc32 = self.compute_crc();
    }
}
