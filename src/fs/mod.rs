//! Log-structured filesystem, an F2FS-inspired design: superblock + dual
//! checkpoints + NAT + SIT, inodes addressed only through their NAT entry,
//! and append-only writes for both inodes and directory growth.
//!
//! Submodules mirror this breakdown: [`backend`] is the abstract
//! block provider, [`types`] is the on-disk layout,
//! [`crc`] the integrity check every structure relies on, [`alloc`] the
//! free-space scan, [`mount`] the mount/sync/fsck lifecycle, [`format`] the
//! initial layout, and [`inode`], [`dir`], [`file`] the operations built on
//! top of a live [`mount::Mount`].

pub mod alloc;
pub mod backend;
pub mod crc;
pub mod dir;
pub mod file;
pub mod format;
pub mod inode;
pub mod mount;
pub mod types;

pub use backend::{BlockDevice, BLOCK_SIZE};
#[cfg(any(feature = "std", test))]
pub use backend::MemoryBlockDevice;
pub use file::{DirHandle, FileHandle, OpenFlags, ReadDirEntry, Whence};
pub use format::{format, format_with_inodes, DEFAULT_TOTAL_INODES};
pub use mount::Mount;
pub use types::{Inode, InodeMode, ROOT_INODE};
