//! Free-block scan and SIT bookkeeping.
//!
//! `find_first_free_data_block` always appends to the first segment that
//! still has room — this filesystem never looks for the "best" segment, it
//! looks for the first one, in main-area order, with `valid_count < 8`.

use crate::err::FsError;

use super::types::{BLOCKS_PER_SEGMENT, SitEntry};

/// In-memory segment information table. One entry per segment,
/// `total_segments` long; `main_start_segment` is the first segment number
/// in the main area (metadata segments before it are never scanned).
pub struct SegmentTable {
    entries: alloc::vec::Vec<SitEntry>,
    main_start_segment: u32,
    dirty: bool,
}

impl SegmentTable {
    pub fn new(total_segments: u32, main_start_segment: u32) -> Self {
        Self {
            entries: alloc::vec![SitEntry::default(); total_segments as usize],
            main_start_segment,
            dirty: false,
        }
    }

    pub fn from_entries(entries: alloc::vec::Vec<SitEntry>, main_start_segment: u32) -> Self {
        Self {
            entries,
            main_start_segment,
            dirty: false,
        }
    }

    pub fn entries(&self) -> &[SitEntry] {
        &self.entries
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Scans segments starting at `main_start_segment`, returning
    /// `segment * 8 + valid_count` for the first segment whose valid count
    /// is below capacity, or `None` if the device is full.
    pub fn find_first_free_data_block(&self) -> Option<u32> {
        for seg in self.main_start_segment as usize..self.entries.len() {
            let valid = self.entries[seg].valid_count;
            if (valid as u32) < BLOCKS_PER_SEGMENT {
                return Some(seg as u32 * BLOCKS_PER_SEGMENT + valid as u32);
            }
        }
        None
    }

    /// Marks `block` valid, incrementing its segment's valid count.
    /// Overflowing the segment's capacity is corruption.
    pub fn mark_block_valid(&mut self, block: u32) -> Result<(), FsError> {
        let seg = (block / BLOCKS_PER_SEGMENT) as usize;
        let entry = self.entries.get_mut(seg).ok_or(FsError::InvalidBlock)?;
        if entry.valid_count as u32 >= BLOCKS_PER_SEGMENT {
            return Err(FsError::Corrupted);
        }
        entry.valid_count += 1;
        self.dirty = true;
        Ok(())
    }

    /// Pre-marks every metadata and fixed block in `[0, main_start)` plus
    /// `extra_main_blocks` main-area blocks (the root inode's block) valid,
    /// used by `format`.
    pub fn mark_metadata_and_root_valid(&mut self, main_start: u32, extra_main_blocks: u32) {
        for block in 0..main_start {
            let _ = self.mark_block_valid(block);
        }
        for i in 0..extra_main_blocks {
            let _ = self.mark_block_valid(main_start + i);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn scans_from_main_start_segment() {
        let mut sit = SegmentTable::new(4, 2);
        assert_eq!(sit.find_first_free_data_block(), Some(2 * 8));
        sit.mark_block_valid(16).unwrap();
        assert_eq!(sit.find_first_free_data_block(), Some(17));
    }

    #[test]
    fn full_segment_advances_to_next() {
        let mut sit = SegmentTable::new(4, 0);
        for b in 0..8 {
            sit.mark_block_valid(b).unwrap();
        }
        assert_eq!(sit.find_first_free_data_block(), Some(8));
    }

    #[test]
    fn device_full_returns_none() {
        let mut sit = SegmentTable::new(1, 0);
        for b in 0..8 {
            sit.mark_block_valid(b).unwrap();
        }
        assert_eq!(sit.find_first_free_data_block(), None);
    }

    #[test]
    fn overflowing_a_segment_is_corruption() {
        let mut sit = SegmentTable::new(1, 0);
        for b in 0..8 {
            sit.mark_block_valid(b).unwrap();
        }
        assert_eq!(sit.mark_block_valid(0), Err(FsError::Corrupted));
    }
}
