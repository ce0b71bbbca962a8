use crate::address;

/// Index of a block in the cache's block arena.
pub type BlockId = usize;

#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Status {
    #[default]
    INVALID = 0,
    VALID,
    /// Valid and dirty.
    MODIFIED,
}

/// Block metadata.
///
/// Way list and hash chain links are way indices within the owning set.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct Block {
    pub tag: address,
    pub status: Status,
    /// Time at which the block contents become usable.
    pub ready: u64,
    pub(crate) way_prev: Option<usize>,
    pub(crate) way_next: Option<usize>,
    pub(crate) hash_next: Option<usize>,
}

impl Block {
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.status != Status::INVALID
    }

    #[inline]
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.status == Status::MODIFIED
    }

    #[inline]
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        self.status == Status::INVALID
    }

    #[inline]
    pub fn set_modified(&mut self) {
        debug_assert!(self.is_valid());
        self.status = Status::MODIFIED;
    }

    /// Overwrites the block with a newly filled tag.
    #[inline]
    pub fn allocate(&mut self, tag: address, is_write: bool, ready: u64) {
        self.tag = tag;
        self.status = if is_write {
            Status::MODIFIED
        } else {
            Status::VALID
        };
        self.ready = ready;
    }

    #[inline]
    pub fn invalidate(&mut self) {
        self.status = Status::INVALID;
    }
}

/// Mutable view of a block handed to a miss handler.
///
/// For a fill, `data` is the buffer to be filled from the next level.
/// For a writeback, it holds the dirty contents to be written.
#[derive(Debug)]
pub struct BlockRef<'a> {
    pub tag: address,
    pub status: Status,
    pub ready: u64,
    pub data: Option<&'a mut [u8]>,
    pub user_data: Option<&'a mut [u8]>,
}
