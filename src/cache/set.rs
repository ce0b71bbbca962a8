use super::{block::Block, hash::HashIndex};
use crate::address;

/// A cache set.
///
/// The way list is a doubly linked list of the set's ways, threaded
/// through the blocks. The head is the most recently touched (LRU) or
/// most recently filled (FIFO) way, the tail is the next victim.
///
/// Ways are handed out in index order, so ways `0..len` are linked and the
/// remaining ways have never been filled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Set {
    way_head: Option<usize>,
    way_tail: Option<usize>,
    len: usize,
    hash: Option<HashIndex>,
}

impl Set {
    #[must_use]
    pub fn new(hash_buckets: Option<usize>) -> Self {
        Self {
            hash: hash_buckets.map(HashIndex::new),
            ..Self::default()
        }
    }

    /// Number of ways linked into the way list.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    #[must_use]
    pub fn head(&self) -> Option<usize> {
        self.way_head
    }

    #[inline]
    #[must_use]
    pub fn tail(&self) -> Option<usize> {
        self.way_tail
    }

    #[inline]
    #[must_use]
    pub fn hash(&self) -> Option<&HashIndex> {
        self.hash.as_ref()
    }

    /// Takes the next never-filled way, if any.
    ///
    /// The way is linked at the head of the way list.
    pub fn take_unused(&mut self, lines: &mut [Block]) -> Option<usize> {
        if self.len == lines.len() {
            return None;
        }
        let way = self.len;
        self.len += 1;
        self.link_head(lines, way);
        Some(way)
    }

    /// Ways from head to tail.
    pub fn ways<'a>(&self, lines: &'a [Block]) -> impl Iterator<Item = usize> + 'a {
        let mut next = self.way_head;
        std::iter::from_fn(move || {
            let way = next?;
            next = lines[way].way_next;
            Some(way)
        })
    }

    /// Finds the valid way holding `tag`.
    #[inline]
    #[must_use]
    pub fn find(&self, lines: &[Block], tag: address) -> Option<usize> {
        match self.hash {
            Some(ref hash) => hash.get(lines, tag),
            None => self.find_linear(lines, tag),
        }
    }

    #[inline]
    #[must_use]
    pub fn find_linear(&self, lines: &[Block], tag: address) -> Option<usize> {
        self.ways(lines)
            .find(|&way| lines[way].tag == tag && lines[way].is_valid())
    }

    /// Adds a valid way to the hash index.
    #[inline]
    pub fn link_hash(&mut self, lines: &mut [Block], way: usize) {
        if let Some(ref mut hash) = self.hash {
            hash.insert(lines, way);
        }
    }

    /// Removes a valid way from the hash index.
    #[inline]
    pub fn unlink_hash(&mut self, lines: &mut [Block], way: usize) {
        if let Some(ref mut hash) = self.hash {
            hash.remove(lines, way);
        }
    }

    pub fn move_to_head(&mut self, lines: &mut [Block], way: usize) {
        if self.way_head == Some(way) {
            return;
        }
        self.unlink(lines, way);
        self.link_head(lines, way);
    }

    pub fn move_to_tail(&mut self, lines: &mut [Block], way: usize) {
        if self.way_tail == Some(way) {
            return;
        }
        self.unlink(lines, way);
        self.link_tail(lines, way);
    }

    fn link_head(&mut self, lines: &mut [Block], way: usize) {
        lines[way].way_prev = None;
        lines[way].way_next = self.way_head;
        match self.way_head {
            Some(head) => lines[head].way_prev = Some(way),
            None => self.way_tail = Some(way),
        }
        self.way_head = Some(way);
    }

    fn link_tail(&mut self, lines: &mut [Block], way: usize) {
        lines[way].way_next = None;
        lines[way].way_prev = self.way_tail;
        match self.way_tail {
            Some(tail) => lines[tail].way_next = Some(way),
            None => self.way_head = Some(way),
        }
        self.way_tail = Some(way);
    }

    fn unlink(&mut self, lines: &mut [Block], way: usize) {
        let prev = lines[way].way_prev.take();
        let next = lines[way].way_next.take();
        match prev {
            Some(prev) => lines[prev].way_next = next,
            None => self.way_head = next,
        }
        match next {
            Some(next) => lines[next].way_prev = prev,
            None => self.way_tail = prev,
        }
    }
}
