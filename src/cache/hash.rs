use super::block::Block;
use crate::address;

/// Per-set tag index for highly associative caches.
///
/// Buckets hold the head of a chain of ways linked through
/// [`Block::hash_next`]. Only valid blocks are linked, which keeps the index
/// a restriction of the set's way list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HashIndex {
    buckets: Box<[Option<usize>]>,
}

impl HashIndex {
    #[must_use]
    pub fn new(num_buckets: usize) -> Self {
        assert!(
            num_buckets.is_power_of_two(),
            "hash index needs a power of two buckets (got {num_buckets})"
        );
        Self {
            buckets: vec![None; num_buckets].into_boxed_slice(),
        }
    }

    #[inline]
    #[must_use]
    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Folds all tag bytes into the bucket index.
    #[inline]
    #[must_use]
    pub fn bucket(&self, tag: address) -> usize {
        let key = (tag >> 24) ^ (tag >> 16) ^ (tag >> 8) ^ tag;
        (key as usize) & (self.buckets.len() - 1)
    }

    /// Finds the valid way holding `tag`.
    #[inline]
    #[must_use]
    pub fn get(&self, lines: &[Block], tag: address) -> Option<usize> {
        let mut next = self.buckets[self.bucket(tag)];
        while let Some(way) = next {
            let line = &lines[way];
            if line.tag == tag && line.is_valid() {
                return Some(way);
            }
            next = line.hash_next;
        }
        None
    }

    /// Links `way` at the head of the chain for its current tag.
    pub fn insert(&mut self, lines: &mut [Block], way: usize) {
        let bucket = self.bucket(lines[way].tag);
        debug_assert!(self.chain(lines, bucket).all(|w| w != way));
        lines[way].hash_next = self.buckets[bucket];
        self.buckets[bucket] = Some(way);
    }

    /// Unlinks `way` from the chain for its current tag.
    ///
    /// Must be called before the tag of `way` is overwritten.
    pub fn remove(&mut self, lines: &mut [Block], way: usize) {
        let bucket = self.bucket(lines[way].tag);
        let removed_next = lines[way].hash_next.take();

        if self.buckets[bucket] == Some(way) {
            self.buckets[bucket] = removed_next;
            return;
        }
        let mut prev = self.buckets[bucket];
        while let Some(current) = prev {
            if lines[current].hash_next == Some(way) {
                lines[current].hash_next = removed_next;
                return;
            }
            prev = lines[current].hash_next;
        }
        panic!("way {way} is not linked in hash bucket {bucket}");
    }

    /// Ways linked in a bucket.
    pub fn chain<'a>(&self, lines: &'a [Block], bucket: usize) -> impl Iterator<Item = usize> + 'a {
        let mut next = self.buckets[bucket];
        std::iter::from_fn(move || {
            let way = next?;
            next = lines[way].hash_next;
            Some(way)
        })
    }

    /// Total number of linked ways.
    #[must_use]
    pub fn len(&self, lines: &[Block]) -> usize {
        (0..self.num_buckets())
            .map(|bucket| self.chain(lines, bucket).count())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::HashIndex;
    use crate::cache::block::Block;

    fn lines(tags: &[u64]) -> Vec<Block> {
        tags.iter()
            .map(|&tag| {
                let mut block = Block::default();
                block.allocate(tag, false, 0);
                block
            })
            .collect()
    }

    #[test]
    fn test_bucket_folds_tag_bytes() {
        let index = HashIndex::new(4);
        assert_eq!(index.bucket(0), 0);
        assert_eq!(index.bucket(1), 1);
        assert_eq!(index.bucket(4), 0);
        // 0x100 folds to 1 through the `tag >> 8` term
        assert_eq!(index.bucket(0x100), 1);
    }

    #[test]
    fn test_insert_get_remove() {
        // tags 0, 4, 8 collide in a 4 bucket index
        let mut lines = lines(&[0, 4, 8, 1]);
        let mut index = HashIndex::new(4);
        for way in 0..lines.len() {
            index.insert(&mut lines, way);
        }
        assert_eq!(index.len(&lines), 4);
        assert_eq!(index.chain(&lines, 0).collect::<Vec<_>>(), vec![2, 1, 0]);

        assert_eq!(index.get(&lines, 4), Some(1));
        assert_eq!(index.get(&lines, 1), Some(3));
        assert_eq!(index.get(&lines, 12), None);

        // remove from the middle of a chain
        index.remove(&mut lines, 1);
        assert_eq!(index.get(&lines, 4), None);
        assert_eq!(index.chain(&lines, 0).collect::<Vec<_>>(), vec![2, 0]);

        // remove the chain head
        index.remove(&mut lines, 2);
        assert_eq!(index.chain(&lines, 0).collect::<Vec<_>>(), vec![0]);
        assert_eq!(index.get(&lines, 0), Some(0));
        assert_eq!(index.len(&lines), 2);
    }

    #[test]
    fn test_get_skips_invalid_blocks() {
        let mut lines = lines(&[3]);
        let mut index = HashIndex::new(2);
        index.insert(&mut lines, 0);
        lines[0].invalidate();
        assert_eq!(index.get(&lines, 3), None);
    }

    #[test]
    #[should_panic(expected = "not linked")]
    fn test_remove_unlinked_way_panics() {
        let mut lines = lines(&[0, 1]);
        let mut index = HashIndex::new(2);
        index.insert(&mut lines, 0);
        index.remove(&mut lines, 1);
    }
}
