use crate::cache::{
    block::{Block, BlockId, BlockRef},
    decode::{AddressTranslation, Decoded, Linear},
    replacement::ReplacementPolicy,
    set::Set,
};
use crate::{address, config};

/// Block storage of a cache.
///
/// All `num_sets x assoc` blocks live in one arena; set `s` owns the
/// blocks `s * assoc .. (s + 1) * assoc`. Block data and user data live in
/// two further arenas with the same layout.
#[derive(Debug, Clone)]
pub struct TagArray<T = Linear> {
    lines: Vec<Block>,
    sets: Vec<Set>,
    data: Vec<u8>,
    user_data: Vec<u8>,
    associativity: usize,
    block_size: usize,
    user_data_size: usize,
    addr_translation: T,
}

impl TagArray<Linear> {
    pub fn new(config: &config::Cache) -> Result<Self, config::ConfigError> {
        config.validate()?;
        let num_blocks = config.total_blocks();
        let block_size = config.block_size as usize;

        let lines = vec![Block::default(); num_blocks];
        let sets = (0..config.num_sets)
            .map(|_| Set::new(config.hash_buckets()))
            .collect();
        let data = if config.allocate_data {
            vec![0; num_blocks * block_size]
        } else {
            Vec::new()
        };
        let user_data = vec![0; num_blocks * config.user_data_size];

        Ok(Self {
            lines,
            sets,
            data,
            user_data,
            associativity: config.associativity,
            block_size,
            user_data_size: config.user_data_size,
            addr_translation: Linear::new(config.num_sets, config.block_size),
        })
    }
}

impl<T> TagArray<T>
where
    T: AddressTranslation,
{
    #[inline]
    #[must_use]
    pub fn addr_translation(&self) -> &T {
        &self.addr_translation
    }

    #[inline]
    #[must_use]
    pub fn decode(&self, addr: address) -> Decoded {
        self.addr_translation.decode(addr)
    }

    /// The maximum number of blocks this array can hold.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.lines.len()
    }

    #[inline]
    #[must_use]
    pub fn num_sets(&self) -> usize {
        self.sets.len()
    }

    #[inline]
    #[must_use]
    pub fn get_set(&self, set: usize) -> &Set {
        &self.sets[set]
    }

    #[inline]
    #[must_use]
    pub fn get_block(&self, id: BlockId) -> &Block {
        &self.lines[id]
    }

    #[inline]
    #[must_use]
    pub fn set_of(&self, id: BlockId) -> usize {
        id / self.associativity
    }

    /// Block address of the tag currently held by a block.
    #[inline]
    #[must_use]
    pub fn block_addr(&self, id: BlockId) -> address {
        self.addr_translation
            .block_addr_of(self.lines[id].tag, self.set_of(id))
    }

    #[inline]
    fn set_lines(&self, set: usize) -> &[Block] {
        let start = set * self.associativity;
        &self.lines[start..start + self.associativity]
    }

    #[inline]
    fn set_mut(&mut self, set: usize) -> (&mut Set, &mut [Block]) {
        let start = set * self.associativity;
        (
            &mut self.sets[set],
            &mut self.lines[start..start + self.associativity],
        )
    }

    #[inline]
    fn id(&self, set: usize, way: usize) -> BlockId {
        set * self.associativity + way
    }

    #[inline]
    fn way(&self, id: BlockId) -> usize {
        id % self.associativity
    }

    /// Finds the valid block for a decoded address.
    #[inline]
    #[must_use]
    pub fn find(&self, decoded: &Decoded) -> Option<BlockId> {
        let set = decoded.set;
        self.sets[set]
            .find(self.set_lines(set), decoded.tag)
            .map(|way| self.id(set, way))
    }

    /// Finds the valid block by scanning the way list.
    #[must_use]
    pub fn find_linear(&self, decoded: &Decoded) -> Option<BlockId> {
        let set = decoded.set;
        self.sets[set]
            .find_linear(self.set_lines(set), decoded.tag)
            .map(|way| self.id(set, way))
    }

    /// Checks if the block holding `addr` is present.
    #[must_use]
    pub fn probe(&self, addr: address) -> bool {
        self.find(&self.decode(addr)).is_some()
    }

    /// Blocks of a set from the most to the least recently placed.
    #[must_use]
    pub fn way_order(&self, set: usize) -> Vec<BlockId> {
        self.sets[set]
            .ways(self.set_lines(set))
            .map(|way| self.id(set, way))
            .collect()
    }

    /// Repositions a block after a hit.
    #[inline]
    pub fn touch(&mut self, id: BlockId, policy: ReplacementPolicy) {
        let (set, way) = (self.set_of(id), self.way(id));
        let (set, lines) = self.set_mut(set);
        policy.on_hit(set, lines, way);
    }

    /// Chooses the block to replace in a set.
    ///
    /// Never-filled blocks are used before the policy is consulted.
    pub fn victim(
        &mut self,
        set: usize,
        policy: ReplacementPolicy,
        seed: u64,
        block_addr: address,
        count: u64,
    ) -> BlockId {
        let assoc = self.associativity;
        let (set_ref, lines) = self.set_mut(set);
        let way = match set_ref.take_unused(lines) {
            Some(way) => way,
            None => policy.victim(set_ref, assoc, seed, block_addr, count),
        };
        self.id(set, way)
    }

    /// Installs a new tag in a block chosen by [`TagArray::victim`].
    pub fn install(
        &mut self,
        id: BlockId,
        tag: address,
        is_write: bool,
        ready: u64,
        policy: ReplacementPolicy,
    ) {
        let (set, way) = (self.set_of(id), self.way(id));
        let (set, lines) = self.set_mut(set);
        if lines[way].is_valid() {
            set.unlink_hash(lines, way);
        }
        lines[way].allocate(tag, is_write, ready);
        set.link_hash(lines, way);
        policy.on_fill(set, lines, way);
    }

    /// Next way of the same set, wrapping around.
    #[inline]
    #[must_use]
    pub fn next_in_set(&self, id: BlockId) -> BlockId {
        let set = self.set_of(id);
        self.id(set, (self.way(id) + 1) % self.associativity)
    }

    #[inline]
    pub fn set_ready(&mut self, id: BlockId, ready: u64) {
        self.lines[id].ready = ready;
    }

    #[inline]
    pub fn set_modified(&mut self, id: BlockId) {
        self.lines[id].set_modified();
    }

    /// Invalidates a block and moves it to the tail of its way list.
    pub fn invalidate(&mut self, id: BlockId) {
        let (set, way) = (self.set_of(id), self.way(id));
        let (set, lines) = self.set_mut(set);
        if lines[way].is_valid() {
            set.unlink_hash(lines, way);
        }
        lines[way].invalidate();
        set.move_to_tail(lines, way);
    }

    /// Contents of a block, if data is allocated.
    #[must_use]
    pub fn block_data(&self, id: BlockId) -> Option<&[u8]> {
        if self.data.is_empty() {
            return None;
        }
        let start = id * self.block_size;
        Some(&self.data[start..start + self.block_size])
    }

    #[must_use]
    pub fn block_data_mut(&mut self, id: BlockId) -> Option<&mut [u8]> {
        if self.data.is_empty() {
            return None;
        }
        let start = id * self.block_size;
        Some(&mut self.data[start..start + self.block_size])
    }

    #[must_use]
    pub fn user_data_mut(&mut self, id: BlockId) -> Option<&mut [u8]> {
        if self.user_data_size == 0 {
            return None;
        }
        let start = id * self.user_data_size;
        Some(&mut self.user_data[start..start + self.user_data_size])
    }

    /// View of a block for a miss handler.
    pub fn block_ref(&mut self, id: BlockId) -> BlockRef<'_> {
        let line = &self.lines[id];
        let data = if self.data.is_empty() {
            None
        } else {
            let start = id * self.block_size;
            Some(&mut self.data[start..start + self.block_size])
        };
        let user_data = if self.user_data_size == 0 {
            None
        } else {
            let start = id * self.user_data_size;
            Some(&mut self.user_data[start..start + self.user_data_size])
        };
        BlockRef {
            tag: line.tag,
            status: line.status,
            ready: line.ready,
            data,
            user_data,
        }
    }

    /// Checks that every hash index holds exactly the valid blocks of its
    /// set.
    #[must_use]
    pub fn hash_index_consistent(&self) -> bool {
        (0..self.num_sets()).all(|set| {
            let lines = self.set_lines(set);
            let Some(hash) = self.sets[set].hash() else {
                return true;
            };
            let valid = lines.iter().filter(|line| line.is_valid()).count();
            hash.len(lines) == valid
                && lines
                    .iter()
                    .enumerate()
                    .filter(|(_, line)| line.is_valid())
                    .all(|(way, line)| hash.get(lines, line.tag) == Some(way))
        })
    }
}
