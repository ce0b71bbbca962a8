use super::{block::BlockRef, Cache, Command};
use crate::{address, config};
use serde::{Deserialize, Serialize};

/// Services block fills and writebacks of a cache.
///
/// The handler of one cache may access another cache, which is how
/// multi-level hierarchies are composed.
pub trait MissHandler {
    /// Performs a fill (`READ`) or a writeback (`WRITE`) of the block at
    /// `block_addr`.
    ///
    /// For fills `block` already carries the new tag and status, for
    /// writebacks it still describes the replaced block.
    ///
    /// # Returns
    /// The additional latency in cycles.
    fn access(
        &mut self,
        cmd: Command,
        block_addr: address,
        block_size: u32,
        block: BlockRef<'_>,
        now: u64,
    ) -> u64;
}

impl<H> MissHandler for Box<H>
where
    H: MissHandler + ?Sized,
{
    fn access(
        &mut self,
        cmd: Command,
        block_addr: address,
        block_size: u32,
        block: BlockRef<'_>,
        now: u64,
    ) -> u64 {
        (**self).access(cmd, block_addr, block_size, block, now)
    }
}

/// Handler backed by a closure, see [`from_fn`].
#[derive(Clone)]
pub struct FromFn<F>(F);

impl<F> std::fmt::Debug for FromFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FromFn").finish_non_exhaustive()
    }
}

impl<F> MissHandler for FromFn<F>
where
    F: for<'a> FnMut(Command, address, u32, BlockRef<'a>, u64) -> u64,
{
    fn access(
        &mut self,
        cmd: Command,
        block_addr: address,
        block_size: u32,
        block: BlockRef<'_>,
        now: u64,
    ) -> u64 {
        (self.0)(cmd, block_addr, block_size, block, now)
    }
}

/// Creates a miss handler from a closure.
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: for<'a> FnMut(Command, address, u32, BlockRef<'a>, u64) -> u64,
{
    FromFn(f)
}

/// Main memory with a pipelined chunk transfer.
///
/// A block is transferred in `ceil(block_size / bus_width)` chunks. The
/// first chunk takes `first_chunk_latency` cycles, every further chunk
/// `inter_chunk_latency` cycles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MainMemory {
    pub first_chunk_latency: u64, // 18
    pub inter_chunk_latency: u64, // 2
    /// Bus width in bytes.
    pub bus_width: u32, // 8
    #[serde(skip)]
    pub reads: u64,
    #[serde(skip)]
    pub writes: u64,
}

impl Default for MainMemory {
    fn default() -> Self {
        Self {
            first_chunk_latency: 18,
            inter_chunk_latency: 2,
            bus_width: 8,
            reads: 0,
            writes: 0,
        }
    }
}

impl MainMemory {
    #[must_use]
    pub fn new(first_chunk_latency: u64, inter_chunk_latency: u64, bus_width: u32) -> Self {
        assert!(bus_width > 0, "memory bus width must be positive");
        Self {
            first_chunk_latency,
            inter_chunk_latency,
            bus_width,
            ..Self::default()
        }
    }

    /// Latency of transferring `size` bytes.
    #[inline]
    #[must_use]
    pub fn latency(&self, size: u32) -> u64 {
        // a zero width bus moves one byte per chunk
        let chunks = u64::from(size.div_ceil(self.bus_width.max(1)).max(1));
        self.first_chunk_latency + (chunks - 1) * self.inter_chunk_latency
    }
}

impl MissHandler for MainMemory {
    fn access(
        &mut self,
        cmd: Command,
        block_addr: address,
        block_size: u32,
        _block: BlockRef<'_>,
        now: u64,
    ) -> u64 {
        match cmd {
            Command::READ => self.reads += 1,
            Command::WRITE => self.writes += 1,
        }
        let latency = self.latency(block_size);
        log::trace!(
            "memory::access({:?}, block_addr={}, size={}, time={}) => {} cycles",
            cmd,
            block_addr,
            block_size,
            now,
            latency
        );
        latency
    }
}

/// Forwards misses to a lower level cache.
///
/// The lower level block size must be at least the upper level block size.
/// Only timing is modelled, block contents are not moved between levels.
#[derive(Debug)]
pub struct NextLevel<H> {
    pub cache: Cache<H>,
}

impl<H> NextLevel<H> {
    /// Attaches `cache` below the cache configured by `upper`.
    pub fn new(upper: &config::Cache, cache: Cache<H>) -> Result<Self, config::ConfigError> {
        let next = cache.config();
        if next.block_size < upper.block_size {
            return Err(config::ConfigError::NextLevelBlockSize {
                name: upper.name.clone(),
                block_size: upper.block_size,
                next: next.name.clone(),
                next_block_size: next.block_size,
            });
        }
        Ok(Self { cache })
    }
}

impl<H> MissHandler for NextLevel<H>
where
    H: MissHandler,
{
    fn access(
        &mut self,
        cmd: Command,
        block_addr: address,
        block_size: u32,
        _block: BlockRef<'_>,
        now: u64,
    ) -> u64 {
        self.cache
            .access(cmd, block_addr, block_size, None, now)
            .latency
    }
}
