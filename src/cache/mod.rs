pub mod block;
pub mod decode;
pub mod handler;
pub mod hash;
pub mod prefetch;
pub mod replacement;
pub mod set;

pub use block::{Block, BlockId, BlockRef, Status};
pub use handler::{from_fn, MainMemory, MissHandler, NextLevel};
pub use prefetch::Prefetch;
pub use replacement::ReplacementPolicy;

use crate::{address, config, tag_array::TagArray};
use decode::Decoded;
use serde::{Deserialize, Serialize};

/// Memory command.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    READ,
    WRITE,
}

impl Command {
    #[inline]
    #[must_use]
    pub fn is_write(self) -> bool {
        self == Self::WRITE
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum RequestStatus {
    HIT = 0,
    MISS,
}

/// A valid block that was replaced by a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EvictedBlock {
    pub block_addr: address,
    /// The block was written back to the next level.
    pub dirty: bool,
}

/// Outcome of a cache access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Access {
    pub status: RequestStatus,
    /// Latency in cycles, relative to the access time.
    pub latency: u64,
    /// The block holding the accessed address.
    ///
    /// Only valid until the next access. A prefetch issued by this access
    /// never replaces it, unless sets have a single way.
    pub block: BlockId,
    pub evicted: Option<EvictedBlock>,
}

impl Access {
    #[inline]
    #[must_use]
    pub fn is_hit(&self) -> bool {
        self.status == RequestStatus::HIT
    }
}

/// Most recently resolved block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct LastAccess {
    tagset: address,
    block: BlockId,
}

/// A set-associative cache.
///
/// Misses and writebacks are serviced by the miss handler `H`.
#[derive(Debug)]
pub struct Cache<H> {
    name: String,
    config: config::Cache,
    tag_array: TagArray,
    handler: H,
    /// Earliest time the bus to the next level is free.
    bus_free: u64,
    stats: stats::Cache,
    prefetcher: prefetch::Controller,
    last: Option<LastAccess>,
    num_accesses: u64,
}

impl<H> Cache<H> {
    pub fn new(config: config::Cache, handler: H) -> Result<Self, config::ConfigError> {
        let tag_array = TagArray::new(&config)?;
        log::debug!(
            "{}: created {} sets x {} ways x {} bytes ({:?}, hashed={})",
            config.name,
            config.num_sets,
            config.associativity,
            config.block_size,
            config.replacement_policy,
            config.is_highly_associative(),
        );
        Ok(Self {
            name: config.name.clone(),
            prefetcher: prefetch::Controller::new(config.prefetch),
            config,
            tag_array,
            handler,
            bus_free: 0,
            stats: stats::Cache::default(),
            last: None,
            num_accesses: 0,
        })
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &config::Cache {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn stats(&self) -> &stats::Cache {
        &self.stats
    }

    #[inline]
    #[must_use]
    pub fn tag_array(&self) -> &TagArray {
        &self.tag_array
    }

    #[inline]
    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    #[inline]
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    #[inline]
    #[must_use]
    pub fn bus_free(&self) -> u64 {
        self.bus_free
    }

    #[inline]
    #[must_use]
    pub fn in_prefetch(&self) -> bool {
        self.prefetcher.in_prefetch()
    }

    /// Checks if the block holding `addr` is present.
    ///
    /// Probing has no side effects.
    #[must_use]
    pub fn probe(&self, addr: address) -> bool {
        self.tag_array.probe(addr)
    }

    #[must_use]
    pub fn block_data(&self, block: BlockId) -> Option<&[u8]> {
        self.tag_array.block_data(block)
    }

    pub fn user_data_mut(&mut self, block: BlockId) -> Option<&mut [u8]> {
        self.tag_array.user_data_mut(block)
    }

    /// Human readable description of the cache geometry and policies.
    #[must_use]
    pub fn config_report(&self) -> String {
        let config = &self.config;
        let name = &self.name;
        let data = if config.allocate_data {
            "data allocated"
        } else {
            "no data"
        };
        let index = match config.hash_buckets() {
            Some(buckets) => format!("hashed tag lookup ({buckets} buckets/set)"),
            None => "linear tag lookup".to_string(),
        };
        format!(
            "cache: {name}: {} sets, {} byte blocks, {} bytes user data/block, {data}\n\
             cache: {name}: {}-way, `{}' replacement policy, write-back, {} cycle hit latency\n\
             cache: {name}: {} total, {index}, prefetch {:?}\n",
            config.num_sets,
            config.block_size,
            config.user_data_size,
            config.associativity,
            config.replacement_policy,
            config.hit_latency,
            human_bytes::human_bytes(config.capacity() as f64),
            config.prefetch,
        )
    }

    /// Human readable statistics.
    #[must_use]
    pub fn stats_report(&self) -> String {
        self.stats.report(&self.name).to_string()
    }
}

impl<H> Cache<H>
where
    H: MissHandler,
{
    /// Accesses `nbytes` at `addr` at time `now`.
    ///
    /// If `buf` is given and the cache holds data, `nbytes` are copied from
    /// the block into `buf` (`READ`) or from `buf` into the block (`WRITE`).
    ///
    /// # Panics
    /// If the access is misaligned or spans more than one block.
    pub fn access(
        &mut self,
        cmd: Command,
        addr: address,
        nbytes: u32,
        buf: Option<&mut [u8]>,
        now: u64,
    ) -> Access {
        let block_size = self.config.block_size;
        assert!(
            nbytes.is_power_of_two() && addr % u64::from(nbytes) == 0,
            "{}: bad access size or alignment (addr={addr:#x}, size={nbytes})",
            self.name
        );
        let offset = self.tag_array.addr_translation().block_offset(addr);
        assert!(
            offset + nbytes as usize <= block_size as usize,
            "{}: access spans blocks (addr={addr:#x}, size={nbytes}, block size={block_size})",
            self.name
        );

        let is_prefetch = self.prefetcher.in_prefetch();
        self.num_accesses += 1;
        let decoded = self.tag_array.decode(addr);

        let access = match self.lookup(&decoded) {
            Some(block) => self.hit(cmd, block, decoded.tagset, now, is_prefetch),
            None => self.miss(cmd, &decoded, now, is_prefetch),
        };

        if let Some(buf) = buf {
            assert_eq!(buf.len(), nbytes as usize, "buffer must hold the access");
            self.copy_data(cmd, access.block, offset, buf);
        }

        log::trace!(
            "{}::access({:?}, addr={}, size={}, time={}, prefetch={}) => {:?} latency={} evicted={:?}",
            self.name,
            cmd,
            addr,
            nbytes,
            now,
            is_prefetch,
            access.status,
            access.latency,
            access.evicted,
        );

        if !is_prefetch {
            self.prefetch(access.status, decoded.block_addr, access.block, now);
        }
        access
    }

    /// Resolves a decoded address, checking the last resolved block first.
    #[inline]
    fn lookup(&self, decoded: &Decoded) -> Option<BlockId> {
        if let Some(last) = self.last {
            let line = self.tag_array.get_block(last.block);
            if last.tagset == decoded.tagset && line.is_valid() && line.tag == decoded.tag {
                return Some(last.block);
            }
        }
        self.tag_array.find(decoded)
    }

    fn hit(
        &mut self,
        cmd: Command,
        block: BlockId,
        tagset: address,
        now: u64,
        is_prefetch: bool,
    ) -> Access {
        if cmd.is_write() {
            self.tag_array.set_modified(block);
        }
        self.tag_array.touch(block, self.config.replacement_policy);
        if !is_prefetch {
            self.stats.hits += 1;
        }
        self.last = Some(LastAccess { tagset, block });

        // the block may still be in flight
        let ready = self.tag_array.get_block(block).ready;
        Access {
            status: RequestStatus::HIT,
            latency: ready.saturating_sub(now) + self.config.hit_latency,
            block,
            evicted: None,
        }
    }

    fn miss(&mut self, cmd: Command, decoded: &Decoded, now: u64, is_prefetch: bool) -> Access {
        let policy = self.config.replacement_policy;
        let block_size = self.config.block_size;
        if is_prefetch {
            self.stats.prefetches += 1;
        } else {
            self.stats.misses += 1;
        }

        let mut victim = self.tag_array.victim(
            decoded.set,
            policy,
            self.config.random_seed,
            decoded.block_addr,
            self.num_accesses,
        );
        if is_prefetch && self.prefetcher.demand_block() == Some(victim) {
            // keep the block of the triggering demand access
            victim = self.tag_array.next_in_set(victim);
        }
        let line = self.tag_array.get_block(victim);
        let (victim_valid, victim_dirty, victim_ready) =
            (line.is_valid(), line.is_modified(), line.ready);

        let mut lat = 0;
        let mut evicted = None;
        if victim_valid {
            if !is_prefetch {
                self.stats.replacements += 1;
            }
            evicted = Some(EvictedBlock {
                block_addr: self.tag_array.block_addr(victim),
                dirty: victim_dirty,
            });
            // wait for an outstanding fill of the victim
            lat += victim_ready.saturating_sub(now);
        }

        // wait for the bus to the next level
        lat += self.bus_free.saturating_sub(now + lat);
        self.bus_free = now + lat + 1 + u64::from(victim_dirty);

        if let Some(EvictedBlock {
            block_addr,
            dirty: true,
        }) = evicted
        {
            self.stats.writebacks += 1;
            lat += self.handler.access(
                Command::WRITE,
                block_addr,
                block_size,
                self.tag_array.block_ref(victim),
                now + lat,
            );
        }

        // fills always read, the handler sees the new tag and status
        self.tag_array
            .install(victim, decoded.tag, cmd.is_write(), now + lat, policy);
        lat += self.handler.access(
            Command::READ,
            decoded.block_addr,
            block_size,
            self.tag_array.block_ref(victim),
            now + lat,
        );
        self.tag_array.set_ready(victim, now + lat);
        self.last = Some(LastAccess {
            tagset: decoded.tagset,
            block: victim,
        });

        Access {
            status: RequestStatus::MISS,
            latency: self.config.hit_latency + lat,
            block: victim,
            evicted,
        }
    }

    fn copy_data(&mut self, cmd: Command, block: BlockId, offset: usize, buf: &mut [u8]) {
        let Some(data) = self.tag_array.block_data_mut(block) else {
            return;
        };
        let data = &mut data[offset..offset + buf.len()];
        match cmd {
            Command::READ => buf.copy_from_slice(data),
            Command::WRITE => data.copy_from_slice(buf),
        }
    }

    /// Prefetches the block following a demand access.
    fn prefetch(&mut self, status: RequestStatus, block_addr: address, block: BlockId, now: u64) {
        let block_size = self.config.block_size;
        let Some(target) = self.prefetcher.begin(status, block_addr, block_size, block) else {
            return;
        };
        if !self.probe(target) {
            let access = self.access(Command::READ, target, block_size, None, now);
            log::trace!(
                "{}::prefetch(block_addr={}, time={}) => latency={}",
                self.name,
                target,
                now,
                access.latency
            );
        }
        self.prefetcher.end();
    }

    /// Writes back and invalidates all blocks.
    ///
    /// # Returns
    /// The total writeback latency.
    pub fn flush(&mut self, now: u64) -> u64 {
        let mut lat = 0;
        for block in 0..self.tag_array.size() {
            lat += self.flush_block(block, now + lat);
        }
        log::debug!(
            "{}::flush(time={}) => {} cycles ({} writebacks, {} invalidations so far)",
            self.name,
            now,
            lat,
            self.stats.writebacks,
            self.stats.invalidations
        );
        lat
    }

    /// Writes back and invalidates the block holding `addr`, if present.
    ///
    /// # Returns
    /// The writeback latency.
    pub fn flush_addr(&mut self, addr: address, now: u64) -> u64 {
        let decoded = self.tag_array.decode(addr);
        match self.tag_array.find(&decoded) {
            Some(block) => self.flush_block(block, now),
            None => 0,
        }
    }

    fn flush_block(&mut self, block: BlockId, now: u64) -> u64 {
        let line = self.tag_array.get_block(block);
        if !line.is_valid() {
            return 0;
        }
        let dirty = line.is_modified();
        self.stats.invalidations += 1;

        let mut lat = 0;
        if dirty {
            self.stats.writebacks += 1;
            let block_addr = self.tag_array.block_addr(block);
            lat += self.handler.access(
                Command::WRITE,
                block_addr,
                self.config.block_size,
                self.tag_array.block_ref(block),
                now,
            );
        }
        self.tag_array.invalidate(block);
        if self.last.is_some_and(|last| last.block == block) {
            self.last = None;
        }
        lat
    }
}
