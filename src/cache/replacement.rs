use super::{block::Block, set::Set};
use crate::{address, config::ConfigError};
use serde::{Deserialize, Serialize};

/// A cache replacement policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReplacementPolicy {
    LRU,    // l
    FIFO,   // f
    RANDOM, // r
}

impl std::fmt::Display for ReplacementPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::LRU => "LRU",
            Self::FIFO => "FIFO",
            Self::RANDOM => "Random",
        };
        f.write_str(name)
    }
}

impl TryFrom<char> for ReplacementPolicy {
    type Error = ConfigError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c.to_ascii_lowercase() {
            'l' => Ok(Self::LRU),
            'f' => Ok(Self::FIFO),
            'r' => Ok(Self::RANDOM),
            _ => Err(ConfigError::ReplacementPolicy(c)),
        }
    }
}

impl ReplacementPolicy {
    /// Parses the single letter policy names of classic simulator configs.
    pub fn from_char(c: char) -> Result<Self, ConfigError> {
        Self::try_from(c)
    }

    /// Repositions a way after a hit.
    #[inline]
    pub fn on_hit(self, set: &mut Set, lines: &mut [Block], way: usize) {
        if self == Self::LRU {
            set.move_to_head(lines, way);
        }
    }

    /// Repositions a replaced way after it has been refilled.
    ///
    /// Freshly taken ways are already linked at the head.
    #[inline]
    pub fn on_fill(self, set: &mut Set, lines: &mut [Block], way: usize) {
        match self {
            Self::LRU | Self::FIFO => set.move_to_head(lines, way),
            Self::RANDOM => {}
        }
    }

    /// Selects the victim way of a full set.
    ///
    /// The random policy is a pure function of the seed, block address and
    /// access count, so identical traces evict identical blocks.
    #[must_use]
    pub fn victim(self, set: &Set, assoc: usize, seed: u64, block_addr: address, count: u64) -> usize {
        debug_assert_eq!(set.len(), assoc);
        match self {
            Self::LRU | Self::FIFO => set.tail().expect("full set has a tail"),
            Self::RANDOM => (mix(seed, block_addr, count) as usize) & (assoc - 1),
        }
    }
}

/// SplitMix64 finalizer over the seed, block address and access count.
#[inline]
#[must_use]
pub fn mix(seed: u64, block_addr: address, count: u64) -> u64 {
    let mut z = seed
        .wrapping_add(block_addr.wrapping_mul(0x9e37_79b9_7f4a_7c15))
        .wrapping_add(count.rotate_left(32));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
