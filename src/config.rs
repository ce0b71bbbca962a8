use crate::cache::{prefetch::Prefetch, replacement::ReplacementPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Smallest supported block size in bytes.
pub const MIN_BLOCK_SIZE: u32 = 8;

/// Associativity above which sets are indexed by a hash table.
pub const HIGHLY_ASSOC: usize = 4;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cache {name:?}: number of sets must be a non-zero power of two (got {num_sets})")]
    NumSets { name: String, num_sets: usize },
    #[error("cache {name:?}: block size must be a power of two of at least 8 bytes (got {block_size})")]
    BlockSize { name: String, block_size: u32 },
    #[error("cache {name:?}: associativity must be a non-zero power of two (got {associativity})")]
    Associativity { name: String, associativity: usize },
    #[error("cache {name:?}: {bits} set and block offset bits do not fit a 64 bit address")]
    AddressBits { name: String, bits: u32 },
    #[error("cache {name:?}: next level {next:?} has {next_block_size} byte blocks, fewer than {block_size}")]
    NextLevelBlockSize {
        name: String,
        block_size: u32,
        next: String,
        next_block_size: u32,
    },
    #[error("unknown replacement policy {0:?} (expected one of `l`, `f`, `r`)")]
    ReplacementPolicy(char),
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("could not open cache config {path:?}")]
    OpenFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] serde_yaml::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Cache configuration.
///
/// The geometry is fixed for the lifetime of a cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Cache {
    /// Name used in reports and logs.
    pub name: String,
    /// Number of sets.
    pub num_sets: usize, // 128
    /// Block size in bytes.
    pub block_size: u32, // 32
    /// Number of ways per set.
    pub associativity: usize, // 4
    /// Keep a copy of the block contents in the cache.
    pub allocate_data: bool, // false
    /// Bytes of opaque user data attached to each block.
    pub user_data_size: usize, // 0
    pub replacement_policy: ReplacementPolicy, // LRU
    /// Latency of a hit in cycles.
    pub hit_latency: u64, // 1
    pub prefetch: Prefetch, // DISABLED
    /// Sets with a higher associativity use a hashed tag index.
    pub hash_threshold: usize, // 4
    /// Seed of the random replacement policy.
    pub random_seed: u64, // 0
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            name: "dl1".to_string(),
            num_sets: 128,
            block_size: 32,
            associativity: 4,
            allocate_data: false,
            user_data_size: 0,
            replacement_policy: ReplacementPolicy::LRU,
            hit_latency: 1,
            prefetch: Prefetch::DISABLED,
            hash_threshold: HIGHLY_ASSOC,
            random_seed: 0,
        }
    }
}

impl Cache {
    /// Checks the cache geometry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = self.name.clone();
        if !self.num_sets.is_power_of_two() {
            return Err(ConfigError::NumSets {
                name,
                num_sets: self.num_sets,
            });
        }
        if !self.block_size.is_power_of_two() || self.block_size < MIN_BLOCK_SIZE {
            return Err(ConfigError::BlockSize {
                name,
                block_size: self.block_size,
            });
        }
        if !self.associativity.is_power_of_two() {
            return Err(ConfigError::Associativity {
                name,
                associativity: self.associativity,
            });
        }
        let bits = self.block_size_log2() + self.num_sets_log2();
        if bits >= u64::BITS {
            return Err(ConfigError::AddressBits { name, bits });
        }
        Ok(())
    }

    /// Parses and validates a YAML cache config.
    pub fn from_yaml(yaml: &str) -> Result<Self, LoadError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a YAML cache config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| LoadError::OpenFile {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_reader(std::io::BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    #[inline]
    #[must_use]
    pub fn total_blocks(&self) -> usize {
        self.num_sets * self.associativity
    }

    /// Capacity in bytes, excluding user data.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.total_blocks() as u64 * u64::from(self.block_size)
    }

    #[inline]
    #[must_use]
    pub fn block_size_log2(&self) -> u32 {
        self.block_size.ilog2()
    }

    #[inline]
    #[must_use]
    pub fn num_sets_log2(&self) -> u32 {
        self.num_sets.ilog2()
    }

    #[inline]
    #[must_use]
    pub fn is_highly_associative(&self) -> bool {
        self.associativity > self.hash_threshold
    }

    /// Number of hash buckets per set, if sets are hashed.
    ///
    /// One bucket per four ways keeps probe chains short.
    #[inline]
    #[must_use]
    pub fn hash_buckets(&self) -> Option<usize> {
        self.is_highly_associative()
            .then(|| (self.associativity / 4).next_power_of_two())
    }
}
