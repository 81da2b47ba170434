use crate::engine::EnginePolicy;
use crate::error::BenchError;
use serde::Deserialize;
use std::path::Path;

/// Width of the numeric identifier each key is encoded from.
pub const KEY_WIDTH: u64 = size_of::<u64>() as u64;

/// Keys carry the low 56 bits of the identifier plus a terminator.
const MAX_ENTRIES: u64 = 1 << 56;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeDistribution {
    #[default]
    Uniform,
    Zipf,
}

/// Options of a single benchmark run. Any option missing from the config file
/// keeps its default.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    /// Smallest entry, key included
    pub entry_min_size: u64,
    /// Largest entry, key included
    pub entry_max_size: u64,
    /// Size of the working set
    pub nentries: u64,
    /// Timed operations
    pub nops: u64,
    pub pct_get: u64,
    pub pct_put: u64,
    pub pct_rem: u64,
    pub seed: u64,
    /// Shuffle the live generation every time it is rotated in
    pub shuffle: bool,
    pub entry_size_dist: SizeDistribution,
    /// Eviction policy of engines that evict
    pub engine_policy: EnginePolicy,
}

impl Default for BenchConfig {
    fn default() -> Self {
        BenchConfig {
            entry_min_size: 64,
            entry_max_size: 64,
            nentries: 1000,
            nops: 100_000,
            pct_get: 80,
            pct_put: 10,
            pct_rem: 10,
            seed: 1234,
            shuffle: false,
            entry_size_dist: SizeDistribution::Uniform,
            engine_policy: EnginePolicy::Expire,
        }
    }
}

impl BenchConfig {
    /// Defaults, overridden by the TOML file at `path` when one is given.
    pub fn load(path: Option<&Path>) -> Result<Self, BenchError> {
        let Some(path) = path else {
            return Ok(BenchConfig::default());
        };

        let text = std::fs::read_to_string(path).map_err(|source| BenchError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| BenchError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), BenchError> {
        if self.entry_min_size <= KEY_WIDTH {
            return Err(BenchError::config(format!(
                "entry_min_size must be larger than {KEY_WIDTH}, got {}",
                self.entry_min_size
            )));
        }
        if self.entry_max_size < self.entry_min_size {
            return Err(BenchError::config(format!(
                "entry_max_size ({}) is smaller than entry_min_size ({})",
                self.entry_max_size, self.entry_min_size
            )));
        }
        if usize::try_from(self.entry_max_size).is_err() {
            return Err(BenchError::config(format!(
                "entry_max_size {} does not fit in memory",
                self.entry_max_size
            )));
        }
        if self.nentries == 0 || self.nentries >= MAX_ENTRIES {
            return Err(BenchError::config(format!(
                "nentries must be in 1..{MAX_ENTRIES}, got {}",
                self.nentries
            )));
        }

        match self.total_weight() {
            Some(0) => Err(BenchError::config("pct_get, pct_put and pct_rem are all zero")),
            Some(_) => Ok(()),
            None => Err(BenchError::config("operation weights overflow")),
        }
    }

    /// Sum of the get/put/remove weights, `None` on overflow.
    pub fn total_weight(&self) -> Option<u64> {
        self.pct_get
            .checked_add(self.pct_put)?
            .checked_add(self.pct_rem)
    }
}
