use crate::config::BenchConfig;
use crate::error::BenchError;
use rand::Rng;
use std::fmt::{Display, Formatter};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
    Get,
    Put,
    Remove,
}

impl Display for OpKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OpKind::Get => "get",
            OpKind::Put => "put",
            OpKind::Remove => "remove",
        })
    }
}

/// Picks an operation kind by cumulative weight. A roll in `[0, total)` maps
/// to get on `[0, get)`, put on `[get, get + put)` and remove on the rest.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OpMix {
    get: u64,
    put: u64,
    total: u64,
}

impl OpMix {
    pub fn new(pct_get: u64, pct_put: u64, pct_rem: u64) -> Result<Self, BenchError> {
        let total = pct_get
            .checked_add(pct_put)
            .and_then(|s| s.checked_add(pct_rem))
            .ok_or_else(|| BenchError::config("operation weights overflow"))?;
        if total == 0 {
            return Err(BenchError::config("pct_get, pct_put and pct_rem are all zero"));
        }

        Ok(OpMix {
            get: pct_get,
            put: pct_put,
            total,
        })
    }

    pub fn from_config(config: &BenchConfig) -> Result<Self, BenchError> {
        OpMix::new(config.pct_get, config.pct_put, config.pct_rem)
    }

    #[cfg(test)]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// `roll` must be below `total()`.
    pub fn select(&self, roll: u64) -> OpKind {
        debug_assert!(roll < self.total);
        if roll < self.get {
            OpKind::Get
        } else if roll - self.get < self.put {
            OpKind::Put
        } else {
            OpKind::Remove
        }
    }

    pub fn draw<R: Rng>(&self, rng: &mut R) -> OpKind {
        self.select(rng.random_range(0..self.total))
    }
}
