mod mem_hash;
mod redb;
mod sled;

pub use self::mem_hash::MemHash;
pub use self::redb::Redb;
pub use self::sled::Sled;

use crate::config::BenchConfig;
use crate::entry::Entry;
use crate::error::BenchError;
use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Per-item bookkeeping the engine stores next to key and value.
pub const ITEM_OVERHEAD: usize = 24;

/// Entries never expire during a run.
pub const ENTRY_TTL: Duration = Duration::from_secs(i32::MAX as u64);

/// What an engine drops when it runs out of room for a new item.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnginePolicy {
    Random,
    /// Earliest-expiring item first.
    #[default]
    Expire,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EngineOptions {
    pub policy: EnginePolicy,
    /// Largest item accepted, overhead included.
    pub item_size: usize,
    /// Item capacity.
    pub nitem: usize,
    /// Seeds any randomness inside the engine, such as random eviction.
    pub seed: u64,
}

impl EngineOptions {
    pub fn for_config(config: &BenchConfig) -> Result<Self, BenchError> {
        let item_size = usize::try_from(config.entry_max_size)
            .ok()
            .and_then(|max| max.checked_add(ITEM_OVERHEAD))
            .ok_or_else(|| BenchError::config("entry_max_size is too large"))?;
        let nitem = usize::try_from(config.nentries)
            .map_err(|_| BenchError::config("nentries is too large"))?;

        Ok(EngineOptions {
            policy: config.engine_policy,
            item_size,
            nitem,
            seed: config.seed,
        })
    }
}

/// The storage engine under test.
pub trait Engine: Sized {
    const NAME: &'static str;

    fn setup(options: &EngineOptions) -> Result<Self>;
    /// `Ok(false)` when the engine has no room for the item.
    fn insert(&mut self, key: &[u8], value: &[u8], ttl: Duration) -> Result<bool>;
    /// `Ok(false)` when the key is absent.
    fn lookup(&mut self, key: &[u8]) -> Result<bool>;
    /// `Ok(false)` when the key is absent.
    fn delete(&mut self, key: &[u8]) -> Result<bool>;
    fn teardown(self) -> Result<()>;
}

/// Why a single put/get/remove did not succeed. Never fatal to a run.
#[derive(Debug, Error)]
pub enum OpFailure {
    #[error("insert failed, engine is out of room")]
    InsertFailure,
    #[error("key not found")]
    NotFound,
    #[error("engine error: {0:#}")]
    Engine(anyhow::Error),
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineMetrics {
    pub insert: u64,
    pub insert_ex: u64,
    pub lookup: u64,
    pub lookup_miss: u64,
    pub delete: u64,
    pub delete_miss: u64,
}

impl EngineMetrics {
    pub fn calls(&self) -> u64 {
        self.insert + self.lookup + self.delete
    }

    pub fn failures(&self) -> u64 {
        self.insert_ex + self.lookup_miss + self.delete_miss
    }
}

/// Runs put/get/remove on entries against an engine and counts the outcomes.
pub struct EngineAdapter<E: Engine> {
    engine: E,
    metrics: EngineMetrics,
}

impl<E: Engine> EngineAdapter<E> {
    pub fn initialize(config: &BenchConfig) -> Result<Self, BenchError> {
        let options = EngineOptions::for_config(config)?;
        info!(
            "starting {} engine: policy {:?}, item size {}, capacity {}",
            E::NAME,
            options.policy,
            options.item_size,
            options.nitem
        );
        let engine = E::setup(&options).map_err(BenchError::EngineSetup)?;
        Ok(EngineAdapter {
            engine,
            metrics: EngineMetrics::default(),
        })
    }

    #[inline]
    pub fn put(&mut self, entry: &Entry) -> Result<(), OpFailure> {
        self.metrics.insert += 1;
        match self.engine.insert(entry.key(), entry.value(), ENTRY_TTL) {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.metrics.insert_ex += 1;
                Err(OpFailure::InsertFailure)
            }
            Err(e) => {
                self.metrics.insert_ex += 1;
                Err(OpFailure::Engine(e))
            }
        }
    }

    #[inline]
    pub fn get(&mut self, entry: &Entry) -> Result<(), OpFailure> {
        self.metrics.lookup += 1;
        let found = self.engine.lookup(entry.key());
        Self::found(found, &mut self.metrics.lookup_miss)
    }

    #[inline]
    pub fn remove(&mut self, entry: &Entry) -> Result<(), OpFailure> {
        self.metrics.delete += 1;
        let found = self.engine.delete(entry.key());
        Self::found(found, &mut self.metrics.delete_miss)
    }

    fn found(res: Result<bool>, miss: &mut u64) -> Result<(), OpFailure> {
        match res {
            Ok(true) => Ok(()),
            Ok(false) => {
                *miss += 1;
                Err(OpFailure::NotFound)
            }
            Err(e) => {
                *miss += 1;
                Err(OpFailure::Engine(e))
            }
        }
    }

    #[cfg(test)]
    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    #[cfg(test)]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn shutdown(self) -> Result<EngineMetrics, BenchError> {
        debug!("{} engine metrics: {:?}", E::NAME, self.metrics);
        self.engine.teardown().map_err(BenchError::EngineTeardown)?;
        info!("{} engine torn down", E::NAME);
        Ok(self.metrics)
    }
}
