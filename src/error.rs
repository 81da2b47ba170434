use crate::engine::OpFailure;
use crate::workload::{OpKind, PoolKind};
use std::collections::TryReserveError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("failed to open config file {}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("failed to allocate {what}")]
    Allocation {
        what: &'static str,
        #[source]
        source: TryReserveError,
    },

    #[error("failed to start storage engine")]
    EngineSetup(#[source] anyhow::Error),

    #[error("failed to tear down storage engine")]
    EngineTeardown(#[source] anyhow::Error),

    /// Every entry must be resident before the timed loop starts.
    #[error("warm-up insert of entry {index} failed")]
    WarmUp {
        index: usize,
        #[source]
        source: OpFailure,
    },

    /// The operation mix drained a pool the selected operation needs.
    #[error("{op} requires a non-empty {pool} pool")]
    EmptyPool { op: OpKind, pool: PoolKind },
}

impl BenchError {
    pub fn config(msg: impl Into<String>) -> Self {
        BenchError::Configuration(msg.into())
    }
}
