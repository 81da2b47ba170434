mod config;
mod engine;
mod entry;
mod error;
mod generator;
mod report;
mod workload;

use crate::config::BenchConfig;
use crate::engine::{MemHash, Redb, Sled};
use crate::entry::EntryPool;
use crate::error::BenchError;
use crate::report::Summary;
use crate::workload::run_benchmark;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use thousands::Separable;
use tracing::{Level, info};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Optional TOML config file, defaults are used for anything it omits
    config: Option<PathBuf>,

    #[arg(short = 'e', long, value_enum, default_value_t = EngineType::MemHash)]
    engine: EngineType,

    /// Overrides `seed` from the config file
    #[arg(short = 's', long)]
    seed: Option<u64>,

    /// Shuffle each generation when it is rotated in
    #[arg(long)]
    shuffle: bool,

    #[arg(short = 'l', long, default_value_t = Level::WARN)]
    log_level: Level,
}

#[derive(Copy, Clone, ValueEnum)]
// Update run() when adding new variation
enum EngineType {
    MemHash,
    Redb,
    Sled,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .init();

    let mut config = BenchConfig::load(cli.config.as_deref())?;
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    config.shuffle |= cli.shuffle;
    config.validate()?;
    info!("{:?}", config);

    let entries = EntryPool::populate(&config)?;
    let summary = run(cli.engine, &config, &entries)?;
    println!("{}", summary);
    info!(
        "throughput: {} ops/s",
        (summary.throughput() as u64).separate_with_underscores()
    );

    entries.release();
    Ok(())
}

fn run(
    engine: EngineType,
    config: &BenchConfig,
    entries: &EntryPool,
) -> Result<Summary, BenchError> {
    match engine {
        EngineType::MemHash => run_benchmark::<MemHash>(config, entries),
        EngineType::Redb => run_benchmark::<Redb>(config, entries),
        EngineType::Sled => run_benchmark::<Sled>(config, entries),
    }
}
