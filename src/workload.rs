pub mod mix;
pub mod pools;

pub use mix::{OpKind, OpMix};
pub use pools::{EntryPools, PoolKind};

use crate::config::BenchConfig;
use crate::engine::{Engine, EngineAdapter};
use crate::entry::EntryPool;
use crate::error::BenchError;
use crate::report::{Summary, Timer};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::time::Duration;
use thousands::Separable;
use tracing::{error, info};

/// Generates the get/put/remove stream over a rotating set of entries.
///
/// Entries move between three pools: a get or put leaves the entry in
/// `next`, a remove leaves it in `evicted`. Once `current` drains, `next`
/// takes its place, so within a generation no entry is touched twice.
pub struct Workload {
    pools: EntryPools,
    mix: OpMix,
    rng: SmallRng,
    nops: u64,
    shuffle: bool,
}

impl Workload {
    pub fn new(config: &BenchConfig) -> Result<Self, BenchError> {
        Ok(Workload {
            pools: EntryPools::default(),
            mix: OpMix::from_config(config)?,
            // entry sizes draw from `seed` itself
            rng: SmallRng::seed_from_u64(config.seed.wrapping_add(1)),
            nops: config.nops,
            shuffle: config.shuffle,
        })
    }

    /// Untimed warm-up: puts every entry once and makes all of them `current`.
    pub fn exec_load<E: Engine>(
        &mut self,
        adapter: &mut EngineAdapter<E>,
        entries: &EntryPool,
    ) -> Result<(), BenchError> {
        self.pools = EntryPools::with_capacity(entries.len());
        for index in 0..entries.len() {
            adapter
                .put(&entries[index])
                .map_err(|source| BenchError::WarmUp { index, source })?;
            self.pools.push(PoolKind::Current, index);
        }
        info!("loaded {} entries", entries.len().separate_with_underscores());
        Ok(())
    }

    /// Runs exactly `nops` steps and returns how long they took.
    pub fn exec_run<E: Engine>(
        &mut self,
        adapter: &mut EngineAdapter<E>,
        entries: &EntryPool,
    ) -> Result<Duration, BenchError> {
        let timer = Timer::start();
        for _ in 0..self.nops {
            self.step(adapter, entries)?;
        }
        let elapsed = timer.stop();

        info!(
            "ran {} operations in {:.1?}",
            self.nops.separate_with_underscores(),
            elapsed
        );
        Ok(elapsed)
    }

    /// Picks and applies one operation. Engine failures are logged and the
    /// entry still changes pool; only a drained pool is an error.
    pub fn step<E: Engine>(
        &mut self,
        adapter: &mut EngineAdapter<E>,
        entries: &EntryPool,
    ) -> Result<OpKind, BenchError> {
        if self.pools.rotate() && self.shuffle {
            self.pools.shuffle_current(&mut self.rng);
        }

        let op = self.mix.draw(&mut self.rng);
        match op {
            OpKind::Get => {
                let index = self.pop_current(op)?;
                if let Err(e) = adapter.get(&entries[index]) {
                    info!("benchmark get() failed: {e}");
                }
                self.pools.push(PoolKind::Next, index);
            }
            OpKind::Put => {
                let index = match self.pools.pop(PoolKind::Evicted) {
                    Some(index) => index,
                    None => {
                        // replace a live entry
                        let index = self.pop_current(op)?;
                        if let Err(e) = adapter.remove(&entries[index]) {
                            info!("benchmark rem() failed: {e}");
                        }
                        index
                    }
                };
                if let Err(e) = adapter.put(&entries[index]) {
                    info!("benchmark put() failed: {e}");
                }
                self.pools.push(PoolKind::Next, index);
            }
            OpKind::Remove => {
                let index = self.pop_current(op)?;
                if let Err(e) = adapter.remove(&entries[index]) {
                    info!("benchmark rem() failed: {e}");
                }
                self.pools.push(PoolKind::Evicted, index);
            }
        }
        debug_assert_eq!(self.pools.len(), entries.len());
        Ok(op)
    }

    fn pop_current(&mut self, op: OpKind) -> Result<usize, BenchError> {
        self.pools.pop(PoolKind::Current).ok_or(BenchError::EmptyPool {
            op,
            pool: PoolKind::Current,
        })
    }

    /// `(current, next, evicted)`
    pub fn pool_sizes(&self) -> (usize, usize, usize) {
        self.pools.sizes()
    }
}

/// Starts the engine, warms it up, times `nops` operations and tears the
/// engine down again, also when warm-up or the timed loop fail.
pub fn run_benchmark<E: Engine>(
    config: &BenchConfig,
    entries: &EntryPool,
) -> Result<Summary, BenchError> {
    let mut workload = Workload::new(config)?;
    let mut adapter = EngineAdapter::<E>::initialize(config)?;

    let result = workload
        .exec_load(&mut adapter, entries)
        .and_then(|()| workload.exec_run(&mut adapter, entries));
    if let Err(e) = &result {
        error!(
            "benchmark aborted with pools {:?} (current, next, evicted): {e}",
            workload.pool_sizes()
        );
    }

    let shutdown = adapter.shutdown();
    let duration = result?;
    let metrics = shutdown?;
    info!(
        "{} of {} engine calls failed",
        metrics.failures().separate_with_underscores(),
        metrics.calls().separate_with_underscores()
    );

    Ok(Summary::new(duration, config.nops))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineOptions, MemHash};
    use proptest::prelude::*;
    use std::collections::HashSet;

    /// Tracks which keys are resident and records every call that breaks the
    /// pool contract.
    #[derive(Default)]
    struct CheckedEngine {
        present: HashSet<Vec<u8>>,
        lookups: Vec<Vec<u8>>,
        violations: Vec<String>,
    }

    impl Engine for CheckedEngine {
        const NAME: &'static str = "checked";

        fn setup(_options: &EngineOptions) -> anyhow::Result<Self> {
            Ok(CheckedEngine::default())
        }

        fn insert(&mut self, key: &[u8], _value: &[u8], _ttl: Duration) -> anyhow::Result<bool> {
            if !self.present.insert(key.to_vec()) {
                self.violations.push(format!("put on live key {key:?}"));
            }
            Ok(true)
        }

        fn lookup(&mut self, key: &[u8]) -> anyhow::Result<bool> {
            self.lookups.push(key.to_vec());
            if !self.present.contains(key) {
                self.violations.push(format!("get on evicted key {key:?}"));
            }
            Ok(self.present.contains(key))
        }

        fn delete(&mut self, key: &[u8]) -> anyhow::Result<bool> {
            if !self.present.remove(key) {
                self.violations.push(format!("remove on evicted key {key:?}"));
                return Ok(false);
            }
            Ok(true)
        }

        fn teardown(self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn config(nentries: u64, nops: u64, mix: (u64, u64, u64)) -> BenchConfig {
        BenchConfig {
            nentries,
            nops,
            pct_get: mix.0,
            pct_put: mix.1,
            pct_rem: mix.2,
            entry_min_size: 16,
            entry_max_size: 32,
            ..BenchConfig::default()
        }
    }

    struct Harness {
        workload: Workload,
        adapter: EngineAdapter<CheckedEngine>,
        entries: EntryPool,
    }

    fn loaded(config: &BenchConfig) -> Harness {
        let entries = EntryPool::populate(config).unwrap();
        let mut adapter = EngineAdapter::initialize(config).unwrap();
        let mut workload = Workload::new(config).unwrap();
        workload.exec_load(&mut adapter, &entries).unwrap();
        Harness {
            workload,
            adapter,
            entries,
        }
    }

    impl Harness {
        fn step(&mut self) -> Result<OpKind, BenchError> {
            self.workload.step(&mut self.adapter, &self.entries)
        }

        fn run(&mut self) -> Result<Duration, BenchError> {
            self.workload.exec_run(&mut self.adapter, &self.entries)
        }
    }

    #[test]
    fn warm_up_makes_every_entry_current() {
        let h = loaded(&config(25, 0, (80, 10, 10)));
        assert_eq!(h.workload.pool_sizes(), (25, 0, 0));
        assert_eq!(h.adapter.engine().present.len(), 25);
        assert_eq!(h.adapter.metrics().insert, 25);
    }

    #[test]
    fn pools_stay_exhaustive_and_calls_respect_residency() {
        let mut h = loaded(&config(100, 0, (80, 10, 10)));
        for _ in 0..5_000 {
            h.step().unwrap();
            let (c, n, e) = h.workload.pool_sizes();
            assert_eq!(c + n + e, 100);
            assert_eq!(h.adapter.engine().present.len(), c + n);
        }
        assert!(h.adapter.engine().violations.is_empty(), "{:?}", h.adapter.engine().violations);
        assert_eq!(h.adapter.metrics().lookup_miss, 0);
        assert_eq!(h.adapter.metrics().delete_miss, 0);
    }

    #[test]
    fn same_seed_same_operation_sequence() {
        let c = config(50, 0, (60, 20, 20));
        let mut a = loaded(&c);
        let mut b = loaded(&c);
        let ops_a: Vec<OpKind> = (0..2_000).map(|_| a.step().unwrap()).collect();
        let ops_b: Vec<OpKind> = (0..2_000).map(|_| b.step().unwrap()).collect();
        assert_eq!(ops_a, ops_b);
        assert_eq!(a.adapter.engine().lookups, b.adapter.engine().lookups);

        let mut other = loaded(&BenchConfig { seed: 99, ..c });
        let ops_other: Vec<OpKind> = (0..2_000).map(|_| other.step().unwrap()).collect();
        assert_ne!(ops_a, ops_other);
    }

    #[test]
    fn run_executes_exactly_nops() {
        let mut h = loaded(&config(10, 777, (100, 0, 0)));
        h.run().unwrap();
        assert_eq!(h.adapter.metrics().lookup, 777);
        assert_eq!(h.adapter.metrics().insert, 10);
        assert_eq!(h.adapter.metrics().delete, 0);
    }

    #[test]
    fn get_only_rotates_generations() {
        let mut h = loaded(&config(10, 50, (100, 0, 0)));
        for _ in 0..10 {
            assert_eq!(h.step().unwrap(), OpKind::Get);
        }
        assert_eq!(h.workload.pool_sizes(), (0, 10, 0));

        assert_eq!(h.step().unwrap(), OpKind::Get);
        assert_eq!(h.workload.pool_sizes(), (9, 1, 0));

        for _ in 11..50 {
            h.step().unwrap();
        }
        assert_eq!(h.workload.pool_sizes(), (0, 10, 0));

        // each generation visits every entry once
        let lookups = &h.adapter.engine().lookups;
        for generation in lookups.chunks(10) {
            let distinct: HashSet<_> = generation.iter().collect();
            assert_eq!(distinct.len(), 10);
        }
    }

    #[test]
    fn remove_only_drains_current_and_aborts() {
        let mut h = loaded(&config(5, 100, (0, 0, 100)));
        let err = h.run().unwrap_err();
        assert!(matches!(
            err,
            BenchError::EmptyPool {
                op: OpKind::Remove,
                pool: PoolKind::Current
            }
        ));
        assert_eq!(h.adapter.metrics().delete, 5);
        assert_eq!(h.workload.pool_sizes(), (0, 0, 5));
        assert!(h.adapter.engine().violations.is_empty());
    }

    #[test]
    fn put_without_evicted_entries_replaces_a_live_one() {
        let mut h = loaded(&config(3, 30, (0, 100, 0)));
        h.run().unwrap();
        let m = *h.adapter.metrics();
        assert_eq!(m.insert, 3 + 30);
        assert_eq!(m.delete, 30);
        assert_eq!(m.delete_miss, 0);
        assert!(h.adapter.engine().violations.is_empty());
    }

    #[test]
    fn put_prefers_evicted_entries() {
        let mut h = loaded(&config(4, 0, (0, 0, 1)));
        h.step().unwrap();
        h.step().unwrap();
        assert_eq!(h.workload.pool_sizes(), (2, 0, 2));

        h.workload.mix = OpMix::new(0, 1, 0).unwrap();
        h.step().unwrap();
        assert_eq!(h.workload.pool_sizes(), (2, 1, 1));
        assert_eq!(h.adapter.metrics().delete, 2);
    }

    #[test]
    fn shuffle_changes_order_within_generation() {
        let c = config(100, 0, (100, 0, 0));
        let mut plain = loaded(&c);
        let mut shuffled = loaded(&BenchConfig { shuffle: true, ..c });
        for _ in 0..200 {
            plain.step().unwrap();
            shuffled.step().unwrap();
        }

        let second_plain = &plain.adapter.engine().lookups[100..200];
        let second_shuffled = &shuffled.adapter.engine().lookups[100..200];
        assert_ne!(second_plain, second_shuffled);

        let a: HashSet<_> = second_plain.iter().collect();
        let b: HashSet<_> = second_shuffled.iter().collect();
        assert_eq!(a, b);
        assert!(shuffled.adapter.engine().violations.is_empty());
    }

    #[test]
    fn benchmark_reports_configured_operation_count() {
        let c = config(100, 1_000, (80, 10, 10));
        let entries = EntryPool::populate(&c).unwrap();
        let summary = run_benchmark::<MemHash>(&c, &entries).unwrap();
        assert_eq!(summary.nops, 1_000);
        assert!(summary.avg_ns_per_op() > 0.0);
        assert_eq!(
            summary.avg_ns_per_op(),
            summary.duration.as_nanos() as f64 / 1_000.0
        );
        entries.release();
    }

    const SLOW_INSERT: Duration = Duration::from_millis(20);

    /// Every insert costs `SLOW_INSERT`; lookups are free.
    struct SlowInsertEngine;

    impl Engine for SlowInsertEngine {
        const NAME: &'static str = "slow-insert";

        fn setup(_options: &EngineOptions) -> anyhow::Result<Self> {
            Ok(SlowInsertEngine)
        }

        fn insert(&mut self, _key: &[u8], _value: &[u8], _ttl: Duration) -> anyhow::Result<bool> {
            std::thread::sleep(SLOW_INSERT);
            Ok(true)
        }

        fn lookup(&mut self, _key: &[u8]) -> anyhow::Result<bool> {
            Ok(true)
        }

        fn delete(&mut self, _key: &[u8]) -> anyhow::Result<bool> {
            Ok(true)
        }

        fn teardown(self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn warm_up_is_not_timed() {
        // 5 inserts during load, none in a get-only run
        let c = config(5, 200, (100, 0, 0));
        let entries = EntryPool::populate(&c).unwrap();
        let warm_up = SLOW_INSERT * 5;

        let mut adapter = EngineAdapter::<SlowInsertEngine>::initialize(&c).unwrap();
        let mut workload = Workload::new(&c).unwrap();
        let load = Timer::start();
        workload.exec_load(&mut adapter, &entries).unwrap();
        assert!(load.stop() >= warm_up);
        let run = workload.exec_run(&mut adapter, &entries).unwrap();
        assert!(run < warm_up, "timed loop took {run:?}");

        let summary = run_benchmark::<SlowInsertEngine>(&c, &entries).unwrap();
        assert!(summary.duration < warm_up, "timed loop took {:?}", summary.duration);
        assert!(summary.avg_ns_per_op() * 200.0 < warm_up.as_nanos() as f64);
        assert_eq!(
            summary.avg_ns_per_op(),
            summary.duration.as_nanos() as f64 / 200.0
        );
    }

    #[test]
    fn benchmark_surfaces_precondition_violation() {
        let c = config(5, 100, (0, 0, 100));
        let entries = EntryPool::populate(&c).unwrap();
        let err = run_benchmark::<MemHash>(&c, &entries).unwrap_err();
        assert!(matches!(err, BenchError::EmptyPool { .. }));
    }

    #[test]
    fn warm_up_failure_is_fatal() {
        let c = config(5, 100, (100, 0, 0));
        let entries = EntryPool::populate(&c).unwrap();
        let mut adapter = EngineAdapter::<MemHash>::initialize(&BenchConfig {
            entry_max_size: 9,
            ..c.clone()
        })
        .unwrap();
        let mut workload = Workload::new(&c).unwrap();
        let err = workload.exec_load(&mut adapter, &entries).unwrap_err();
        assert!(matches!(err, BenchError::WarmUp { index: 0, .. }));
    }

    proptest! {
        #[test]
        fn pool_invariants_hold_for_any_mix(
            nentries in 1u64..40,
            get in 0u64..10,
            put in 0u64..10,
            rem in 0u64..10,
            seed in any::<u64>(),
            shuffle in any::<bool>(),
        ) {
            prop_assume!(get + put + rem > 0);
            let c = BenchConfig { seed, shuffle, ..config(nentries, 0, (get, put, rem)) };
            let mut h = loaded(&c);

            for _ in 0..400 {
                let before = h.workload.pool_sizes();
                match h.step() {
                    Ok(_) => {}
                    Err(BenchError::EmptyPool { pool, .. }) => {
                        prop_assert_eq!(pool, PoolKind::Current);
                        // nothing to rotate in and nothing left in current
                        prop_assert_eq!(h.workload.pool_sizes().0, 0);
                        prop_assert_eq!(before.0 + before.1, 0);
                        break;
                    }
                    Err(e) => prop_assert!(false, "unexpected error {}", e),
                }
                let (cur, next, evicted) = h.workload.pool_sizes();
                prop_assert_eq!((cur + next + evicted) as u64, nentries);
                prop_assert_eq!(h.adapter.engine().present.len(), cur + next);
            }
            prop_assert!(h.adapter.engine().violations.is_empty());
        }
    }
}
