use crate::engine::{Engine, EngineOptions, EnginePolicy, ITEM_OVERHEAD};
use anyhow::Result;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::hash::{BuildHasherDefault, DefaultHasher};
use std::time::{Duration, Instant};

struct Item {
    value: Box<[u8]>,
    /// `None` when the ttl is past what `Instant` can represent.
    expire_at: Option<Instant>,
}

impl Item {
    fn expired(&self, now: Instant) -> bool {
        self.expire_at.is_some_and(|t| t <= now)
    }
}

/// Fixed hash keys, so the same inserts give the same iteration order and
/// random eviction is reproducible from the seed.
type ItemMap = HashMap<Vec<u8>, Item, BuildHasherDefault<DefaultHasher>>;

/// Bounded in-memory table. Holds at most `nitem` items of at most
/// `item_size` bytes each and evicts by policy when full.
pub struct MemHash {
    items: ItemMap,
    policy: EnginePolicy,
    item_size: usize,
    nitem: usize,
    rng: SmallRng,
}

impl MemHash {
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    fn evict(&mut self, now: Instant) {
        let victim = match self.items.iter().find(|(_, item)| item.expired(now)) {
            Some((k, _)) => Some(k.clone()),
            None => match self.policy {
                EnginePolicy::Random => {
                    let n = self.rng.random_range(0..self.items.len());
                    self.items.keys().nth(n).cloned()
                }
                EnginePolicy::Expire => self
                    .items
                    .iter()
                    .min_by_key(|(_, item)| (item.expire_at.is_none(), item.expire_at))
                    .map(|(k, _)| k.clone()),
            },
        };
        if let Some(k) = victim {
            self.items.remove(&k);
        }
    }
}

impl Engine for MemHash {
    const NAME: &'static str = "mem-hash";

    fn setup(options: &EngineOptions) -> Result<Self> {
        anyhow::ensure!(options.nitem > 0, "capacity must be non-zero");
        anyhow::ensure!(
            options.item_size > ITEM_OVERHEAD,
            "item size {} leaves no room past the {ITEM_OVERHEAD} byte overhead",
            options.item_size
        );

        let mut items = ItemMap::default();
        items.try_reserve(options.nitem)?;
        Ok(MemHash {
            items,
            policy: options.policy,
            item_size: options.item_size,
            nitem: options.nitem,
            rng: SmallRng::seed_from_u64(options.seed),
        })
    }

    fn insert(&mut self, key: &[u8], value: &[u8], ttl: Duration) -> Result<bool> {
        if key.len() + value.len() + ITEM_OVERHEAD > self.item_size {
            return Ok(false);
        }

        let now = Instant::now();
        if self.items.len() >= self.nitem && !self.items.contains_key(key) {
            self.evict(now);
        }

        let item = Item {
            value: value.into(),
            expire_at: now.checked_add(ttl),
        };
        self.items.insert(key.to_vec(), item);
        Ok(true)
    }

    fn lookup(&mut self, key: &[u8]) -> Result<bool> {
        match self.items.get(key) {
            None => Ok(false),
            Some(item) if !item.expired(Instant::now()) => {
                std::hint::black_box(&item.value);
                Ok(true)
            }
            Some(_) => {
                self.items.remove(key);
                Ok(false)
            }
        }
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool> {
        Ok(self.items.remove(key).is_some())
    }

    fn teardown(self) -> Result<()> {
        Ok(())
    }
}
