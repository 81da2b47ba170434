use crate::config::{BenchConfig, KEY_WIDTH};
use crate::error::BenchError;
use crate::generator::{KEY_LEN, SizeGen, key_bytes, value_bytes};
use std::ops::Index;
use thousands::Separable;
use tracing::debug;

/// One synthetic key/value pair.
#[derive(Debug)]
pub struct Entry {
    key: [u8; KEY_LEN],
    value: Box<[u8]>,
}

impl Entry {
    fn new(id: u64, size: usize) -> Result<Self, BenchError> {
        Ok(Entry {
            key: key_bytes(id),
            value: value_bytes(size - KEY_LEN)?,
        })
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Key plus value length, i.e. the size drawn at population time.
    pub fn size(&self) -> usize {
        self.key.len() + self.value.len()
    }
}

/// Owns every entry of a run. Everything downstream refers to entries by
/// index.
#[derive(Debug)]
pub struct EntryPool {
    entries: Vec<Entry>,
}

impl EntryPool {
    /// Creates entries `1..=nentries`, each with a size drawn from the
    /// configured range.
    pub fn populate(config: &BenchConfig) -> Result<Self, BenchError> {
        if config.entry_min_size <= KEY_WIDTH {
            return Err(BenchError::config(format!(
                "entry_min_size must be larger than {KEY_WIDTH}, got {}",
                config.entry_min_size
            )));
        }
        let count = usize::try_from(config.nentries)
            .map_err(|_| BenchError::config(format!("nentries {} is too large", config.nentries)))?;

        let mut sizes = SizeGen::new(
            config.entry_min_size,
            config.entry_max_size,
            config.entry_size_dist,
            config.seed,
        )?;

        let mut entries = Vec::new();
        entries
            .try_reserve_exact(count)
            .map_err(|source| BenchError::Allocation {
                what: "entry table",
                source,
            })?;

        let mut total_bytes = 0;
        for id in 1..=config.nentries {
            // validated sizes fit in usize
            let entry = Entry::new(id, sizes.get_size() as usize)?;
            total_bytes += entry.size();
            entries.push(entry);
        }

        debug!(
            "populated {} entries, {} bytes",
            count.separate_with_underscores(),
            total_bytes.separate_with_underscores()
        );
        Ok(EntryPool { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Frees every entry. Consuming the pool makes any later use a compile
    /// error.
    pub fn release(self) {
        debug!("releasing {} entries", self.entries.len().separate_with_underscores());
    }
}

impl Index<usize> for EntryPool {
    type Output = Entry;

    fn index(&self, index: usize) -> &Entry {
        &self.entries[index]
    }
}
