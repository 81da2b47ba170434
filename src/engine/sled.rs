use crate::engine::{Engine, EngineOptions};
use anyhow::Result;
use std::time::Duration;
use tempfile::TempDir;
use tracing::debug;

/// sled in a temporary directory. Ignores ttl and capacity.
pub struct Sled {
    db: sled::Db,
    _f: TempDir,
}

impl Engine for Sled {
    const NAME: &'static str = "sled";

    fn setup(options: &EngineOptions) -> Result<Self> {
        let f = TempDir::new()?;
        let db = sled::open(f.path())?;
        debug!("sled at {} ignores {:?}", f.path().display(), options);
        Ok(Sled { db, _f: f })
    }

    fn insert(&mut self, key: &[u8], value: &[u8], _ttl: Duration) -> Result<bool> {
        self.db.insert(key, value)?;
        Ok(true)
    }

    fn lookup(&mut self, key: &[u8]) -> Result<bool> {
        Ok(self.db.get(key)?.is_some())
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool> {
        Ok(self.db.remove(key)?.is_some())
    }

    fn teardown(self) -> Result<()> {
        self.db.flush()?;
        drop(self.db);
        self._f.close()?;
        Ok(())
    }
}
