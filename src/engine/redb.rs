use crate::engine::{Engine, EngineOptions};
use anyhow::Result;
use redb::{Database, ReadableDatabase, TableDefinition};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::debug;

static TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("data");

/// redb in a temporary file, one transaction per operation. Ignores ttl and
/// capacity.
pub struct Redb {
    _f: NamedTempFile,
    db: Database,
}

impl Engine for Redb {
    const NAME: &'static str = "redb";

    fn setup(options: &EngineOptions) -> Result<Self> {
        let f = NamedTempFile::new()?;
        let db = Database::create(f.path())?;
        let tx = db.begin_write()?;
        {
            let _ = tx.open_table(TABLE)?;
        }
        tx.commit()?;
        debug!("redb at {} ignores {:?}", f.path().display(), options);
        Ok(Redb { _f: f, db })
    }

    fn insert(&mut self, key: &[u8], value: &[u8], _ttl: Duration) -> Result<bool> {
        let tx = self.db.begin_write()?;
        {
            let mut t = tx.open_table(TABLE)?;
            t.insert(key, value)?;
        }
        tx.commit()?;
        Ok(true)
    }

    fn lookup(&mut self, key: &[u8]) -> Result<bool> {
        let tx = self.db.begin_read()?;
        let t = tx.open_table(TABLE)?;
        Ok(t.get(key)?.is_some())
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool> {
        let tx = self.db.begin_write()?;
        let existed = {
            let mut t = tx.open_table(TABLE)?;
            t.remove(key)?.is_some()
        };
        tx.commit()?;
        Ok(existed)
    }

    fn teardown(self) -> Result<()> {
        drop(self.db);
        self._f.close()?;
        Ok(())
    }
}
