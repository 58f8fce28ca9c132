//! Persistent engine backed by redb.

use std::fmt;
use std::path::Path;

use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use tracing::{debug, info};

use super::{Counters, EngineConfig, EngineError, EngineStats, KvEngine};

fn table_def(name: &str) -> TableDefinition<'_, &'static [u8], &'static [u8]> {
    TableDefinition::new(name)
}

fn storage(e: impl fmt::Display) -> EngineError {
    EngineError::Storage(e.to_string())
}

/// A durable [`KvEngine`] storing one redb table per datastore.
///
/// Every write runs in its own transaction and is committed before the
/// call returns, so [`KvEngine::commit`] has nothing left to flush.
/// Iteration order is ascending byte order of the key.
pub struct RedbEngine {
    db: Database,
    table: String,
    counters: Counters,
}

impl fmt::Debug for RedbEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedbEngine")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl RedbEngine {
    /// Open (or create) the database file at `path` and ensure the
    /// datastore's table exists.
    ///
    /// Of the opaque tuning knobs, only `read_cache` is meaningful to
    /// redb; the rest are accepted and ignored.
    pub fn open(
        path: impl AsRef<Path>,
        datastore: impl Into<String>,
        config: &EngineConfig,
    ) -> Result<Self, EngineError> {
        let datastore = datastore.into();

        let mut builder = Database::builder();
        if config.read_cache > 0 {
            builder.set_cache_size(config.read_cache as usize);
        }
        let db = builder.create(path.as_ref()).map_err(storage)?;

        // Create the table up front so read transactions never race a
        // missing table.
        let txn = db.begin_write().map_err(storage)?;
        {
            txn.open_table(table_def(&datastore)).map_err(storage)?;
        }
        txn.commit().map_err(storage)?;

        info!(
            "opened redb datastore '{}' at {}",
            datastore,
            path.as_ref().display()
        );

        Ok(Self {
            db,
            table: datastore,
            counters: Counters::default(),
        })
    }
}

impl KvEngine for RedbEngine {
    fn exists(&self, key: &[u8]) -> Result<bool, EngineError> {
        Ok(self.get(key)?.is_some())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError> {
        let txn = self.db.begin_read().map_err(storage)?;
        let table = txn.open_table(table_def(&self.table)).map_err(storage)?;
        Ok(table
            .get(key)
            .map_err(storage)?
            .map(|guard| guard.value().to_vec()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), EngineError> {
        let txn = self.db.begin_write().map_err(storage)?;
        {
            let mut table = txn.open_table(table_def(&self.table)).map_err(storage)?;
            table.insert(key, value).map_err(storage)?;
        }
        txn.commit().map_err(storage)?;
        self.counters.record_put();
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError> {
        let txn = self.db.begin_write().map_err(storage)?;
        let old = {
            let mut table = txn.open_table(table_def(&self.table)).map_err(storage)?;
            table
                .remove(key)
                .map_err(storage)?
                .map(|guard| guard.value().to_vec())
        };
        txn.commit().map_err(storage)?;
        if old.is_some() {
            self.counters.record_delete();
        }
        Ok(old)
    }

    fn iter_all(
        &self,
    ) -> Result<Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>), EngineError>> + '_>, EngineError>
    {
        // Materialise inside the read transaction; the boxed iterator owns
        // its snapshot so no transaction outlives this call.
        let txn = self.db.begin_read().map_err(storage)?;
        let table = txn.open_table(table_def(&self.table)).map_err(storage)?;
        let mut snapshot = Vec::new();
        for entry in table.iter().map_err(storage)? {
            let (k, v) = entry.map_err(storage)?;
            snapshot.push((k.value().to_vec(), v.value().to_vec()));
        }
        debug!("redb scan snapshot: {} entries", snapshot.len());
        Ok(Box::new(snapshot.into_iter().map(Ok)))
    }

    fn stats(&self) -> Result<EngineStats, EngineError> {
        let txn = self.db.begin_read().map_err(storage)?;
        let table = txn.open_table(table_def(&self.table)).map_err(storage)?;
        let items = table.len().map_err(storage)?;
        Ok(self.counters.snapshot(&self.table, items))
    }

    fn commit(&self) -> Result<(), EngineError> {
        // Writes are committed transactionally as they happen.
        self.counters.record_commit();
        Ok(())
    }

    fn cleanup(&self) -> Result<(), EngineError> {
        let txn = self.db.begin_write().map_err(storage)?;
        txn.delete_table(table_def(&self.table)).map_err(storage)?;
        txn.open_table(table_def(&self.table)).map_err(storage)?;
        txn.commit().map_err(storage)?;
        info!("cleaned redb datastore '{}'", self.table);
        Ok(())
    }
}
