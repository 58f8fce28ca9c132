//! In-memory reference engine.

use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::info;

use super::{Counters, EngineError, EngineStats, KvEngine};

/// A non-durable [`KvEngine`] backed by a `BTreeMap`.
///
/// Iteration order is ascending key order. Contents are lost when the
/// engine is dropped; intended for tests and as the reference semantics
/// for other implementations.
#[derive(Debug)]
pub struct MemoryEngine {
    name: String,
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    counters: Counters,
}

impl MemoryEngine {
    /// Create an empty in-memory datastore.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        info!("opened in-memory datastore '{}'", name);
        Self {
            name,
            map: RwLock::new(BTreeMap::new()),
            counters: Counters::default(),
        }
    }

    fn read_map(&self) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>>, EngineError> {
        self.map
            .read()
            .map_err(|_| EngineError::Storage("poisoned lock".into()))
    }

    fn write_map(&self) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>>, EngineError> {
        self.map
            .write()
            .map_err(|_| EngineError::Storage("poisoned lock".into()))
    }
}

impl KvEngine for MemoryEngine {
    fn exists(&self, key: &[u8]) -> Result<bool, EngineError> {
        Ok(self.read_map()?.contains_key(key))
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError> {
        Ok(self.read_map()?.get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), EngineError> {
        self.write_map()?.insert(key.to_vec(), value.to_vec());
        self.counters.record_put();
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError> {
        let old = self.write_map()?.remove(key);
        if old.is_some() {
            self.counters.record_delete();
        }
        Ok(old)
    }

    fn iter_all(
        &self,
    ) -> Result<Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>), EngineError>> + '_>, EngineError>
    {
        // Snapshot under the read lock; the iterator owns its data so the
        // lock is released before the caller starts consuming.
        let snapshot: Vec<(Vec<u8>, Vec<u8>)> = self
            .read_map()?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Box::new(snapshot.into_iter().map(Ok)))
    }

    fn stats(&self) -> Result<EngineStats, EngineError> {
        let items = self.read_map()?.len() as u64;
        Ok(self.counters.snapshot(&self.name, items))
    }

    fn commit(&self) -> Result<(), EngineError> {
        self.counters.record_commit();
        Ok(())
    }

    fn cleanup(&self) -> Result<(), EngineError> {
        self.write_map()?.clear();
        info!("cleaned in-memory datastore '{}'", self.name);
        Ok(())
    }
}
