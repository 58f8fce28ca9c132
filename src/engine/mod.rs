//! The underlying ordered key/value engine, behind a trait.
//!
//! The bucketed record store treats durability, caching, iteration order,
//! and crash recovery as someone else's problem: everything above this
//! module talks to a [`KvEngine`] trait object and never interprets the
//! engine's tuning knobs. Two implementations ship with the crate:
//!
//! - [`MemoryEngine`] — a `BTreeMap` behind an `RwLock`; the reference
//!   implementation and the default for tests.
//! - [`RedbEngine`] — persistent storage backed by redb, one table per
//!   datastore.
//!
//! ## Iteration contract
//!
//! [`KvEngine::iter_all`] yields every `(key, value)` pair in an
//! implementation-defined order over a snapshot at least as consistent as
//! the engine's own iterator guarantees. Callers must not assume key
//! order. Both bundled engines happen to iterate in key order, but the
//! store layer sorts its own results rather than relying on that.
//!
//! ## Deletion contract
//!
//! Engines in this family return the deleted value from
//! [`KvEngine::delete`], so the facade can hand it back to the caller
//! without a preceding read.


pub(crate) mod memory;
pub(crate) mod redb;

use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

pub use self::memory::MemoryEngine;
pub use self::redb::RedbEngine;

/// Errors reported by a [`KvEngine`] implementation.
///
/// Carries the engine's diagnostic text verbatim; the store layer never
/// retries (`retry_count`/`retry_delay` are engine-level knobs, invisible
/// above this trait).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine reported a failure.
    #[error("engine: {0}")]
    Storage(String),
}

/// Opaque engine tuning knobs, passed through at open time.
///
/// The record store never interprets these; each engine maps the knobs it
/// understands (redb honours `read_cache`) and ignores the rest. A zero
/// value means "engine default".
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineConfig {
    /// Open flags (create/truncate semantics, engine-defined).
    pub flags: u64,
    /// Index fanout hint.
    pub fanout: u64,
    /// Garbage-collection fanout hint.
    pub gc_fanout: u64,
    /// Write cache size in bytes.
    pub write_cache: u64,
    /// Read cache size in bytes.
    pub read_cache: u64,
    /// Automatic commit period.
    pub auto_commit_period: u64,
    /// Automatic cleaning period.
    pub auto_clean_period: u64,
    /// Utilisation percentage that triggers cleaning.
    pub clean_util_pct: u64,
    /// Dirty percentage that triggers cleaning.
    pub clean_dirty_pct: u64,
    /// Engine-internal retry count.
    pub retry_count: u64,
    /// Engine-internal retry delay.
    pub retry_delay: u64,
    /// Compression threshold in bytes.
    pub compress_threshold: u64,
}

/// A snapshot of engine counters, returned by [`KvEngine::stats`].
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    /// Datastore name.
    pub name: String,
    /// Number of live entries.
    pub valid_items: u64,
    /// Writes accepted since open.
    pub puts: u64,
    /// Deletions performed since open.
    pub deletes: u64,
    /// Commits performed since open.
    pub commits: u64,
}

/// The collaborator surface of the ordered key/value engine.
///
/// All methods take `&self`; implementations use interior mutability and
/// are safe to share behind `Box<dyn KvEngine>`.
pub trait KvEngine: Send + Sync + std::fmt::Debug {
    /// `true` if `key` holds a value.
    fn exists(&self, key: &[u8]) -> Result<bool, EngineError>;

    /// Look up the value stored under `key`.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError>;

    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), EngineError>;

    /// Remove `key`, returning the value it held.
    fn delete(&self, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError>;

    /// Iterate every `(key, value)` pair. Order is implementation-defined;
    /// see the module docs for the snapshot contract.
    fn iter_all(
        &self,
    ) -> Result<Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>), EngineError>> + '_>, EngineError>;

    /// Current engine counters.
    fn stats(&self) -> Result<EngineStats, EngineError>;

    /// Force a durability point. Engines that commit on every write treat
    /// this as a counter bump.
    fn commit(&self) -> Result<(), EngineError>;

    /// Remove every entry in the datastore.
    fn cleanup(&self) -> Result<(), EngineError>;
}

// ------------------------------------------------------------------------------------------------
// Shared counter plumbing
// ------------------------------------------------------------------------------------------------

/// Operation counters shared by the bundled engine implementations.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    puts: AtomicU64,
    deletes: AtomicU64,
    commits: AtomicU64,
}

impl Counters {
    pub(crate) fn record_put(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, name: &str, valid_items: u64) -> EngineStats {
        EngineStats {
            name: name.to_owned(),
            valid_items,
            puts: self.puts.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
        }
    }
}
