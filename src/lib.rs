//! # chronostore
//!
//! An embedded, synchronous, dictionary-style store for structured
//! records over a pluggable key/value engine, with a time-bucketed
//! layer for timestamped data.
//!
//! ## Architecture
//!
//! - [`wire`](crate::wire) — little-endian primitives and the bounded
//!   [`Reader`](crate::wire::Reader) cursor every codec builds on.
//! - [`record`](crate::record) — the [`Record`] document type: ordered
//!   `(field id, value)` pairs, partial-record matching, wire codec.
//! - [`codec`](crate::codec) — typed key/value codecs for the
//!   dictionary surface ([`Codec`], [`Datum`]).
//! - [`engine`](crate::engine) — the [`KvEngine`] trait with an
//!   in-memory engine for tests and a redb-backed persistent engine.
//! - [`bucket`](crate::bucket) — bucket-key derivation and the
//!   checksummed bucket container.
//! - [`ts`](crate::ts) — [`TsStore`]: batched insertion and predicate
//!   queries over time-bucketed records.
//!
//! ## Example
//!
//! ```
//! use chronostore::{Codec, Datum, Store, StoreConfig};
//!
//! let config = StoreConfig {
//!     url: "mem://".to_owned(),
//!     datastore: "example".to_owned(),
//!     key_codec: Codec::Str,
//!     value_codec: Codec::Int,
//!     ..Default::default()
//! };
//! let store = Store::open(config).unwrap();
//!
//! store.set(&Datum::Str("answer".into()), &Datum::Int(42)).unwrap();
//! assert_eq!(store.get(&Datum::Str("answer".into())).unwrap(), Datum::Int(42));
//! ```

pub mod bucket;
pub mod codec;
pub mod engine;
pub mod record;
pub mod ts;
pub mod wire;

pub use bucket::{BUCKET_WIDTH, Bucket, bucket_key};
pub use codec::{Codec, CodecError, Datum};
pub use engine::{EngineConfig, EngineError, EngineStats, KvEngine, MemoryEngine, RedbEngine};
pub use record::{EPSILON, FieldId, Record, RecordError, Value};
pub use ts::TsStore;
pub use wire::WireError;

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{debug, info};

// ------------------------------------------------------------------------------------------------
// Errors
// ------------------------------------------------------------------------------------------------

/// Top-level error type. Every public operation returns this.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The store has been closed; no further operations are accepted.
    #[error("store is closed")]
    Closed,

    /// The requested key has no value.
    #[error("key not found")]
    NotFound,

    /// A record-level failure (missing field, wrong field type).
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    /// A wire-format failure (truncation, checksum, bad tag).
    #[error("serialization error: {0}")]
    Serialization(#[from] WireError),

    /// A key/value codec failure.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A storage-engine failure.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

// ------------------------------------------------------------------------------------------------
// Configuration
// ------------------------------------------------------------------------------------------------

/// Store configuration.
///
/// `url` selects the engine: `mem://` opens the in-memory engine,
/// `file://<path>` opens the persistent engine at `<path>`. `datastore`
/// names the keyspace within the engine. The codecs fix how dictionary
/// keys and values are converted to bytes; they are not persisted, so
/// reopening a datastore with different codecs misreads the data.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Engine URL, e.g. `mem://` or `file:///var/lib/app/db`.
    pub url: String,
    /// Keyspace name within the engine.
    pub datastore: String,
    /// Codec applied to dictionary keys.
    pub key_codec: Codec,
    /// Codec applied to dictionary values.
    pub value_codec: Codec,
    /// Engine tuning knobs.
    pub engine: EngineConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "mem://".to_owned(),
            datastore: "default".to_owned(),
            key_codec: Codec::Bytes,
            value_codec: Codec::Bytes,
            engine: EngineConfig::default(),
        }
    }
}

impl StoreConfig {
    fn validate(&self) -> Result<(), StoreError> {
        if self.url.is_empty() {
            return Err(StoreError::Config(
                "missing required parameter: url".to_owned(),
            ));
        }
        if self.datastore.is_empty() {
            return Err(StoreError::Config(
                "missing required parameter: datastore".to_owned(),
            ));
        }
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// Store
// ------------------------------------------------------------------------------------------------

/// Dictionary-style store over a key/value engine.
///
/// Keys and values pass through the configured [`Codec`]s on the way in
/// and out, so the caller works with typed [`Datum`]s while the engine
/// sees bytes. All operations are synchronous; the store is `Send +
/// Sync` and may be shared across threads.
#[derive(Debug)]
pub struct Store {
    engine: Box<dyn KvEngine>,
    key_codec: Codec,
    value_codec: Codec,
    closed: AtomicBool,
}

impl Store {
    /// Open a store per `config`.
    ///
    /// Fails with [`StoreError::Config`] on an empty `url`/`datastore`
    /// or an unsupported URL scheme.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;

        let engine: Box<dyn KvEngine> = if config.url.starts_with("mem://") {
            Box::new(MemoryEngine::new(&config.datastore))
        } else if let Some(path) = config.url.strip_prefix("file://") {
            Box::new(RedbEngine::open(path, &config.datastore, &config.engine)?)
        } else {
            return Err(StoreError::Config(format!(
                "unsupported url scheme: '{}'",
                config.url
            )));
        };

        info!(
            "opened store: url='{}' datastore='{}' key={} value={}",
            config.url,
            config.datastore,
            config.key_codec.name(),
            config.value_codec.name()
        );

        Ok(Self {
            engine,
            key_codec: config.key_codec,
            value_codec: config.value_codec,
            closed: AtomicBool::new(false),
        })
    }

    /// Build a store around an existing engine. Mainly for tests and
    /// embedders providing their own [`KvEngine`].
    pub fn with_engine(engine: Box<dyn KvEngine>, key_codec: Codec, value_codec: Codec) -> Self {
        Self {
            engine,
            key_codec,
            value_codec,
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn check_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    pub(crate) fn engine(&self) -> &dyn KvEngine {
        self.engine.as_ref()
    }

    // --------------------------------------------------------------------------------------------
    // Dictionary surface
    // --------------------------------------------------------------------------------------------

    /// Fetch the value stored under `key`.
    ///
    /// Fails with [`StoreError::NotFound`] when the key is absent.
    pub fn get(&self, key: &Datum) -> Result<Datum, StoreError> {
        self.check_open()?;
        let kb = self.key_codec.encode(key)?;
        match self.engine.get(&kb)? {
            Some(bytes) => Ok(self.value_codec.decode(&bytes)?),
            None => Err(StoreError::NotFound),
        }
    }

    /// Fetch the value stored under `key`, or `default` when absent.
    /// Other failures still propagate.
    pub fn get_or(&self, key: &Datum, default: Datum) -> Result<Datum, StoreError> {
        match self.get(key) {
            Ok(value) => Ok(value),
            Err(StoreError::NotFound) => Ok(default),
            Err(e) => Err(e),
        }
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&self, key: &Datum, value: &Datum) -> Result<(), StoreError> {
        self.check_open()?;
        let kb = self.key_codec.encode(key)?;
        let vb = self.value_codec.encode(value)?;
        self.engine.put(&kb, &vb)?;
        Ok(())
    }

    /// Remove `key`, returning the value it held.
    ///
    /// Fails with [`StoreError::NotFound`] when the key is absent.
    pub fn delete(&self, key: &Datum) -> Result<Datum, StoreError> {
        self.check_open()?;
        let kb = self.key_codec.encode(key)?;
        match self.engine.delete(&kb)? {
            Some(bytes) => Ok(self.value_codec.decode(&bytes)?),
            None => Err(StoreError::NotFound),
        }
    }

    /// `true` if `key` has a value.
    pub fn contains(&self, key: &Datum) -> Result<bool, StoreError> {
        self.check_open()?;
        let kb = self.key_codec.encode(key)?;
        Ok(self.engine.exists(&kb)?)
    }

    /// All stored keys, decoded through the key codec, in engine
    /// iteration order.
    pub fn keys(&self) -> Result<Vec<Datum>, StoreError> {
        self.check_open()?;
        let mut keys = Vec::new();
        for entry in self.engine.iter_all()? {
            let (kb, _) = entry?;
            keys.push(self.key_codec.decode(&kb)?);
        }
        Ok(keys)
    }

    /// Number of stored entries.
    pub fn len(&self) -> Result<u64, StoreError> {
        self.check_open()?;
        Ok(self.engine.stats()?.valid_items)
    }

    /// `true` if the store holds no entries.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    // --------------------------------------------------------------------------------------------
    // Maintenance
    // --------------------------------------------------------------------------------------------

    /// Engine statistics snapshot.
    pub fn stats(&self) -> Result<EngineStats, StoreError> {
        self.check_open()?;
        Ok(self.engine.stats()?)
    }

    /// Flush pending writes to durable storage.
    pub fn commit(&self) -> Result<(), StoreError> {
        self.check_open()?;
        self.engine.commit()?;
        Ok(())
    }

    /// Remove every entry from the datastore.
    pub fn cleanup(&self) -> Result<(), StoreError> {
        self.check_open()?;
        self.engine.cleanup()?;
        debug!("datastore cleaned up");
        Ok(())
    }

    /// Flush and close. Every later operation fails with
    /// [`StoreError::Closed`]. Idempotent.
    pub fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.engine.commit()?;
        info!("store closed");
        Ok(())
    }
}
