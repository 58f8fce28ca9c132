//! The time-bucketed record store.
//!
//! [`TsStore`] layers batched insertion and predicate queries on top of
//! the plain [`Store`] facade. Records are grouped by flooring a
//! designated integer timestamp field to a multiple of
//! [`BUCKET_WIDTH`](crate::bucket::BUCKET_WIDTH); each group is one
//! engine entry (see [`crate::bucket`]).
//!
//! ## Merge semantics
//!
//! Both insertion paths **merge**: a bucket already stored at a key is
//! read, the new records are appended, and the whole bucket is written
//! back. `insert_many` batches consecutive same-key records into a single
//! merge per key run.
//!
//! ## Query semantics
//!
//! `find`, `find_one`, `delete`, `delete_one` scan the entire datastore.
//! A query is a partial record: every field it carries must be present
//! and equal on a candidate (see [`Record::matches`]). Results are
//! ordered by ascending bucket key; ties preserve in-bucket order.
//! `find_one` and `delete_one` operate on the lowest-key match, so their
//! answer is deterministic regardless of engine iteration order.
//!
//! Deletes are record-level: matching records are removed from their
//! bucket and the bucket entry is dropped from the engine only when its
//! last record goes.
//!
//! ## Caveats
//!
//! The scan decodes every stored value as a bucket, so a `TsStore`
//! assumes its datastore holds bucket entries only; mixing in plain
//! dictionary writes under other keys makes scans fail with a
//! serialization error. Read-modify-write sequences are not protected
//! against concurrent writers to the same key — the later `put` wins.


use std::ops::Deref;

use tracing::debug;

use crate::bucket::{BUCKET_WIDTH, Bucket, bucket_key, key_bytes, key_from_bytes};
use crate::record::{FieldId, Record};
use crate::{Store, StoreConfig, StoreError};

/// Dictionary-like store with time-bucketed record insertion and
/// predicate-based querying.
///
/// Derefs to [`Store`], so the plain key/value surface (`get`, `set`,
/// `keys`, `stats`, …) is available on a `TsStore` as well.
#[derive(Debug)]
pub struct TsStore {
    store: Store,
    index_field: FieldId,
    width: i64,
}

impl Deref for TsStore {
    type Target = Store;

    fn deref(&self) -> &Store {
        &self.store
    }
}

impl TsStore {
    /// Open a time-bucketed store. `index_field` names the integer field
    /// whose value is bucketed.
    pub fn open(config: StoreConfig, index_field: FieldId) -> Result<Self, StoreError> {
        Ok(Self::with_store(Store::open(config)?, index_field))
    }

    /// Wrap an already-open [`Store`].
    pub fn with_store(store: Store, index_field: FieldId) -> Self {
        Self {
            store,
            index_field,
            width: BUCKET_WIDTH,
        }
    }

    /// The field whose value determines a record's bucket.
    pub fn index_field(&self) -> FieldId {
        self.index_field
    }

    // --------------------------------------------------------------------------------------------
    // Insertion
    // --------------------------------------------------------------------------------------------

    /// Insert a single record into its bucket.
    ///
    /// Read-modify-write: an existing bucket at the computed key is
    /// fetched, the record appended, and the bucket rewritten. Not
    /// protected against concurrent writers to the same key.
    pub fn insert_one(&self, record: Record) -> Result<(), StoreError> {
        self.store.check_open()?;
        let key = bucket_key(&record, self.index_field, self.width)?;
        let mut incoming = Bucket::new();
        incoming.push(record);
        self.merge_bucket(key, incoming)
    }

    /// Insert a batch of records, assumed (not verified) to be sorted by
    /// non-decreasing index-field value.
    ///
    /// Consecutive records mapping to the same key are accumulated and
    /// merged into the stored bucket with a single write per key run.
    /// Fails fast: an error aborts the remaining batch, leaving earlier
    /// flushes in place.
    pub fn insert_many(&self, records: Vec<Record>) -> Result<(), StoreError> {
        self.store.check_open()?;

        let total = records.len();
        let mut acc = Bucket::new();
        let mut current_key: Option<i64> = None;

        for record in records {
            let key = bucket_key(&record, self.index_field, self.width)?;
            match current_key {
                Some(prev) if prev != key => {
                    self.merge_bucket(prev, std::mem::take(&mut acc))?;
                    current_key = Some(key);
                }
                None => current_key = Some(key),
                _ => {}
            }
            acc.push(record);
        }
        if let Some(key) = current_key {
            self.merge_bucket(key, acc)?;
        }

        debug!("insert_many: {} records", total);
        Ok(())
    }

    /// Merge `incoming` into whatever bucket is stored at `key`.
    fn merge_bucket(&self, key: i64, incoming: Bucket) -> Result<(), StoreError> {
        let kb = key_bytes(key);
        let engine = self.store.engine();
        let merged = match engine.get(&kb)? {
            Some(bytes) => {
                let mut existing = Bucket::decode(&bytes)?;
                existing.extend(incoming);
                existing
            }
            None => incoming,
        };
        engine.put(&kb, &merged.encode()?)?;
        debug!("bucket {}: {} records after merge", key, merged.len());
        Ok(())
    }

    // --------------------------------------------------------------------------------------------
    // Queries
    // --------------------------------------------------------------------------------------------

    /// Return every record matching `query`, ordered by ascending bucket
    /// key; matches within one bucket keep their insertion order.
    ///
    /// An empty query returns every stored record. Any bucket that fails
    /// to decode aborts the whole call — partial results are never
    /// returned.
    pub fn find(&self, query: &Record) -> Result<Vec<Record>, StoreError> {
        self.store.check_open()?;
        let matches = self.scan_matches(query)?;
        debug!("find: {} matches", matches.len());
        Ok(matches.into_iter().map(|(_, record)| record).collect())
    }

    /// Return the lowest-key record matching `query`, or `None`.
    ///
    /// Deterministic across engines: the answer is the first element of
    /// [`find`](Self::find), whatever order the engine iterates in.
    pub fn find_one(&self, query: &Record) -> Result<Option<Record>, StoreError> {
        self.store.check_open()?;
        let matches = self.scan_matches(query)?;
        Ok(matches.into_iter().map(|(_, record)| record).next())
    }

    /// Delete every record matching `query`. Returns the number removed.
    ///
    /// Record-level granularity: non-matching records stay in their
    /// bucket; a bucket entry is deleted from the engine only when its
    /// last record is removed. The scan and decode complete before any
    /// mutation, so a decode failure aborts with nothing deleted.
    pub fn delete(&self, query: &Record) -> Result<u64, StoreError> {
        self.store.check_open()?;
        let engine = self.store.engine();

        let mut rewrites: Vec<(Vec<u8>, Bucket)> = Vec::new();
        let mut drops: Vec<Vec<u8>> = Vec::new();
        let mut removed: u64 = 0;

        for entry in engine.iter_all()? {
            let (kb, bytes) = entry?;
            let mut bucket = Bucket::decode(&bytes)?;
            let before = bucket.len();
            bucket.retain(|record| !record.matches(query));
            let hits = before - bucket.len();
            if hits == 0 {
                continue;
            }
            removed += hits as u64;
            if bucket.is_empty() {
                drops.push(kb);
            } else {
                rewrites.push((kb, bucket));
            }
        }

        for (kb, bucket) in rewrites {
            engine.put(&kb, &bucket.encode()?)?;
        }
        for kb in drops {
            engine.delete(&kb)?;
        }

        debug!("delete: {} records removed", removed);
        Ok(removed)
    }

    /// Delete the single record [`find_one`](Self::find_one) would
    /// return. Returns `true` if a record was removed; repeating the call
    /// once nothing matches is a no-op.
    pub fn delete_one(&self, query: &Record) -> Result<bool, StoreError> {
        self.store.check_open()?;
        let engine = self.store.engine();

        // Full scan first: the lowest-key bucket with a match wins, and a
        // decode failure anywhere aborts before any mutation.
        let mut best: Option<(i64, Vec<u8>, Bucket)> = None;
        for entry in engine.iter_all()? {
            let (kb, bytes) = entry?;
            let bucket = Bucket::decode(&bytes)?;
            if bucket.records().iter().any(|record| record.matches(query)) {
                let key = key_from_bytes(&kb)?;
                if best.as_ref().is_none_or(|(k, _, _)| key < *k) {
                    best = Some((key, kb, bucket));
                }
            }
        }

        let Some((key, kb, mut bucket)) = best else {
            return Ok(false);
        };

        let mut taken = false;
        bucket.retain(|record| {
            if !taken && record.matches(query) {
                taken = true;
                false
            } else {
                true
            }
        });

        if bucket.is_empty() {
            engine.delete(&kb)?;
        } else {
            engine.put(&kb, &bucket.encode()?)?;
        }
        debug!("delete_one: removed record from bucket {}", key);
        Ok(true)
    }

    /// Scan the whole datastore, returning `(key, record)` for every
    /// match, stable-sorted ascending by key.
    fn scan_matches(&self, query: &Record) -> Result<Vec<(i64, Record)>, StoreError> {
        let engine = self.store.engine();
        let mut results: Vec<(i64, Record)> = Vec::new();

        for entry in engine.iter_all()? {
            let (kb, bytes) = entry?;
            let key = key_from_bytes(&kb)?;
            let bucket = Bucket::decode(&bytes)?;
            for record in bucket.into_records() {
                if record.matches(query) {
                    results.push((key, record));
                }
            }
        }

        // Stable: same-key matches keep their in-bucket order.
        results.sort_by_key(|(key, _)| *key);
        Ok(results)
    }
}
