//! End-to-end tests over the public API: the dictionary facade, the
//! time-bucketed store, and persistence through the file-backed engine.

use chronostore::{Codec, Datum, MemoryEngine, Record, Store, StoreConfig, StoreError, TsStore};
use tracing::Level;
use tracing_subscriber::fmt::Subscriber;

const TS: u32 = 0;
const NAME: u32 = 1;
const KIND: u32 = 2;

fn init_tracing() {
    let _ = Subscriber::builder()
        .with_max_level(Level::TRACE)
        .try_init();
}

fn mem_config(key_codec: Codec, value_codec: Codec) -> StoreConfig {
    StoreConfig {
        url: "mem://".to_owned(),
        datastore: "it".to_owned(),
        key_codec,
        value_codec,
        ..Default::default()
    }
}

fn entry(ts: i64, name: &str, kind: i64) -> Record {
    Record::new()
        .with_int(TS, ts)
        .with_str(NAME, name)
        .with_int(KIND, kind)
}

// ------------------------------------------------------------------------------------------------
// Dictionary facade
// ------------------------------------------------------------------------------------------------

#[test]
fn test_dict_round_trip_str_keys_record_values() {
    init_tracing();

    let store = Store::open(mem_config(Codec::Str, Codec::Record)).unwrap();
    let key = Datum::Str("session-1".to_owned());
    let value = Datum::Record(entry(1000, "alice", 1));

    store.set(&key, &value).unwrap();
    assert!(store.contains(&key).unwrap());
    assert_eq!(store.get(&key).unwrap(), value);
    assert_eq!(store.keys().unwrap(), vec![key.clone()]);

    let old = store.delete(&key).unwrap();
    assert_eq!(old, value);
    assert!(store.is_empty().unwrap());
}

#[test]
fn test_dict_get_or_and_not_found() {
    init_tracing();

    let store = Store::open(mem_config(Codec::Int, Codec::Int)).unwrap();
    let missing = Datum::Int(7);

    assert!(matches!(store.get(&missing), Err(StoreError::NotFound)));
    assert!(matches!(store.delete(&missing), Err(StoreError::NotFound)));
    assert_eq!(
        store.get_or(&missing, Datum::Int(-1)).unwrap(),
        Datum::Int(-1)
    );
}

#[test]
fn test_codec_mismatch_rejected() {
    init_tracing();

    let store = Store::open(mem_config(Codec::Int, Codec::Str)).unwrap();
    let res = store.set(&Datum::Str("oops".to_owned()), &Datum::Str("v".to_owned()));
    assert!(matches!(res, Err(StoreError::Codec(_))));
    assert!(store.is_empty().unwrap());
}

#[test]
fn test_legacy_codec_tags() {
    init_tracing();

    assert_eq!(Codec::from_tag('b').unwrap(), Codec::Bytes);
    assert_eq!(Codec::from_tag('i').unwrap(), Codec::Int);
    assert_eq!(Codec::from_tag('s').unwrap(), Codec::Str);
    assert_eq!(Codec::from_tag('f').unwrap(), Codec::Float);
    assert_eq!(Codec::from_tag('B').unwrap(), Codec::Record);
    assert!(Codec::from_tag('O').is_err());
    assert!(Codec::from_tag('x').is_err());
}

#[test]
fn test_invalid_config_rejected() {
    init_tracing();

    let mut config = mem_config(Codec::Bytes, Codec::Bytes);
    config.datastore.clear();
    assert!(matches!(Store::open(config), Err(StoreError::Config(_))));

    let mut config = mem_config(Codec::Bytes, Codec::Bytes);
    config.url = "ftp://nope".to_owned();
    assert!(matches!(Store::open(config), Err(StoreError::Config(_))));
}

#[test]
fn test_close_rejects_further_operations() {
    init_tracing();

    let store = Store::open(mem_config(Codec::Int, Codec::Int)).unwrap();
    store.set(&Datum::Int(1), &Datum::Int(10)).unwrap();
    store.close().unwrap();
    store.close().unwrap(); // idempotent

    assert!(matches!(
        store.get(&Datum::Int(1)),
        Err(StoreError::Closed)
    ));
    assert!(matches!(
        store.set(&Datum::Int(2), &Datum::Int(20)),
        Err(StoreError::Closed)
    ));
}

#[test]
fn test_caller_supplied_engine() {
    init_tracing();

    let engine = Box::new(MemoryEngine::new("custom"));
    let store = Store::with_engine(engine, Codec::Str, Codec::Int);

    store
        .set(&Datum::Str("answer".to_owned()), &Datum::Int(42))
        .unwrap();
    assert_eq!(
        store.get(&Datum::Str("answer".to_owned())).unwrap(),
        Datum::Int(42)
    );
    assert_eq!(store.stats().unwrap().name, "custom");
}

#[test]
fn test_stats_reflect_operations() {
    init_tracing();

    let store = Store::open(mem_config(Codec::Int, Codec::Int)).unwrap();
    store.set(&Datum::Int(1), &Datum::Int(10)).unwrap();
    store.set(&Datum::Int(2), &Datum::Int(20)).unwrap();
    store.delete(&Datum::Int(1)).unwrap();
    store.commit().unwrap();

    let stats = store.stats().unwrap();
    assert_eq!(stats.name, "it");
    assert_eq!(stats.valid_items, 1);
    assert_eq!(stats.puts, 2);
    assert_eq!(stats.deletes, 1);
    assert_eq!(stats.commits, 1);
}

// ------------------------------------------------------------------------------------------------
// Time-bucketed store
// ------------------------------------------------------------------------------------------------

#[test]
fn test_ts_bucket_layout_through_public_api() {
    init_tracing();

    let store = TsStore::open(mem_config(Codec::Int, Codec::Bytes), TS).unwrap();
    store
        .insert_many(vec![entry(1000, "a", 1), entry(1005, "b", 1), entry(1020, "c", 1)])
        .unwrap();

    // 1000 and 1005 share the 1000 window; 1020 starts its own.
    assert_eq!(
        store.keys().unwrap(),
        vec![Datum::Int(1000), Datum::Int(1020)]
    );
    assert_eq!(store.len().unwrap(), 2);
    assert_eq!(store.find(&Record::new()).unwrap().len(), 3);
}

#[test]
fn test_ts_find_sorted_and_filtered() {
    init_tracing();

    let store = TsStore::open(mem_config(Codec::Int, Codec::Bytes), TS).unwrap();
    store
        .insert_many(vec![
            entry(1031, "d", 2),
            entry(1000, "a", 1),
            entry(1005, "b", 2),
        ])
        .unwrap();

    let all = store.find(&Record::new()).unwrap();
    let names: Vec<_> = all.iter().map(|r| r.get_str(NAME).unwrap()).collect();
    assert_eq!(names, vec!["a", "b", "d"]);

    let kind2 = store.find(&Record::new().with_int(KIND, 2)).unwrap();
    let names: Vec<_> = kind2.iter().map(|r| r.get_str(NAME).unwrap()).collect();
    assert_eq!(names, vec!["b", "d"]);
}

#[test]
fn test_ts_delete_one_then_delete_rest() {
    init_tracing();

    let store = TsStore::open(mem_config(Codec::Int, Codec::Bytes), TS).unwrap();
    store
        .insert_many(vec![entry(1000, "a", 1), entry(1001, "b", 1), entry(1020, "c", 1)])
        .unwrap();

    assert!(store.delete_one(&Record::new().with_int(KIND, 1)).unwrap());
    assert_eq!(store.find(&Record::new()).unwrap().len(), 2);

    assert_eq!(store.delete(&Record::new().with_int(KIND, 1)).unwrap(), 2);
    assert!(!store.delete_one(&Record::new().with_int(KIND, 1)).unwrap());
    assert!(store.is_empty().unwrap());
}

#[test]
fn test_corrupted_bucket_aborts_scans() {
    init_tracing();

    let store = TsStore::open(mem_config(Codec::Int, Codec::Bytes), TS).unwrap();
    store.insert_one(entry(1000, "a", 1)).unwrap();

    // Plant garbage under another bucket key through the dict surface.
    store
        .set(&Datum::Int(2000), &Datum::Bytes(vec![0xDE, 0xAD, 0xBE, 0xEF]))
        .unwrap();

    assert!(matches!(
        store.find(&Record::new()),
        Err(StoreError::Serialization(_))
    ));
    assert!(matches!(
        store.delete(&Record::new()),
        Err(StoreError::Serialization(_))
    ));
    // The failed delete mutated nothing.
    assert_eq!(store.len().unwrap(), 2);
}

// ------------------------------------------------------------------------------------------------
// Persistence
// ------------------------------------------------------------------------------------------------

#[test]
fn test_ts_persists_across_reopen() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let url = format!("file://{}", dir.path().join("it.redb").display());
    let config = StoreConfig {
        url,
        datastore: "events".to_owned(),
        key_codec: Codec::Int,
        value_codec: Codec::Bytes,
        ..Default::default()
    };

    {
        let store = TsStore::open(config.clone(), TS).unwrap();
        store
            .insert_many(vec![entry(1000, "a", 1), entry(1005, "b", 2)])
            .unwrap();
        store.close().unwrap();
    }

    let store = TsStore::open(config, TS).unwrap();
    let all = store.find(&Record::new()).unwrap();
    let names: Vec<_> = all.iter().map(|r| r.get_str(NAME).unwrap()).collect();
    assert_eq!(names, vec!["a", "b"]);

    let hit = store
        .find_one(&Record::new().with_int(KIND, 2))
        .unwrap()
        .unwrap();
    assert_eq!(hit.get_str(NAME).unwrap(), "b");
}

#[test]
fn test_dict_persists_across_reopen() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let url = format!("file://{}", dir.path().join("kv.redb").display());
    let config = StoreConfig {
        url,
        datastore: "settings".to_owned(),
        key_codec: Codec::Str,
        value_codec: Codec::Float,
        ..Default::default()
    };

    {
        let store = Store::open(config.clone()).unwrap();
        store
            .set(&Datum::Str("threshold".to_owned()), &Datum::Float(0.75))
            .unwrap();
        store.close().unwrap();
    }

    let store = Store::open(config).unwrap();
    assert_eq!(
        store.get(&Datum::Str("threshold".to_owned())).unwrap(),
        Datum::Float(0.75)
    );
}

#[test]
fn test_cleanup_empties_persistent_store() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let url = format!("file://{}", dir.path().join("gc.redb").display());
    let config = StoreConfig {
        url,
        datastore: "gc".to_owned(),
        key_codec: Codec::Int,
        value_codec: Codec::Int,
        ..Default::default()
    };

    let store = Store::open(config).unwrap();
    store.set(&Datum::Int(1), &Datum::Int(10)).unwrap();
    store.set(&Datum::Int(2), &Datum::Int(20)).unwrap();

    store.cleanup().unwrap();
    assert!(store.is_empty().unwrap());
    assert!(store.keys().unwrap().is_empty());
}
