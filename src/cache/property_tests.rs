//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the store and key properties the pipeline and the
//! invalidator rely on.

use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use crate::cache::{CacheBackend, CacheKey, CacheStore, MemoryBackend, MAX_KEY_LENGTH};
use crate::resource::{InboundRequest, RequestDescriptor, ResourceKind, UpstreamTarget};

// == Test Configuration ==
const TEST_MAX_ENTRIES: usize = 100;
const TEST_TTL: Option<Duration> = Some(Duration::from_secs(300));

// == Strategies ==
/// Generates valid cache keys (non-empty, within length limit)
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_:]{1,64}"
}

/// Generates payloads shaped like upstream JSON
fn payload_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,128}".prop_map(|title| format!(r#"{{"title":"{}"}}"#, title))
}

fn kind_strategy() -> impl Strategy<Value = ResourceKind> {
    prop_oneof![
        Just(ResourceKind::Item),
        Just(ResourceKind::List),
        Just(ResourceKind::Multi),
    ]
}

fn query_strategy() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map("[a-z]{1,8}", "[a-z0-9]{0,8}", 0..4)
}

fn descriptor(kind: ResourceKind, path: &str, query: BTreeMap<String, String>) -> RequestDescriptor {
    RequestDescriptor {
        kind,
        template: "item.html".into(),
        target: UpstreamTarget::Path(path.to_string()),
        query,
        request: InboundRequest::get("/"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Round-trip: a stored payload reads back unchanged until it expires
    #[test]
    fn prop_round_trip(key in valid_key_strategy(), value in payload_strategy()) {
        let mut store = CacheStore::new(TEST_MAX_ENTRIES);
        store.set(key.clone(), value.clone(), TEST_TTL).unwrap();
        prop_assert_eq!(store.get(&key), Some(value));
    }

    // Overwrite: the last write wins and the entry count does not grow
    #[test]
    fn prop_overwrite_keeps_last_value(
        key in valid_key_strategy(),
        values in prop::collection::vec(payload_strategy(), 1..10),
    ) {
        let mut store = CacheStore::new(TEST_MAX_ENTRIES);
        for value in &values {
            store.set(key.clone(), value.clone(), TEST_TTL).unwrap();
        }
        prop_assert_eq!(store.len(), 1);
        let got = store.get(&key);
        prop_assert_eq!(got.as_ref(), values.last());
    }

    // Capacity: the store never holds more than max_entries
    #[test]
    fn prop_capacity_is_bounded(
        capacity in 1usize..20,
        keys in prop::collection::vec(valid_key_strategy(), 1..60),
    ) {
        let mut store = CacheStore::new(capacity);
        for key in &keys {
            store.set(key.clone(), "v".into(), TEST_TTL).unwrap();
            prop_assert!(store.len() <= capacity);
        }

        let distinct: HashSet<_> = keys.iter().collect();
        prop_assert_eq!(store.len(), distinct.len().min(capacity));
        // The most recent write always survives eviction
        prop_assert!(store.get(keys.last().unwrap()).is_some());
    }

    // Oversized keys are rejected rather than truncated
    #[test]
    fn prop_oversized_key_rejected(extra in 1usize..64) {
        let mut store = CacheStore::new(TEST_MAX_ENTRIES);
        let key = "k".repeat(MAX_KEY_LENGTH + extra);
        prop_assert!(store.set(key, "v".into(), TEST_TTL).is_err());
        prop_assert!(store.is_empty());
    }

    // Fingerprint determinism: equal identity gives an equal key
    #[test]
    fn prop_key_is_deterministic(
        kind in kind_strategy(),
        path in "[a-z0-9/]{1,32}",
        query in query_strategy(),
    ) {
        let a = CacheKey::for_descriptor(&descriptor(kind, &path, query.clone()));
        let b = CacheKey::for_descriptor(&descriptor(kind, &path, query));
        prop_assert!(a.is_some());
        prop_assert_eq!(a, b);
    }

    // Fingerprint separation: distinct paths never share a key
    #[test]
    fn prop_distinct_paths_distinct_keys(
        kind in kind_strategy(),
        a in "[a-z0-9/]{1,32}",
        b in "[a-z0-9/]{1,32}",
        query in query_strategy(),
    ) {
        prop_assume!(a != b);
        let key_a = CacheKey::for_descriptor(&descriptor(kind, &a, query.clone()));
        let key_b = CacheKey::for_descriptor(&descriptor(kind, &b, query));
        prop_assert_ne!(key_a, key_b);
    }

    // Eviction is idempotent: deleting twice leaves the same state as once
    #[test]
    fn prop_delete_idempotent(
        stored in prop::collection::btree_set(valid_key_strategy(), 1..10),
        targets in prop::collection::vec(valid_key_strategy(), 0..10),
    ) {
        let backend = MemoryBackend::new(TEST_MAX_ENTRIES);
        let (first, second, remaining) = tokio_test::block_on(async {
            for key in &stored {
                backend.set(key, "v", Duration::from_secs(300)).await.unwrap();
            }
            let first = backend.delete(&targets).await.unwrap();
            let second = backend.delete(&targets).await.unwrap();
            let remaining = backend.store().read().await.len();
            (first, second, remaining)
        });

        let targeted: HashSet<_> = targets.iter().collect();
        let expected_removed = stored.iter().filter(|key| targeted.contains(key)).count();
        prop_assert_eq!(first as usize, expected_removed);
        prop_assert_eq!(second, 0);
        prop_assert_eq!(remaining, stored.len() - expected_removed);
    }
}
