//! Property-based tests (fuzzing) for the record tree and merge engine.
//!
//! Uses proptest to generate random batches and malformed inputs and verify
//! the tree invariants hold and nothing panics.
//!
//! Run with: `cargo test --test proptest_fuzz`

use std::collections::BTreeSet;

use proptest::prelude::*;
use serde_json::{json, Map, Value};

use bug_mirror::storage::traits::decode_tree;
use bug_mirror::{build_node, plan_merge, serialize_batch, Record, RecordSet};

// =============================================================================
// Strategies for generating test data
// =============================================================================

/// Timestamps from a small range so batches collide on creation_time.
fn timestamp_strategy() -> impl Strategy<Value = String> {
    (1u32..=3, 1u32..=9, 0u32..=3).prop_map(|(month, day, hour)| {
        format!("20200{}0{}T0{}:00:00", month, day, hour)
    })
}

fn bug_strategy() -> impl Strategy<Value = Record> {
    (any::<u32>(), timestamp_strategy(), "[a-z]{3,8}").prop_map(|(id, created, severity)| {
        json!({"id": id, "creation_time": created, "severity": severity})
            .as_object()
            .cloned()
            .unwrap()
    })
}

fn created(record: &Record) -> &str {
    record
        .get("creation_time")
        .and_then(Value::as_str)
        .unwrap_or_default()
}

fn batch_strategy() -> impl Strategy<Value = RecordSet> {
    prop::collection::vec(bug_strategy(), 1..20).prop_map(|records| RecordSet::new("bugs", records))
}

/// Arbitrary JSON values (including nested arrays and objects)
fn arbitrary_json_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        ".*".prop_map(Value::String),
    ];

    leaf.prop_recursive(
        4,   // depth
        64,  // max nodes
        10,  // items per collection
        |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..10).prop_map(Value::Array),
                prop::collection::hash_map("[a-z_]{1,10}", inner, 0..10)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        },
    )
}

fn arbitrary_record_strategy() -> impl Strategy<Value = Record> {
    prop::collection::hash_map("[a-z_]{1,10}", arbitrary_json_strategy(), 0..12)
        .prop_map(|m| m.into_iter().collect::<Map<String, Value>>())
}

// =============================================================================
// Tree Builder Properties
// =============================================================================

proptest! {
    /// Array-valued fields never reach the tree; every other field does.
    #[test]
    fn prop_arrays_never_persisted(record in arbitrary_record_strategy()) {
        let node = build_node("bug", &record);

        let kept: BTreeSet<&str> = node.children().iter().map(|c| c.name.as_str()).collect();
        let expected: BTreeSet<&str> = record
            .iter()
            .filter(|(_, v)| !v.is_array())
            .map(|(k, _)| k.as_str())
            .collect();

        prop_assert_eq!(kept, expected);
    }

    /// Watermark and count agree with the batch.
    #[test]
    fn prop_serialize_batch_invariants(batch in batch_strategy()) {
        let tree = serialize_batch(&batch, "bug").unwrap();

        let newest = batch
            .records
            .iter()
            .filter_map(|r| r.get("creation_time").and_then(Value::as_str))
            .max()
            .unwrap();

        prop_assert_eq!(tree.count, batch.len());
        prop_assert_eq!(tree.watermark.as_str(), newest);
        prop_assert!(tree.check_invariants().is_ok());
    }
}

// =============================================================================
// Merge Properties
// =============================================================================

proptest! {
    /// Merging only ever appends and never moves the watermark backwards.
    #[test]
    fn prop_merge_is_monotonic(existing in batch_strategy(), fresh in batch_strategy()) {
        let existing = serialize_batch(&existing, "bug").unwrap();
        let fresh = serialize_batch(&fresh, "bug").unwrap();

        let outcome = plan_merge(existing.clone(), fresh);
        let merged = outcome.tree();

        prop_assert!(merged.count >= existing.count);
        prop_assert!(merged.watermark >= existing.watermark);
        prop_assert_eq!(&merged.records[..existing.count], &existing.records[..]);
        prop_assert!(merged.check_invariants().is_ok());
    }

    /// An inclusive fetch from the stored watermark grows the tree by exactly
    /// the records created after it.
    #[test]
    fn prop_merge_count_matches_inclusive_fetch(
        initial in batch_strategy(),
        later in prop::collection::vec(bug_strategy(), 0..20),
    ) {
        let existing = serialize_batch(&initial, "bug").unwrap();
        let watermark = existing.watermark.clone();

        // The tracker re-returns the record sitting on the watermark
        let boundary = initial
            .records
            .iter()
            .find(|r| created(r) == watermark)
            .cloned()
            .unwrap();
        let mut fetched = vec![boundary];
        fetched.extend(later.into_iter().filter(|r| created(r) >= watermark.as_str()));
        let newer = fetched.iter().filter(|r| created(r) > watermark.as_str()).count();
        let newest = fetched.iter().map(created).max().unwrap().to_string();

        let fresh = serialize_batch(&RecordSet::new("bugs", fetched), "bug").unwrap();
        let merged = plan_merge(existing.clone(), fresh).into_tree();

        prop_assert_eq!(merged.count, existing.count + newer);
        prop_assert_eq!(merged.records.len(), existing.count + newer);
        prop_assert_eq!(&merged.watermark, &newest);
        prop_assert!(merged.check_invariants().is_ok());
    }

    /// No appended record sits exactly on the previous watermark.
    #[test]
    fn prop_merge_drops_boundary(existing in batch_strategy(), fresh in batch_strategy()) {
        let existing = serialize_batch(&existing, "bug").unwrap();
        let fresh = serialize_batch(&fresh, "bug").unwrap();
        let previous = existing.watermark.clone();
        let kept = existing.count;

        let outcome = plan_merge(existing, fresh);

        for node in &outcome.tree().records[kept..] {
            prop_assert_ne!(node.creation_time(), Some(previous.as_str()));
        }
    }

    /// Merging a batch into itself changes nothing.
    #[test]
    fn prop_merge_same_batch_is_up_to_date(batch in batch_strategy()) {
        let tree = serialize_batch(&batch, "bug").unwrap();

        let outcome = plan_merge(tree.clone(), tree.clone());

        prop_assert_eq!(outcome.appended(), 0);
        prop_assert_eq!(outcome.into_tree(), tree);
    }
}

// =============================================================================
// Decoding Fuzz Tests
// =============================================================================

proptest! {
    /// Decoding arbitrary bytes never panics, only returns Err
    #[test]
    fn fuzz_decode_random_bytes(bytes in prop::collection::vec(any::<u8>(), 0..4096)) {
        let _ = decode_tree("gnote", &bytes);
    }

    /// Arbitrary JSON documents decode or fail cleanly
    #[test]
    fn fuzz_decode_arbitrary_json(doc in arbitrary_json_strategy()) {
        let bytes = serde_json::to_vec(&doc).unwrap();
        let _ = decode_tree("gnote", &bytes);
    }

    /// Records of arbitrary shape serialize or fail with a clean error
    #[test]
    fn fuzz_serialize_arbitrary_records(records in prop::collection::vec(arbitrary_record_strategy(), 0..8)) {
        let _ = serialize_batch(&RecordSet::new("bugs", records), "bug");
    }
}
