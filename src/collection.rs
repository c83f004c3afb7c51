// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Collection serializer.
//!
//! Turns one fetched [`RecordSet`] into a [`RecordTree`]: the persisted form
//! of a product's mirror. The root carries the record-set tag (e.g. `bugs`),
//! the watermark (maximum `creation_time`) and the record count.
//!
//! `creation_time` values are compared as strings. The tracker formats them
//! zero-padded (`YYYYMMDDThh:mm:ss`, no timezone), so lexicographic order is
//! chronological order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MirrorError, Result};
use crate::record::{build_node, nesting_depth, FieldShape, Record, TreeNode, CREATION_TIME, MAX_RECORD_DEPTH};
use crate::remote::RemoteError;

/// Records for one product as returned by a single remote fetch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordSet {
    /// Top-level key of the remote response (e.g. `bugs`)
    pub tag: String,
    pub records: Vec<Record>,
}

impl RecordSet {
    pub fn new(tag: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            tag: tag.into(),
            records,
        }
    }

    /// Parse a raw response of the shape `{tag: [record, ...]}`.
    ///
    /// The record set is the array under the lowest key in byte order
    /// (`serde_json` keeps object keys sorted, not in document order).
    /// Non-array keys (warnings, fault details) are ignored.
    pub fn from_value(value: Value) -> std::result::Result<Self, RemoteError> {
        let Value::Object(map) = value else {
            return Err(RemoteError::Malformed(
                "expected an object keyed by record tag".to_string(),
            ));
        };

        let (tag, items) = map
            .into_iter()
            .find_map(|(key, value)| match value {
                Value::Array(items) => Some((key, items)),
                _ => None,
            })
            .ok_or_else(|| RemoteError::Malformed("response carries no record list".to_string()))?;

        let records = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(record) => Ok(record),
                other => Err(RemoteError::Malformed(format!(
                    "record {} of '{}' is not an object: {}",
                    index, tag, other
                ))),
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self { tag, records })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Persisted state of one product.
///
/// Invariants (checked by [`RecordTree::check_invariants`] when a store
/// loads a tree):
/// - `count == records.len()`
/// - `watermark` is the maximum `creation_time` among `records`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTree {
    pub tag: String,
    pub watermark: String,
    pub count: usize,
    pub records: Vec<TreeNode>,
}

impl RecordTree {
    /// Verify the root attributes agree with the children.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        if self.count != self.records.len() {
            return Err(format!(
                "count is {} but tree holds {} records",
                self.count,
                self.records.len()
            ));
        }

        let mut max: Option<&str> = None;
        for (index, node) in self.records.iter().enumerate() {
            let created = node
                .creation_time()
                .ok_or_else(|| format!("record {} has no {}", index, CREATION_TIME))?;
            if max.map_or(true, |m| created > m) {
                max = Some(created);
            }
        }

        match max {
            Some(max) if max != self.watermark => Err(format!(
                "watermark is '{}' but newest record was created '{}'",
                self.watermark, max
            )),
            None => Err("tree holds no records".to_string()),
            _ => Ok(()),
        }
    }

    /// Record nodes in stored order.
    pub fn iter(&self) -> impl Iterator<Item = &TreeNode> {
        self.records.iter()
    }

    /// Each record's text for `field`, skipping records that lack it.
    pub fn field_values<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.records.iter().filter_map(move |node| node.field_text(field))
    }

    /// Number of records per distinct value of `field` (e.g. `severity`).
    #[must_use]
    pub fn field_histogram(&self, field: &str) -> BTreeMap<String, usize> {
        self.field_values(field)
            .fold(BTreeMap::new(), |mut counts, value| {
                *counts.entry(value.to_string()).or_insert(0) += 1;
                counts
            })
    }

    /// Records as JSON objects (leaves as strings).
    #[must_use]
    pub fn to_records(&self) -> Vec<Value> {
        self.records.iter().map(TreeNode::to_value).collect()
    }
}

/// Text of a record's `creation_time`, or why it cannot be used.
fn creation_time_of(index: usize, record: &Record) -> Result<String> {
    let value = record.get(CREATION_TIME).ok_or_else(|| MirrorError::MalformedRecord {
        index,
        reason: format!("missing '{}'", CREATION_TIME),
    })?;

    match FieldShape::of(value) {
        FieldShape::Leaf(text) if !text.is_empty() => Ok(text),
        _ => Err(MirrorError::MalformedRecord {
            index,
            reason: format!("'{}' is not a timestamp: {}", CREATION_TIME, value),
        }),
    }
}

/// Build the full tree for a batch.
///
/// Each record becomes a child named `record_node`. Does not persist.
/// Records nested deeper than [`MAX_RECORD_DEPTH`] are rejected, since
/// their tree could be written but never read back.
pub fn serialize_batch(set: &RecordSet, record_node: &str) -> Result<RecordTree> {
    if set.is_empty() {
        return Err(MirrorError::EmptyBatch { tag: set.tag.clone() });
    }

    let mut watermark = String::new();
    let mut records = Vec::with_capacity(set.len());

    for (index, record) in set.records.iter().enumerate() {
        let created = creation_time_of(index, record)?;
        if nesting_depth(record, MAX_RECORD_DEPTH).is_none() {
            return Err(MirrorError::MalformedRecord {
                index,
                reason: format!("nested deeper than {} levels", MAX_RECORD_DEPTH),
            });
        }
        if created > watermark {
            watermark = created;
        }
        records.push(build_node(record_node, record));
    }

    Ok(RecordTree {
        tag: set.tag.clone(),
        watermark,
        count: records.len(),
        records,
    })
}
