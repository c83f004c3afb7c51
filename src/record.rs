// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Record tree builder.
//!
//! A [`Record`] is one tracked item as the remote tracker returns it: a JSON
//! object whose values are scalars, nested objects or arrays. [`build_node`]
//! converts it into a [`TreeNode`]:
//!
//! - nested object → child node (recursively)
//! - scalar → text leaf
//! - array → dropped
//!
//! An array-valued field never appears in a persisted tree, whatever it
//! holds.
//!
//! # Example
//!
//! ```
//! use bug_mirror::record::{build_node, Record};
//! use serde_json::json;
//!
//! let record: Record = json!({
//!     "id": 1,
//!     "creation_time": "20200101T00:00:00",
//!     "cc": ["someone@example.com"],
//!     "flags": {"review": "+"}
//! })
//! .as_object()
//! .cloned()
//! .unwrap();
//!
//! let node = build_node("bug", &record);
//! assert_eq!(node.field_text("id"), Some("1"));
//! assert!(node.field("cc").is_none());
//! assert_eq!(node.field("flags").and_then(|f| f.field_text("review")), Some("+"));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One remote record: field name → value.
pub type Record = Map<String, Value>;

/// Field every record must carry; drives the watermark.
pub const CREATION_TIME: &str = "creation_time";

/// Deepest object nesting a record may have, counting the record itself.
///
/// Every level costs two levels in the encoded tree (node object plus its
/// `children` array), and the decoder stops at 128.
pub const MAX_RECORD_DEPTH: usize = 32;

/// How a single field is carried into the tree. Decided once per field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldShape<'a> {
    Leaf(String),
    Nested(&'a Record),
    Omitted,
}

impl<'a> FieldShape<'a> {
    #[must_use]
    pub fn of(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => Self::Nested(map),
            Value::Array(_) => Self::Omitted,
            scalar => Self::Leaf(render_scalar(scalar)),
        }
    }
}

/// Locale-independent text for a scalar value.
///
/// Strings pass through untouched, numbers and booleans use their JSON
/// spelling and `null` becomes empty text.
#[must_use]
pub fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        container => container.to_string(),
    }
}

/// A node of a persisted tree.
///
/// Serializes as `{"name": .., "text": ..}` for leaves and
/// `{"name": .., "children": [..]}` for inner nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub name: String,
    #[serde(flatten)]
    pub body: NodeBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeBody {
    Text(String),
    Children(Vec<TreeNode>),
}

impl TreeNode {
    pub fn leaf(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: NodeBody::Text(text.into()),
        }
    }

    pub fn branch(name: impl Into<String>, children: Vec<TreeNode>) -> Self {
        Self {
            name: name.into(),
            body: NodeBody::Children(children),
        }
    }

    /// Leaf text, `None` for inner nodes.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            NodeBody::Text(text) => Some(text),
            NodeBody::Children(_) => None,
        }
    }

    /// Child nodes; empty for leaves.
    #[must_use]
    pub fn children(&self) -> &[TreeNode] {
        match &self.body {
            NodeBody::Text(_) => &[],
            NodeBody::Children(children) => children,
        }
    }

    /// First direct child with the given name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&TreeNode> {
        self.children().iter().find(|child| child.name == name)
    }

    #[must_use]
    pub fn field_text(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(TreeNode::text)
    }

    #[must_use]
    pub fn creation_time(&self) -> Option<&str> {
        self.field_text(CREATION_TIME)
    }

    /// Rebuild a JSON value from the node. Leaves come back as strings and
    /// dropped array fields stay dropped.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match &self.body {
            NodeBody::Text(text) => Value::String(text.clone()),
            NodeBody::Children(children) => Value::Object(
                children
                    .iter()
                    .map(|child| (child.name.clone(), child.to_value()))
                    .collect(),
            ),
        }
    }
}

/// Convert one record into a node named `name`.
#[must_use]
pub fn build_node(name: &str, record: &Record) -> TreeNode {
    TreeNode::branch(name, build_children(record))
}

/// Object nesting depth of `record` (a flat record is 1), or `None` once it
/// passes `limit`. Arrays do not count: they never reach the tree.
#[must_use]
pub fn nesting_depth(record: &Record, limit: usize) -> Option<usize> {
    if limit == 0 {
        return None;
    }
    let mut deepest = 1;
    for value in record.values() {
        if let Value::Object(inner) = value {
            deepest = deepest.max(1 + nesting_depth(inner, limit - 1)?);
        }
    }
    Some(deepest)
}

fn build_children(record: &Record) -> Vec<TreeNode> {
    record
        .iter()
        .filter_map(|(key, value)| match FieldShape::of(value) {
            FieldShape::Leaf(text) => Some(TreeNode::leaf(key.as_str(), text)),
            FieldShape::Nested(inner) => Some(build_node(key, inner)),
            FieldShape::Omitted => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_shape_of_scalars() {
        assert_eq!(FieldShape::of(&json!("major")), FieldShape::Leaf("major".into()));
        assert_eq!(FieldShape::of(&json!(42)), FieldShape::Leaf("42".into()));
        assert_eq!(FieldShape::of(&json!(1.5)), FieldShape::Leaf("1.5".into()));
        assert_eq!(FieldShape::of(&json!(true)), FieldShape::Leaf("true".into()));
        assert_eq!(FieldShape::of(&json!(null)), FieldShape::Leaf(String::new()));
    }

    /// Record whose `deep` field nests `levels` objects.
    fn nested(levels: usize) -> Record {
        let mut value = json!({"n": 0});
        for n in 1..levels {
            value = json!({"n": n, "inner": value});
        }
        record(json!({"id": 1, "deep": value}))
    }

    #[test]
    fn test_nesting_depth() {
        assert_eq!(nesting_depth(&record(json!({"id": 1, "cc": [{"a": {}}]})), 8), Some(1));
        assert_eq!(nesting_depth(&nested(1), 8), Some(2));
        assert_eq!(nesting_depth(&nested(7), 8), Some(8));
        assert_eq!(nesting_depth(&nested(8), 8), None);
        assert_eq!(nesting_depth(&nested(70), MAX_RECORD_DEPTH), None);
    }

    #[test]
    fn test_shape_of_containers() {
        let nested = json!({"a": 1});
        assert!(matches!(FieldShape::of(&nested), FieldShape::Nested(map) if map.len() == 1));
        assert_eq!(FieldShape::of(&json!([1, 2])), FieldShape::Omitted);
        assert_eq!(FieldShape::of(&json!([])), FieldShape::Omitted);
    }

    #[test]
    fn test_build_node_scalars_become_leaves() {
        let node = build_node("bug", &record(json!({
            "id": 7,
            "severity": "minor",
            "is_open": false
        })));

        assert_eq!(node.name, "bug");
        assert_eq!(node.children().len(), 3);
        assert_eq!(node.field_text("id"), Some("7"));
        assert_eq!(node.field_text("severity"), Some("minor"));
        assert_eq!(node.field_text("is_open"), Some("false"));
    }

    #[test]
    fn test_build_node_recurses_into_objects() {
        let node = build_node("bug", &record(json!({
            "assigned_to_detail": {
                "email": "dev@example.com",
                "meta": {"id": 3}
            }
        })));

        let detail = node.field("assigned_to_detail").unwrap();
        assert_eq!(detail.field_text("email"), Some("dev@example.com"));
        assert_eq!(detail.field("meta").unwrap().field_text("id"), Some("3"));
    }

    #[test]
    fn test_build_node_drops_arrays_everywhere() {
        let node = build_node("bug", &record(json!({
            "cc": ["a@example.com", "b@example.com"],
            "keywords": [],
            "detail": {"groups": [{"id": 1}], "name": "x"}
        })));

        assert!(node.field("cc").is_none());
        assert!(node.field("keywords").is_none());
        let detail = node.field("detail").unwrap();
        assert!(detail.field("groups").is_none());
        assert_eq!(detail.children().len(), 1);
    }

    #[test]
    fn test_empty_object_becomes_empty_branch() {
        let node = build_node("bug", &record(json!({"flags": {}})));
        let flags = node.field("flags").unwrap();
        assert!(flags.text().is_none());
        assert!(flags.children().is_empty());
    }

    #[test]
    fn test_to_value_rebuilds_object() {
        let node = build_node("bug", &record(json!({
            "id": 1,
            "creation_time": "20200101T00:00:00",
            "detail": {"name": "x"},
            "cc": ["dropped"]
        })));

        assert_eq!(
            node.to_value(),
            json!({
                "id": "1",
                "creation_time": "20200101T00:00:00",
                "detail": {"name": "x"}
            })
        );
    }

    #[test]
    fn test_serialized_form() {
        let node = TreeNode::branch("bug", vec![TreeNode::leaf("id", "1")]);
        let json_str = serde_json::to_string(&node).unwrap();
        assert_eq!(json_str, r#"{"name":"bug","children":[{"name":"id","text":"1"}]}"#);

        let back: TreeNode = serde_json::from_str(&json_str).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_creation_time_lookup() {
        let node = build_node("bug", &record(json!({"creation_time": "20200102T10:00:00"})));
        assert_eq!(node.creation_time(), Some("20200102T10:00:00"));
        assert_eq!(TreeNode::leaf("x", "y").creation_time(), None);
    }
}
