//! Shared request/response types for the [`crate::VectorStore`] trait.

use serde_json::Value;
use std::collections::HashMap;

/// One point to upsert (spec §6: "named collections ... `upsert(collection,
/// points[{id:int, vector:float[], payload:map}])`").
#[derive(Debug, Clone)]
pub struct VectorPoint {
    /// 32-bit-unsigned-safe numeric id, typically [`memento_core::ids::entity_point_id`].
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, Value>,
}

/// A single field-equality condition, the only shape spec §6 requires
/// (`filter:{must:[{key,match:{value}}]}`).
#[derive(Debug, Clone)]
pub struct FieldMatch {
    pub key: String,
    pub value: Value,
}

/// A conjunction of [`FieldMatch`] conditions.
#[derive(Debug, Clone, Default)]
pub struct PointFilter {
    pub must: Vec<FieldMatch>,
}

impl PointFilter {
    #[must_use]
    pub fn eq(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            must: vec![FieldMatch {
                key: key.into(),
                value: value.into(),
            }],
        }
    }
}

/// One scored hit from [`crate::VectorStore::search`].
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: u64,
    pub score: f32,
    pub payload: HashMap<String, Value>,
}
