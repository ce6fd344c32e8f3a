//! Time-travel traversal (spec §4.3 "Time-travel traversal", property P5).

use crate::edge::valid_at;
use chrono::{DateTime, Utc};
use memento_core::flatten::parse_timestamp;
use memento_core::{Relationship, RelationshipType, Result};
use memento_graph_store::{GraphStore, RelationshipFilter};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Either a single instant or a window; determines which validity predicate
/// [`time_travel_traversal`] applies (spec §4.3).
#[derive(Debug, Clone, Copy)]
pub enum TimeQuery {
    At(DateTime<Utc>),
    Window(DateTime<Utc>, DateTime<Utc>),
}

/// Options for [`time_travel_traversal`].
#[derive(Debug, Clone)]
pub struct TimeTravelRequest {
    pub start: String,
    pub time: TimeQuery,
    pub max_depth: u8,
    pub rel_types: Vec<RelationshipType>,
}

/// Result of a time-travel traversal: the entity ids touched and the edges
/// whose validity interval satisfied the predicate.
#[derive(Debug, Clone, Default)]
pub struct TimeTravelResult {
    pub entity_ids: Vec<String>,
    pub relationships: Vec<Relationship>,
}

/// `timeTravelTraversal({start, atTime? | (since,until)?, maxDepth≤5, types?})`
/// (spec §4.3). Only edges whose validity interval satisfies the point/window
/// predicate are followed; `maxDepth` is clamped to `[1,5]` (B1).
pub async fn time_travel_traversal<G: GraphStore>(
    graph: &G,
    request: &TimeTravelRequest,
) -> Result<TimeTravelResult> {
    let max_depth = request.max_depth.clamp(1, 5);
    let allowed_types: HashSet<&str> = request.rel_types.iter().map(RelationshipType::as_str).collect();

    let mut visited_entities: HashSet<String> = HashSet::from([request.start.clone()]);
    let mut visited_edges: HashMap<String, Relationship> = HashMap::new();
    let mut frontier = vec![request.start.clone()];

    for _ in 0..max_depth {
        if frontier.is_empty() {
            break;
        }
        let mut next = Vec::new();
        for node in &frontier {
            let outgoing = graph
                .get_relationships(RelationshipFilter { from: Some(node.clone()), ..Default::default() })
                .await?;
            for row in outgoing {
                if !allowed_types.is_empty() {
                    let Some(t) = row.get("type").and_then(Value::as_str) else {
                        continue;
                    };
                    if !allowed_types.contains(t) {
                        continue;
                    }
                }
                if !satisfies(&row, request.time) {
                    continue;
                }
                let Some(rel) = memento_kgs::props_to_relationship(&row) else {
                    continue;
                };
                if visited_entities.insert(rel.to_entity_id.clone()) {
                    next.push(rel.to_entity_id.clone());
                }
                visited_edges.insert(rel.id.clone(), rel);
            }
        }
        frontier = next;
    }

    Ok(TimeTravelResult {
        entity_ids: visited_entities.into_iter().collect(),
        relationships: visited_edges.into_values().collect(),
    })
}

fn satisfies(row: &HashMap<String, Value>, time: TimeQuery) -> bool {
    let valid_from = row.get("validFrom").and_then(Value::as_str).and_then(parse_timestamp);
    let valid_to = row.get("validTo").and_then(Value::as_str).and_then(parse_timestamp);

    match time {
        TimeQuery::At(at) => valid_at(valid_from, valid_to, at),
        TimeQuery::Window(since, until) => {
            let from_overlaps = valid_from.map_or(true, |f| f <= until);
            let to_overlaps = valid_to.map_or(true, |t| t >= since);
            from_overlaps && to_overlaps
        }
    }
}
