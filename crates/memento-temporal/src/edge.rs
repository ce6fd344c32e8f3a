//! Edge validity intervals (spec §4.3 "Open/close edge"): `openEdge` upserts
//! the edge keyed by `(from,to,type)` with its deterministic id (I3), sets
//! `validFrom`/`active=true`, clears `validTo`, and increments `version`;
//! `closeEdge` sets `validTo`/`active=false` on an existing edge.

use chrono::{DateTime, Utc};
use memento_core::flatten::{format_timestamp, parse_timestamp};
use memento_core::{Relationship, RelationshipType, Result};
use memento_graph_store::{GraphStore, RelUpsertRow, RelationshipFilter};
use memento_kgs::{props_to_relationship, relationship_metadata};
use std::collections::HashMap;

async fn find_edge<G: GraphStore>(
    graph: &G,
    from: &str,
    to: &str,
    rel_type: &RelationshipType,
) -> Result<Option<HashMap<String, serde_json::Value>>> {
    let rows = graph
        .get_relationships(RelationshipFilter {
            from: Some(from.to_string()),
            to: Some(to.to_string()),
            rel_type: Some(rel_type.as_str().to_string()),
            ..Default::default()
        })
        .await?;
    Ok(rows.into_iter().next())
}

/// `openEdge(from,to,type,ts?,changeSetId?)` — upserts the edge keyed by
/// `(from,to,type)` (deterministic id `rel_<from>_<to>_<TYPE>`, I3), setting
/// `validFrom=ts` and clearing `validTo` on every call, incrementing
/// `version` past whatever was already stored. Returns the edge id.
pub async fn open_edge<G: GraphStore>(
    graph: &G,
    from: &str,
    to: &str,
    rel_type: &RelationshipType,
    ts: Option<DateTime<Utc>>,
    change_set_id: Option<String>,
) -> Result<String> {
    let ts = ts.unwrap_or_else(Utc::now);
    let id = Relationship::deterministic_id(from, to, rel_type);
    let existing = find_edge(graph, from, to, rel_type).await?;

    let (created, version, mut metadata) = match existing.as_ref().and_then(props_to_relationship) {
        Some(rel) => (rel.created, rel.version + 1, relationship_metadata(&rel)),
        None => (ts, 1, HashMap::new()),
    };
    if let Some(change_set_id) = change_set_id {
        metadata.insert("changeSetId".to_string(), serde_json::json!(change_set_id));
    }

    graph
        .merge_relationship(
            rel_type.as_str(),
            RelUpsertRow {
                id: id.clone(),
                from_entity_id: from.to_string(),
                to_entity_id: to.to_string(),
                created,
                last_modified: ts,
                version,
                metadata,
                valid_from: Some(ts),
            },
        )
        .await?;

    let mut props = HashMap::new();
    props.insert("active".to_string(), serde_json::json!(true));
    props.insert("validTo".to_string(), serde_json::Value::Null);
    graph.set_relationship_props(&id, props).await?;
    Ok(id)
}

/// `closeEdge(from,to,type,ts?)` — sets `validTo = coalesce(validTo, ts)` and
/// `active=false` on the edge keyed by `(from,to,type)`. Returns `false` if no
/// such edge exists; closing does not create one.
pub async fn close_edge<G: GraphStore>(
    graph: &G,
    from: &str,
    to: &str,
    rel_type: &RelationshipType,
    ts: Option<DateTime<Utc>>,
) -> Result<bool> {
    let ts = ts.unwrap_or_else(Utc::now);
    let id = Relationship::deterministic_id(from, to, rel_type);
    let existing_valid_to = find_edge(graph, from, to, rel_type)
        .await?
        .and_then(|row| row.get("validTo").and_then(serde_json::Value::as_str).and_then(parse_timestamp));
    let valid_to = existing_valid_to.unwrap_or(ts);

    let mut props = HashMap::new();
    props.insert("active".to_string(), serde_json::json!(false));
    props.insert("validTo".to_string(), serde_json::json!(format_timestamp(valid_to)));
    graph.set_relationship_props(&id, props).await
}

/// Whether a relationship was valid at `as_of` (spec §4.3 time-travel
/// predicate): `validFrom` is absent or `<= as_of`, and `validTo` is absent
/// or `> as_of`.
#[must_use]
pub fn valid_at(valid_from: Option<DateTime<Utc>>, valid_to: Option<DateTime<Utc>>, as_of: DateTime<Utc>) -> bool {
    let from_ok = valid_from.map_or(true, |f| f <= as_of);
    let to_ok = valid_to.map_or(true, |t| t > as_of);
    from_ok && to_ok
}
