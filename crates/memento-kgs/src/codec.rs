//! Converts between domain types ([`Entity`], [`Relationship`]) and the
//! flattened property maps the graph store trait deals in (spec §9
//! "Flattening for the graph store").

use chrono::{DateTime, Utc};
use memento_core::flatten::{flatten_value, format_timestamp, parse_timestamp};
use memento_core::{Entity, EntityType, Location, Relationship, RelationshipType, SymbolKind};
use serde_json::Value;
use std::collections::HashMap;

fn put_opt_string(props: &mut HashMap<String, Value>, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        props.insert(key.to_string(), Value::String(v.clone()));
    }
}

fn put_opt_bool(props: &mut HashMap<String, Value>, key: &str, value: Option<bool>) {
    if let Some(v) = value {
        props.insert(key.to_string(), Value::Bool(v));
    }
}

fn put_opt_ts(props: &mut HashMap<String, Value>, key: &str, value: Option<DateTime<Utc>>) {
    if let Some(v) = value {
        props.insert(key.to_string(), Value::String(format_timestamp(v)));
    }
}

fn get_string(props: &HashMap<String, Value>, key: &str) -> Option<String> {
    props.get(key).and_then(Value::as_str).map(str::to_string)
}

fn get_bool(props: &HashMap<String, Value>, key: &str) -> Option<bool> {
    props.get(key).and_then(Value::as_bool)
}

fn get_ts(props: &HashMap<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    props.get(key).and_then(Value::as_str).and_then(parse_timestamp)
}

/// The single label used for a node of this entity type. Kept lowercase to
/// match `entity_type.as_str()` — this workspace treats labels as plain text,
/// not a separate PascalCase taxonomy.
#[must_use]
pub fn label_for(entity_type: &EntityType) -> String {
    entity_type.as_str().to_string()
}

/// Flatten an [`Entity`] into the property map a [`memento_graph_store::GraphStore`]
/// write expects. Does not include `id`, since callers pass that separately
/// to `merge_node_by_id`/`merge_node_by_path`.
#[must_use]
pub fn entity_to_props(entity: &Entity) -> HashMap<String, Value> {
    let mut props = HashMap::new();
    props.insert("type".to_string(), Value::String(entity.entity_type.as_str().to_string()));
    put_opt_string(&mut props, "path", &entity.path);
    put_opt_string(&mut props, "contentHash", &entity.content_hash);
    put_opt_string(&mut props, "language", &entity.language);
    put_opt_ts(&mut props, "lastModified", entity.last_modified);
    put_opt_ts(&mut props, "created", entity.created);
    put_opt_string(&mut props, "name", &entity.name);
    if let Some(kind) = &entity.kind {
        props.insert("kind".to_string(), Value::String(kind.as_str().to_string()));
    }
    put_opt_string(&mut props, "signature", &entity.signature);
    put_opt_string(&mut props, "docstring", &entity.docstring);
    put_opt_string(&mut props, "visibility", &entity.visibility);
    put_opt_bool(&mut props, "isExported", entity.is_exported);
    put_opt_bool(&mut props, "isTest", entity.is_test);
    put_opt_bool(&mut props, "isConfig", entity.is_config);
    if let Some(deps) = &entity.dependencies {
        props.insert(
            "dependencies".to_string(),
            flatten_value(&serde_json::to_value(deps).unwrap_or(Value::Null)),
        );
    }
    if !entity.metadata.is_empty() {
        props.insert(
            "metadata".to_string(),
            flatten_value(&serde_json::to_value(&entity.metadata).unwrap_or(Value::Null)),
        );
    }
    props
}

/// Reconstruct an [`Entity`] from a graph store's flattened property map,
/// including `id`. Returns `None` if `id` is missing.
#[must_use]
pub fn props_to_entity(props: &HashMap<String, Value>) -> Option<Entity> {
    let id = get_string(props, "id")?;
    let entity_type = get_string(props, "type").map_or(EntityType::Other(String::new()), |t| {
        EntityType::from(t.as_str())
    });

    let mut entity = Entity::new(id, entity_type);
    entity.path = get_string(props, "path");
    entity.content_hash = get_string(props, "contentHash");
    entity.language = get_string(props, "language");
    entity.last_modified = get_ts(props, "lastModified");
    entity.created = get_ts(props, "created");
    entity.name = get_string(props, "name");
    entity.kind = get_string(props, "kind").map(|k| SymbolKind::from(k.as_str()));
    entity.signature = get_string(props, "signature");
    entity.docstring = get_string(props, "docstring");
    entity.visibility = get_string(props, "visibility");
    entity.is_exported = get_bool(props, "isExported");
    entity.is_test = get_bool(props, "isTest");
    entity.is_config = get_bool(props, "isConfig");
    entity.dependencies = props.get("dependencies").and_then(|v| match v {
        Value::Array(_) => serde_json::from_value(v.clone()).ok(),
        Value::String(s) => serde_json::from_str(s).ok(),
        _ => None,
    });
    entity.metadata = props
        .get("metadata")
        .and_then(|v| match v {
            Value::Object(_) => serde_json::from_value(v.clone()).ok(),
            Value::String(s) => serde_json::from_str(s).ok(),
            _ => None,
        })
        .unwrap_or_default();

    Some(entity)
}

/// Flatten a [`Relationship`]'s non-identity fields into metadata for
/// `RelUpsertRow::metadata` (id/from/to/created/lastModified/version are
/// carried by dedicated [`memento_graph_store::RelUpsertRow`] fields).
#[must_use]
pub fn relationship_metadata(rel: &Relationship) -> HashMap<String, Value> {
    let mut meta = rel.metadata.clone();
    if !rel.evidence.is_empty() {
        meta.insert("evidence".to_string(), serde_json::json!(rel.evidence));
    }
    if !rel.locations.is_empty() {
        meta.insert("locations".to_string(), serde_json::json!(rel.locations));
    }
    if rel.occurrences > 0 {
        meta.insert("occurrences".to_string(), serde_json::json!(rel.occurrences));
    }
    meta
}

/// Reconstruct a [`Relationship`] from a `getRelationships` row. Returns
/// `None` if required fields (`id`, `fromEntityId`, `toEntityId`, `type`) are
/// missing.
#[must_use]
pub fn props_to_relationship(props: &HashMap<String, Value>) -> Option<Relationship> {
    let id = get_string(props, "id")?;
    let from = get_string(props, "fromEntityId")?;
    let to = get_string(props, "toEntityId")?;
    let rel_type = get_string(props, "type").map(|t| RelationshipType::from(t.as_str()))?;
    let created = get_ts(props, "created").unwrap_or_else(Utc::now);

    let mut rel = Relationship::new(from, to, rel_type, created, Some(id));
    rel.last_modified = get_ts(props, "lastModified").unwrap_or(created);
    rel.version = props.get("version").and_then(Value::as_u64).unwrap_or(1);
    rel.valid_from = get_ts(props, "validFrom");
    rel.valid_to = get_ts(props, "validTo");
    rel.active = get_bool(props, "active");
    rel.last_seen_at = get_ts(props, "lastSeenAt");
    rel.occurrences = props.get("occurrences").and_then(Value::as_u64).unwrap_or(0);
    rel.evidence = props
        .get("evidence")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    rel.locations = props
        .get("locations")
        .and_then(|v| serde_json::from_value::<Vec<Location>>(v.clone()).ok())
        .unwrap_or_default();
    rel.metadata = props
        .get("metadata")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    Some(rel)
}
