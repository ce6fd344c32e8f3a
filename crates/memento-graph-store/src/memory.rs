//! DashMap-backed [`GraphStore`] used by the test suites across this
//! workspace (grounded on the teacher's in-memory fixtures in
//! `dashflow-memory::kg`).

use crate::trait_def::GraphStore;
use crate::types::{
    IndexStatus, IndexTarget, NodeSearchPredicate, PathPredicate, QueryParams, RelUpsertRow,
    RelationshipFilter,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use memento_core::{RelationshipType, Result};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
struct NodeRecord {
    labels: Vec<String>,
    props: HashMap<String, Value>,
}

#[derive(Debug, Clone)]
struct EdgeRecord {
    rel_type: String,
    from: String,
    to: String,
    props: HashMap<String, Value>,
}

/// In-memory graph store. Every query builds its result by scanning the
/// node/edge maps directly rather than interpreting Cypher text — callers
/// that need arbitrary predicates should prefer the structured methods; the
/// raw [`GraphStore::query`] escape hatch only understands a handful of
/// fixed shapes used by this workspace's own tests.
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    nodes: DashMap<String, NodeRecord>,
    /// Secondary index: `(label, path)` -> node id, for the codebase-entity
    /// upsert pattern (invariant I2).
    path_index: DashMap<(String, String), String>,
    edges: DashMap<String, EdgeRecord>,
    indexes: RwLock<HashSet<IndexTarget>>,
}

impl InMemoryGraphStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn node_view(&self, id: &str) -> Option<HashMap<String, Value>> {
        self.nodes.get(id).map(|n| {
            let mut v = n.props.clone();
            v.insert("id".into(), Value::String(id.to_string()));
            v
        })
    }

    fn edge_view(&self, id: &str, e: &EdgeRecord) -> HashMap<String, Value> {
        let mut v = e.props.clone();
        v.insert("id".into(), Value::String(id.to_string()));
        v.insert("type".into(), Value::String(e.rel_type.clone()));
        v.insert("fromEntityId".into(), Value::String(e.from.clone()));
        v.insert("toEntityId".into(), Value::String(e.to.clone()));
        v
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn query(&self, _cypher: &str, _params: QueryParams) -> Result<Vec<HashMap<String, Value>>> {
        // The in-memory adapter has no Cypher interpreter; tests that need
        // ad-hoc predicates should build them against the structured methods
        // instead (`get_relationships`, `traverse`, `find_paths`).
        Ok(Vec::new())
    }

    async fn merge_node_by_id(
        &self,
        labels: &[&str],
        id: &str,
        props: HashMap<String, Value>,
    ) -> Result<()> {
        self.nodes
            .entry(id.to_string())
            .and_modify(|n| n.props.extend(props.clone()))
            .or_insert_with(|| NodeRecord {
                labels: labels.iter().map(|s| s.to_string()).collect(),
                props,
            });
        Ok(())
    }

    async fn merge_node_by_path(
        &self,
        label: &str,
        path: &str,
        id_if_new: &str,
        props: HashMap<String, Value>,
    ) -> Result<String> {
        let key = (label.to_string(), path.to_string());
        let persisted_id = self
            .path_index
            .entry(key)
            .or_insert_with(|| id_if_new.to_string())
            .clone();
        self.nodes
            .entry(persisted_id.clone())
            .and_modify(|n| n.props.extend(props.clone()))
            .or_insert_with(|| NodeRecord {
                labels: vec![label.to_string()],
                props,
            });
        Ok(persisted_id)
    }

    async fn bulk_merge_nodes_by_id(
        &self,
        label: &str,
        rows: Vec<(String, HashMap<String, Value>)>,
    ) -> Result<()> {
        for (id, props) in rows {
            self.merge_node_by_id(&[label], &id, props).await?;
        }
        Ok(())
    }

    async fn bulk_merge_nodes_by_path(
        &self,
        label: &str,
        rows: Vec<(String, String, HashMap<String, Value>)>,
    ) -> Result<HashMap<String, String>> {
        let mut out = HashMap::with_capacity(rows.len());
        for (path, id_if_new, props) in rows {
            let persisted = self.merge_node_by_path(label, &path, &id_if_new, props).await?;
            out.insert(id_if_new, persisted);
        }
        Ok(out)
    }

    async fn get_node(&self, id: &str) -> Result<Option<HashMap<String, Value>>> {
        Ok(self.node_view(id))
    }

    async fn node_exists(&self, id: &str) -> Result<bool> {
        Ok(self.nodes.contains_key(id))
    }

    async fn nodes_exist(&self, ids: &[String]) -> Result<HashMap<String, bool>> {
        Ok(ids
            .iter()
            .map(|id| (id.clone(), self.nodes.contains_key(id)))
            .collect())
    }

    async fn merge_relationship(&self, rel_type: &str, row: RelUpsertRow) -> Result<()> {
        let mut props = row.metadata;
        props.insert(
            "created".into(),
            Value::String(row.created.to_rfc3339()),
        );
        props.insert(
            "lastModified".into(),
            Value::String(row.last_modified.to_rfc3339()),
        );
        props.insert("version".into(), Value::from(row.version));
        if let Some(vf) = row.valid_from {
            props.insert("validFrom".into(), Value::String(vf.to_rfc3339()));
        }
        self.edges.insert(
            row.id,
            EdgeRecord {
                rel_type: rel_type.to_string(),
                from: row.from_entity_id,
                to: row.to_entity_id,
                props,
            },
        );
        Ok(())
    }

    async fn bulk_merge_relationships(&self, rel_type: &str, rows: Vec<RelUpsertRow>) -> Result<()> {
        for row in rows {
            self.merge_relationship(rel_type, row).await?;
        }
        Ok(())
    }

    async fn upsert_edge_evidence(
        &self,
        rel_id: &str,
        occurrences_delta: u64,
        evidence: Vec<String>,
        locations: Vec<(String, u32, u32)>,
        last_seen_at: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(mut edge) = self.edges.get_mut(rel_id) else {
            return Ok(false);
        };
        let current = edge
            .props
            .get("occurrences")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        edge.props
            .insert("occurrences".into(), Value::from(current + occurrences_delta));
        edge.props
            .insert("lastSeenAt".into(), Value::String(last_seen_at.to_rfc3339()));

        let mut existing_evidence: Vec<String> = edge
            .props
            .get("evidence")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        for e in evidence {
            if !existing_evidence.contains(&e) {
                existing_evidence.push(e);
            }
        }
        edge.props.insert(
            "evidence".into(),
            Value::Array(existing_evidence.into_iter().map(Value::String).collect()),
        );

        let mut existing_locations: Vec<(String, u32, u32)> = edge
            .props
            .get("locations")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(|v| {
                        let path = v.get("path")?.as_str()?.to_string();
                        let line = v.get("line")?.as_u64()? as u32;
                        let column = v.get("column")?.as_u64()? as u32;
                        Some((path, line, column))
                    })
                    .collect()
            })
            .unwrap_or_default();
        for loc in locations {
            if !existing_locations.contains(&loc) {
                existing_locations.push(loc);
            }
        }
        edge.props.insert(
            "locations".into(),
            Value::Array(
                existing_locations
                    .into_iter()
                    .map(|(path, line, column)| {
                        serde_json::json!({"path": path, "line": line, "column": column})
                    })
                    .collect(),
            ),
        );
        Ok(true)
    }

    async fn set_relationship_props(
        &self,
        rel_id: &str,
        props: HashMap<String, Value>,
    ) -> Result<bool> {
        let Some(mut edge) = self.edges.get_mut(rel_id) else {
            return Ok(false);
        };
        edge.props.extend(props);
        Ok(true)
    }

    async fn get_relationships(
        &self,
        filter: RelationshipFilter,
    ) -> Result<Vec<HashMap<String, Value>>> {
        let mut out: Vec<HashMap<String, Value>> = self
            .edges
            .iter()
            .filter(|e| filter.from.as_deref().map_or(true, |f| f == e.from))
            .filter(|e| filter.to.as_deref().map_or(true, |t| t == e.to))
            .filter(|e| {
                filter
                    .rel_type
                    .as_deref()
                    .map_or(true, |t| t == e.rel_type)
            })
            .filter(|e| {
                filter.since.map_or(true, |since| {
                    e.props
                        .get("lastModified")
                        .and_then(Value::as_str)
                        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                        .map_or(false, |ts| ts >= since)
                })
            })
            .filter(|e| {
                filter.until.map_or(true, |until| {
                    e.props
                        .get("lastModified")
                        .and_then(Value::as_str)
                        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                        .map_or(false, |ts| ts <= until)
                })
            })
            .map(|e| self.edge_view(e.key(), &*e))
            .collect();

        if let Some(offset) = filter.offset {
            out = out.into_iter().skip(offset).collect();
        }
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn mark_inactive_edges_not_seen_since(
        &self,
        cutoff: DateTime<Utc>,
        valid_to: Option<DateTime<Utc>>,
        to_ref_file: Option<&str>,
    ) -> Result<usize> {
        let mut count = 0usize;
        for mut edge in self.edges.iter_mut() {
            if !RelationshipType::from(edge.rel_type.as_str()).is_code_edge() {
                continue;
            }
            if let Some(to_ref) = to_ref_file {
                if self
                    .nodes
                    .get(&edge.to)
                    .and_then(|n| n.props.get("path").and_then(Value::as_str).map(String::from))
                    .as_deref()
                    != Some(to_ref)
                {
                    continue;
                }
            }
            let last_seen = edge
                .props
                .get("lastSeenAt")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok());
            let is_stale = last_seen.map_or(true, |ts| ts < cutoff);
            if !is_stale {
                continue;
            }
            edge.props.insert("active".into(), Value::Bool(false));
            if let Some(vt) = valid_to {
                edge.props
                    .insert("validTo".into(), Value::String(vt.to_rfc3339()));
            }
            count += 1;
        }
        Ok(count)
    }

    async fn detach_delete_node(&self, id: &str) -> Result<bool> {
        let existed = self.nodes.remove(id).is_some();
        self.path_index.retain(|_, v| v.as_str() != id);
        self.edges.retain(|_, e| e.from != id && e.to != id);
        Ok(existed)
    }

    async fn delete_relationship(&self, rel_id: &str) -> Result<bool> {
        Ok(self.edges.remove(rel_id).is_some())
    }

    async fn find_paths(
        &self,
        start: &str,
        end: Option<&str>,
        rel_types: &[&str],
        max_depth: u8,
    ) -> Result<Vec<Vec<String>>> {
        let mut results = Vec::new();
        let mut stack: Vec<Vec<String>> = vec![vec![start.to_string()]];
        while let Some(path) = stack.pop() {
            let depth = path.len() as u8 - 1;
            let current = path.last().unwrap().clone();
            if let Some(target) = end {
                if current == target && depth > 0 {
                    results.push(path.clone());
                    continue;
                }
            }
            if depth >= max_depth {
                if end.is_none() {
                    results.push(path.clone());
                }
                continue;
            }
            let mut extended = false;
            for edge in self.edges.iter() {
                if edge.from != current {
                    continue;
                }
                if !rel_types.is_empty() && !rel_types.contains(&edge.rel_type.as_str()) {
                    continue;
                }
                if path.contains(&edge.to) {
                    continue;
                }
                let mut next = path.clone();
                next.push(edge.to.clone());
                stack.push(next);
                extended = true;
            }
            if !extended && end.is_none() && depth > 0 {
                results.push(path);
            }
        }
        Ok(results)
    }

    async fn traverse(
        &self,
        start: &str,
        rel_types: &[&str],
        max_depth: u8,
        limit: usize,
    ) -> Result<Vec<String>> {
        let mut visited = HashSet::new();
        visited.insert(start.to_string());
        let mut frontier = vec![start.to_string()];
        for _ in 0..max_depth {
            if visited.len() >= limit {
                break;
            }
            let mut next_frontier = Vec::new();
            for node in &frontier {
                for edge in self.edges.iter() {
                    if &edge.from != node {
                        continue;
                    }
                    if !rel_types.is_empty() && !rel_types.contains(&edge.rel_type.as_str()) {
                        continue;
                    }
                    if visited.insert(edge.to.clone()) {
                        next_frontier.push(edge.to.clone());
                        if visited.len() >= limit {
                            break;
                        }
                    }
                }
            }
            frontier = next_frontier;
            if frontier.is_empty() {
                break;
            }
        }
        visited.remove(start);
        let mut out: Vec<String> = visited.into_iter().collect();
        out.truncate(limit);
        Ok(out)
    }

    async fn search_nodes(&self, predicate: NodeSearchPredicate) -> Result<Vec<HashMap<String, Value>>> {
        let checkpoint_members: Option<HashSet<String>> = predicate.checkpoint_id.as_ref().map(|cid| {
            self.edges
                .iter()
                .filter(|e| e.rel_type == "CHECKPOINT_INCLUDES" && e.from == *cid)
                .map(|e| e.to.clone())
                .collect()
        });

        let mut out: Vec<HashMap<String, Value>> = self
            .nodes
            .iter()
            .filter(|n| {
                if let Some(id) = &predicate.exact_id {
                    return n.key() == id;
                }
                true
            })
            .filter(|n| {
                if predicate.type_kind.is_empty() {
                    return true;
                }
                let ty = n.props.get("type").and_then(Value::as_str);
                let kind = n.props.get("kind").and_then(Value::as_str);
                predicate.type_kind.iter().any(|(t, k)| {
                    ty == Some(t.as_str()) && k.as_deref().map_or(true, |kk| kind == Some(kk))
                })
            })
            .filter(|n| match &predicate.path {
                None => true,
                Some(PathPredicate::StartsWith(prefix)) => n
                    .props
                    .get("path")
                    .and_then(Value::as_str)
                    .is_some_and(|p| p.starts_with(prefix.as_str())),
                Some(PathPredicate::Contains(needle)) => n
                    .props
                    .get("path")
                    .and_then(Value::as_str)
                    .is_some_and(|p| p.contains(needle.as_str())),
            })
            .filter(|n| {
                predicate
                    .language
                    .as_ref()
                    .map_or(true, |lang| n.props.get("language").and_then(Value::as_str) == Some(lang.as_str()))
            })
            .filter(|n| {
                predicate.last_modified_since.map_or(true, |since| {
                    n.props
                        .get("lastModified")
                        .and_then(Value::as_str)
                        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                        .is_some_and(|ts| ts >= since)
                })
            })
            .filter(|n| {
                predicate.last_modified_until.map_or(true, |until| {
                    n.props
                        .get("lastModified")
                        .and_then(Value::as_str)
                        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                        .is_some_and(|ts| ts <= until)
                })
            })
            .filter(|n| {
                checkpoint_members
                    .as_ref()
                    .map_or(true, |members| members.contains(n.key()))
            })
            .filter(|n| {
                if predicate.text_terms.is_empty() {
                    return true;
                }
                let haystack = ["name", "docstring", "path", "id"]
                    .iter()
                    .filter_map(|field| {
                        if *field == "id" {
                            Some(n.key().to_lowercase())
                        } else {
                            n.props.get(*field).and_then(Value::as_str).map(str::to_lowercase)
                        }
                    })
                    .collect::<Vec<_>>();
                predicate.text_terms.iter().any(|term| {
                    let term = term.to_lowercase();
                    haystack.iter().any(|h| h.contains(&term))
                })
            })
            .map(|n| self.node_view(n.key()).unwrap_or_default())
            .collect();

        if let Some(offset) = predicate.offset {
            out = out.into_iter().skip(offset).collect();
        }
        if let Some(limit) = predicate.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn ensure_index(&self, target: IndexTarget) -> Result<bool> {
        self.indexes.write().insert(target);
        Ok(true)
    }

    async fn index_health(&self, expected: &[IndexTarget]) -> Result<Vec<IndexStatus>> {
        let present = self.indexes.read();
        Ok(expected
            .iter()
            .map(|t| IndexStatus {
                target: t.clone(),
                present: present.contains(t),
                supported: true,
            })
            .collect())
    }

    fn supports_index_introspection(&self) -> bool {
        true
    }
}
