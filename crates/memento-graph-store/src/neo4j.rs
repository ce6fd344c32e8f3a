//! Neo4j-backed [`GraphStore`] (grounded on
//! `dashflow-neo4j::neo4j_graph::Neo4jGraph`).

use crate::trait_def::GraphStore;
use crate::types::{
    IndexStatus, IndexTarget, NodeSearchPredicate, PathPredicate, QueryParams, RelUpsertRow,
    RelationshipFilter,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use memento_core::{Error, Result};
use neo4rs::{BoltType, Graph, Query};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

fn json_to_bolt(v: &Value) -> BoltType {
    match v {
        Value::Null => BoltType::Null(neo4rs::BoltNull),
        Value::Bool(b) => BoltType::Boolean(neo4rs::BoltBoolean::new(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                BoltType::Integer(neo4rs::BoltInteger::new(i))
            } else {
                BoltType::Float(neo4rs::BoltFloat::new(n.as_f64().unwrap_or_default()))
            }
        }
        Value::String(s) => BoltType::String(s.as_str().into()),
        Value::Array(items) => {
            BoltType::List(neo4rs::BoltList::from(items.iter().map(json_to_bolt).collect::<Vec<_>>()))
        }
        Value::Object(map) => {
            let mut bolt_map = neo4rs::BoltMap::new();
            for (k, v) in map {
                bolt_map.put(k.as_str().into(), json_to_bolt(v));
            }
            BoltType::Map(bolt_map)
        }
    }
}

fn props_to_bolt_map(props: &HashMap<String, Value>) -> BoltType {
    let mut bolt_map = neo4rs::BoltMap::new();
    for (k, v) in props {
        bolt_map.put(k.as_str().into(), json_to_bolt(v));
    }
    BoltType::Map(bolt_map)
}

/// Connection to a Neo4j instance over the Bolt protocol.
pub struct Neo4jStore {
    graph: Arc<Graph>,
}

impl Neo4jStore {
    /// Connect and verify index-introspection support (`CALL db.indexes()`).
    pub async fn new(uri: &str, user: &str, password: &str) -> Result<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(|e| Error::database(format!("failed to connect to Neo4j: {e}")))?;
        Ok(Self {
            graph: Arc::new(graph),
        })
    }

    async fn run(&self, query: Query) -> Result<()> {
        self.graph
            .run(query)
            .await
            .map_err(|e| Error::database(format!("Neo4j write failed: {e}")))
    }

    async fn rows(&self, query: Query) -> Result<Vec<HashMap<String, Value>>> {
        let mut result = self
            .graph
            .execute(query)
            .await
            .map_err(|e| Error::database(format!("Neo4j query failed: {e}")))?;
        let mut rows = Vec::new();
        while let Some(row) = result
            .next()
            .await
            .map_err(|e| Error::database(format!("failed to read Neo4j row: {e}")))?
        {
            match row.to::<HashMap<String, Value>>() {
                Ok(map) => rows.push(map),
                Err(e) => warn!(error = %e, "skipping Neo4j row that failed to deserialize"),
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn query(&self, cypher: &str, params: QueryParams) -> Result<Vec<HashMap<String, Value>>> {
        let mut q = Query::new(cypher.to_string());
        for (k, v) in params.0 {
            q = q.param(&k, json_to_bolt(&v));
        }
        self.rows(q).await
    }

    async fn merge_node_by_id(
        &self,
        labels: &[&str],
        id: &str,
        props: HashMap<String, Value>,
    ) -> Result<()> {
        let label_text = labels.join(":");
        let cypher = format!("MERGE (n:{label_text} {{id: $id}}) SET n += $props");
        let q = Query::new(cypher)
            .param("id", id)
            .param("props", props_to_bolt_map(&props));
        self.run(q).await
    }

    async fn merge_node_by_path(
        &self,
        label: &str,
        path: &str,
        id_if_new: &str,
        props: HashMap<String, Value>,
    ) -> Result<String> {
        let cypher = format!(
            "MERGE (n:{label} {{path: $path}}) ON CREATE SET n.id = $id SET n += $props RETURN n.id AS id"
        );
        let q = Query::new(cypher)
            .param("path", path)
            .param("id", id_if_new)
            .param("props", props_to_bolt_map(&props));
        let rows = self.rows(q).await?;
        rows.first()
            .and_then(|r| r.get("id"))
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| Error::database("merge_node_by_path returned no id"))
    }

    async fn bulk_merge_nodes_by_id(
        &self,
        label: &str,
        rows: Vec<(String, HashMap<String, Value>)>,
    ) -> Result<()> {
        let cypher = format!(
            "UNWIND $rows AS row MERGE (n:{label} {{id: row.id}}) SET n += row.props"
        );
        let list = BoltType::List(neo4rs::BoltList::from(
            rows.into_iter()
                .map(|(id, props)| {
                    let mut m = neo4rs::BoltMap::new();
                    m.put("id".into(), BoltType::String(id.as_str().into()));
                    m.put("props".into(), props_to_bolt_map(&props));
                    BoltType::Map(m)
                })
                .collect::<Vec<_>>(),
        ));
        self.run(Query::new(cypher).param("rows", list)).await
    }

    async fn bulk_merge_nodes_by_path(
        &self,
        label: &str,
        rows: Vec<(String, String, HashMap<String, Value>)>,
    ) -> Result<HashMap<String, String>> {
        let cypher = format!(
            "UNWIND $rows AS row \
             MERGE (n:{label} {{path: row.path}}) \
             ON CREATE SET n.id = row.idIfNew \
             SET n += row.props \
             RETURN row.idIfNew AS idIfNew, n.id AS persisted"
        );
        let list = BoltType::List(neo4rs::BoltList::from(
            rows.into_iter()
                .map(|(path, id_if_new, props)| {
                    let mut m = neo4rs::BoltMap::new();
                    m.put("path".into(), BoltType::String(path.as_str().into()));
                    m.put("idIfNew".into(), BoltType::String(id_if_new.as_str().into()));
                    m.put("props".into(), props_to_bolt_map(&props));
                    BoltType::Map(m)
                })
                .collect::<Vec<_>>(),
        ));
        let result_rows = self.rows(Query::new(cypher).param("rows", list)).await?;
        Ok(result_rows
            .into_iter()
            .filter_map(|r| {
                let id_if_new = r.get("idIfNew")?.as_str()?.to_string();
                let persisted = r.get("persisted")?.as_str()?.to_string();
                Some((id_if_new, persisted))
            })
            .collect())
    }

    async fn get_node(&self, id: &str) -> Result<Option<HashMap<String, Value>>> {
        let q = Query::new("MATCH (n {id: $id}) RETURN properties(n) AS props".to_string())
            .param("id", id);
        let rows = self.rows(q).await?;
        Ok(rows.into_iter().next().and_then(|mut r| match r.remove("props") {
            Some(Value::Object(map)) => Some(map.into_iter().collect()),
            _ => None,
        }))
    }

    async fn node_exists(&self, id: &str) -> Result<bool> {
        let q = Query::new("MATCH (n {id: $id}) RETURN count(n) AS c".to_string()).param("id", id);
        let rows = self.rows(q).await?;
        Ok(rows
            .first()
            .and_then(|r| r.get("c"))
            .and_then(Value::as_u64)
            .unwrap_or(0)
            > 0)
    }

    async fn nodes_exist(&self, ids: &[String]) -> Result<HashMap<String, bool>> {
        let q = Query::new(
            "UNWIND $ids AS id OPTIONAL MATCH (n {id: id}) RETURN id, n IS NOT NULL AS exists"
                .to_string(),
        )
        .param(
            "ids",
            BoltType::List(neo4rs::BoltList::from(
                ids.iter().map(|i| BoltType::String(i.as_str().into())).collect::<Vec<_>>(),
            )),
        );
        let rows = self.rows(q).await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| {
                let id = r.get("id")?.as_str()?.to_string();
                let exists = r.get("exists")?.as_bool()?;
                Some((id, exists))
            })
            .collect())
    }

    async fn merge_relationship(&self, rel_type: &str, row: RelUpsertRow) -> Result<()> {
        let cypher = format!(
            "MATCH (a {{id: $from}}), (b {{id: $to}}) \
             MERGE (a)-[r:{rel_type} {{id: $id}}]->(b) \
             ON CREATE SET r.created = $created, r.version = $version \
             SET r += $props, r.lastModified = $lastModified"
        );
        let mut props = row.metadata;
        if let Some(vf) = row.valid_from {
            props.insert("validFrom".into(), Value::String(vf.to_rfc3339()));
        }
        let q = Query::new(cypher)
            .param("from", row.from_entity_id.as_str())
            .param("to", row.to_entity_id.as_str())
            .param("id", row.id.as_str())
            .param("created", row.created.to_rfc3339())
            .param("lastModified", row.last_modified.to_rfc3339())
            .param("version", row.version as i64)
            .param("props", props_to_bolt_map(&props));
        self.run(q).await
    }

    async fn bulk_merge_relationships(&self, rel_type: &str, rows: Vec<RelUpsertRow>) -> Result<()> {
        let cypher = format!(
            "UNWIND $rows AS row \
             MATCH (a {{id: row.from}}), (b {{id: row.to}}) \
             MERGE (a)-[r:{rel_type} {{id: row.id}}]->(b) \
             ON CREATE SET r.created = row.created, r.version = row.version \
             SET r += row.props, r.lastModified = row.lastModified"
        );
        let list = BoltType::List(neo4rs::BoltList::from(
            rows.into_iter()
                .map(|row| {
                    let mut props = row.metadata;
                    if let Some(vf) = row.valid_from {
                        props.insert("validFrom".into(), Value::String(vf.to_rfc3339()));
                    }
                    let mut m = neo4rs::BoltMap::new();
                    m.put("id".into(), BoltType::String(row.id.as_str().into()));
                    m.put("from".into(), BoltType::String(row.from_entity_id.as_str().into()));
                    m.put("to".into(), BoltType::String(row.to_entity_id.as_str().into()));
                    m.put("created".into(), BoltType::String(row.created.to_rfc3339().into()));
                    m.put(
                        "lastModified".into(),
                        BoltType::String(row.last_modified.to_rfc3339().into()),
                    );
                    m.put("version".into(), BoltType::Integer(neo4rs::BoltInteger::new(row.version as i64)));
                    m.put("props".into(), props_to_bolt_map(&props));
                    BoltType::Map(m)
                })
                .collect::<Vec<_>>(),
        ));
        self.run(Query::new(cypher).param("rows", list)).await
    }

    async fn upsert_edge_evidence(
        &self,
        rel_id: &str,
        occurrences_delta: u64,
        evidence: Vec<String>,
        locations: Vec<(String, u32, u32)>,
        last_seen_at: DateTime<Utc>,
    ) -> Result<bool> {
        let cypher = "MATCH ()-[r {id: $id}]->() \
             SET r.occurrences = coalesce(r.occurrences, 0) + $delta, \
                 r.lastSeenAt = $lastSeenAt, \
                 r.evidence = apoc.coll.toSet(coalesce(r.evidence, []) + $evidence), \
                 r.locations = apoc.coll.toSet(coalesce(r.locations, []) + $locations) \
             RETURN count(r) AS c";
        let locations_json: Vec<Value> = locations
            .into_iter()
            .map(|(path, line, column)| serde_json::json!({"path": path, "line": line, "column": column}))
            .collect();
        let q = Query::new(cypher.to_string())
            .param("id", rel_id)
            .param("delta", occurrences_delta as i64)
            .param("lastSeenAt", last_seen_at.to_rfc3339())
            .param(
                "evidence",
                BoltType::List(neo4rs::BoltList::from(
                    evidence.iter().map(|e| BoltType::String(e.as_str().into())).collect::<Vec<_>>(),
                )),
            )
            .param(
                "locations",
                BoltType::List(neo4rs::BoltList::from(
                    locations_json.iter().map(json_to_bolt).collect::<Vec<_>>(),
                )),
            );
        let rows = self.rows(q).await?;
        Ok(rows
            .first()
            .and_then(|r| r.get("c"))
            .and_then(Value::as_u64)
            .unwrap_or(0)
            > 0)
    }

    async fn set_relationship_props(
        &self,
        rel_id: &str,
        props: HashMap<String, Value>,
    ) -> Result<bool> {
        let cypher = "MATCH ()-[r {id: $id}]->() SET r += $props RETURN count(r) AS c";
        let q = Query::new(cypher.to_string())
            .param("id", rel_id)
            .param("props", props_to_bolt_map(&props));
        let rows = self.rows(q).await?;
        Ok(rows
            .first()
            .and_then(|r| r.get("c"))
            .and_then(Value::as_u64)
            .unwrap_or(0)
            > 0)
    }

    async fn get_relationships(
        &self,
        filter: RelationshipFilter,
    ) -> Result<Vec<HashMap<String, Value>>> {
        let rel_pattern = match &filter.rel_type {
            Some(t) => format!(":{t}"),
            None => String::new(),
        };
        let mut cypher = format!("MATCH (a)-[r{rel_pattern}]->(b) WHERE 1=1");
        if filter.from.is_some() {
            cypher.push_str(" AND a.id = $from");
        }
        if filter.to.is_some() {
            cypher.push_str(" AND b.id = $to");
        }
        if filter.since.is_some() {
            cypher.push_str(" AND r.lastModified >= $since");
        }
        if filter.until.is_some() {
            cypher.push_str(" AND r.lastModified <= $until");
        }
        cypher.push_str(" RETURN properties(r) AS props, a.id AS fromEntityId, b.id AS toEntityId, type(r) AS type");
        if let Some(offset) = filter.offset {
            cypher.push_str(&format!(" SKIP {offset}"));
        }
        if let Some(limit) = filter.limit {
            cypher.push_str(&format!(" LIMIT {limit}"));
        }
        let mut q = Query::new(cypher);
        if let Some(from) = &filter.from {
            q = q.param("from", from.as_str());
        }
        if let Some(to) = &filter.to {
            q = q.param("to", to.as_str());
        }
        if let Some(since) = filter.since {
            q = q.param("since", since.to_rfc3339());
        }
        if let Some(until) = filter.until {
            q = q.param("until", until.to_rfc3339());
        }
        let rows = self.rows(q).await?;
        Ok(rows
            .into_iter()
            .map(|mut r| {
                let mut flat = match r.remove("props") {
                    Some(Value::Object(map)) => map.into_iter().collect::<HashMap<_, _>>(),
                    _ => HashMap::new(),
                };
                if let Some(v) = r.remove("fromEntityId") {
                    flat.insert("fromEntityId".into(), v);
                }
                if let Some(v) = r.remove("toEntityId") {
                    flat.insert("toEntityId".into(), v);
                }
                if let Some(v) = r.remove("type") {
                    flat.insert("type".into(), v);
                }
                flat
            })
            .collect())
    }

    async fn mark_inactive_edges_not_seen_since(
        &self,
        cutoff: DateTime<Utc>,
        valid_to: Option<DateTime<Utc>>,
        to_ref_file: Option<&str>,
    ) -> Result<usize> {
        // Only "code edges" (`RelationshipType::is_code_edge`) are eligible for
        // scan-finalisation deactivation; the temporal bookkeeping types below
        // must survive a full scan untouched.
        let non_code_edges: Vec<&str> = [
            memento_core::RelationshipType::Of,
            memento_core::RelationshipType::PreviousVersion,
            memento_core::RelationshipType::CheckpointIncludes,
        ]
        .iter()
        .map(memento_core::RelationshipType::as_str)
        .collect();

        let target_clause = if to_ref_file.is_some() {
            " AND b.path = $toRefFile"
        } else {
            ""
        };
        let cypher = format!(
            "MATCH (a)-[r]->(b) \
             WHERE NOT type(r) IN $nonCodeEdges \
             AND (r.lastSeenAt IS NULL OR r.lastSeenAt < $cutoff){target_clause} \
             SET r.active = false{}\
             RETURN count(r) AS c",
            if valid_to.is_some() { ", r.validTo = $validTo" } else { "" }
        );
        let mut q = Query::new(cypher)
            .param("cutoff", cutoff.to_rfc3339())
            .param(
                "nonCodeEdges",
                BoltType::List(neo4rs::BoltList::from(
                    non_code_edges.iter().map(|t| BoltType::String((*t).into())).collect::<Vec<_>>(),
                )),
            );
        if let Some(vt) = valid_to {
            q = q.param("validTo", vt.to_rfc3339());
        }
        if let Some(path) = to_ref_file {
            q = q.param("toRefFile", path);
        }
        let rows = self.rows(q).await?;
        Ok(rows
            .first()
            .and_then(|r| r.get("c"))
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize)
    }

    async fn detach_delete_node(&self, id: &str) -> Result<bool> {
        let exists = self.node_exists(id).await?;
        if exists {
            let q = Query::new("MATCH (n {id: $id}) DETACH DELETE n".to_string()).param("id", id);
            self.run(q).await?;
        }
        Ok(exists)
    }

    async fn delete_relationship(&self, rel_id: &str) -> Result<bool> {
        let cypher = "MATCH ()-[r {id: $id}]->() WITH r, count(r) AS c DELETE r RETURN c";
        let q = Query::new(cypher.to_string()).param("id", rel_id);
        let rows = self.rows(q).await?;
        Ok(rows.first().and_then(|r| r.get("c")).and_then(Value::as_u64).unwrap_or(0) > 0)
    }

    async fn find_paths(
        &self,
        start: &str,
        end: Option<&str>,
        rel_types: &[&str],
        max_depth: u8,
    ) -> Result<Vec<Vec<String>>> {
        let rel_clause = if rel_types.is_empty() {
            String::new()
        } else {
            format!(":{}", rel_types.join("|"))
        };
        let cypher = match end {
            Some(_) => format!(
                "MATCH p = (a {{id: $start}})-[{rel_clause}*1..{max_depth}]->(b {{id: $end}}) \
                 RETURN [n IN nodes(p) | n.id] AS path"
            ),
            None => format!(
                "MATCH p = (a {{id: $start}})-[{rel_clause}*1..{max_depth}]->(b) \
                 RETURN [n IN nodes(p) | n.id] AS path"
            ),
        };
        let mut q = Query::new(cypher).param("start", start);
        if let Some(e) = end {
            q = q.param("end", e);
        }
        let rows = self.rows(q).await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| {
                r.get("path")?.as_array().map(|a| {
                    a.iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect()
                })
            })
            .collect())
    }

    async fn traverse(
        &self,
        start: &str,
        rel_types: &[&str],
        max_depth: u8,
        limit: usize,
    ) -> Result<Vec<String>> {
        let rel_clause = if rel_types.is_empty() {
            String::new()
        } else {
            format!(":{}", rel_types.join("|"))
        };
        let cypher = format!(
            "MATCH (a {{id: $start}})-[{rel_clause}*1..{max_depth}]->(n) \
             RETURN DISTINCT n.id AS id LIMIT $limit"
        );
        let q = Query::new(cypher).param("start", start).param("limit", limit as i64);
        let rows = self.rows(q).await?;
        Ok(rows.into_iter().filter_map(|r| r.get("id")?.as_str().map(String::from)).collect())
    }

    async fn search_nodes(&self, predicate: NodeSearchPredicate) -> Result<Vec<HashMap<String, Value>>> {
        let mut clauses = Vec::new();
        let mut params: Vec<(String, BoltType)> = Vec::new();

        if let Some(id) = &predicate.exact_id {
            clauses.push("n.id = $exactId".to_string());
            params.push(("exactId".into(), BoltType::String(id.as_str().into())));
        }

        if !predicate.type_kind.is_empty() {
            let mut pair_clauses = Vec::new();
            for (i, (ty, kind)) in predicate.type_kind.iter().enumerate() {
                params.push((format!("tkType{i}"), BoltType::String(ty.as_str().into())));
                if let Some(k) = kind {
                    params.push((format!("tkKind{i}"), BoltType::String(k.as_str().into())));
                    pair_clauses.push(format!("(n.type = $tkType{i} AND n.kind = $tkKind{i})"));
                } else {
                    pair_clauses.push(format!("(n.type = $tkType{i})"));
                }
            }
            clauses.push(format!("({})", pair_clauses.join(" OR ")));
        }

        match &predicate.path {
            Some(PathPredicate::StartsWith(p)) => {
                clauses.push("n.path STARTS WITH $path".to_string());
                params.push(("path".into(), BoltType::String(p.as_str().into())));
            }
            Some(PathPredicate::Contains(p)) => {
                clauses.push("n.path CONTAINS $path".to_string());
                params.push(("path".into(), BoltType::String(p.as_str().into())));
            }
            None => {}
        }

        if let Some(lang) = &predicate.language {
            clauses.push("n.language = $language".to_string());
            params.push(("language".into(), BoltType::String(lang.as_str().into())));
        }
        if let Some(since) = predicate.last_modified_since {
            clauses.push("n.lastModified >= $since".to_string());
            params.push(("since".into(), BoltType::String(since.to_rfc3339().into())));
        }
        if let Some(until) = predicate.last_modified_until {
            clauses.push("n.lastModified <= $until".to_string());
            params.push(("until".into(), BoltType::String(until.to_rfc3339().into())));
        }
        if let Some(cid) = &predicate.checkpoint_id {
            clauses.push(
                "EXISTS { MATCH (c {id: $checkpointId})-[:CHECKPOINT_INCLUDES]->(n) }".to_string(),
            );
            params.push(("checkpointId".into(), BoltType::String(cid.as_str().into())));
        }
        if !predicate.text_terms.is_empty() {
            let mut term_clauses = Vec::new();
            for (i, term) in predicate.text_terms.iter().enumerate() {
                params.push((format!("term{i}"), BoltType::String(term.to_lowercase().into())));
                term_clauses.push(format!(
                    "(toLower(coalesce(n.name,'')) CONTAINS $term{i} \
                      OR toLower(coalesce(n.docstring,'')) CONTAINS $term{i} \
                      OR toLower(coalesce(n.path,'')) CONTAINS $term{i} \
                      OR toLower(n.id) CONTAINS $term{i})"
                ));
            }
            clauses.push(format!("({})", term_clauses.join(" OR ")));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let mut cypher = format!("MATCH (n) {where_clause} RETURN properties(n) AS props, n.id AS id");
        if let Some(offset) = predicate.offset {
            cypher.push_str(&format!(" SKIP {offset}"));
        }
        if let Some(limit) = predicate.limit {
            cypher.push_str(&format!(" LIMIT {limit}"));
        }
        let mut final_query = Query::new(cypher);
        for (k, v) in params {
            final_query = final_query.param(&k, v);
        }
        let rows = self.rows(final_query).await?;
        Ok(rows
            .into_iter()
            .map(|mut r| {
                let mut flat = match r.remove("props") {
                    Some(Value::Object(map)) => map.into_iter().collect::<HashMap<_, _>>(),
                    _ => HashMap::new(),
                };
                if let Some(id) = r.remove("id") {
                    flat.insert("id".into(), id);
                }
                flat
            })
            .collect())
    }

    async fn ensure_index(&self, target: IndexTarget) -> Result<bool> {
        let cypher = match &target {
            IndexTarget::Node { label, property } => {
                format!("CREATE INDEX IF NOT EXISTS FOR (n:{label}) ON (n.{property})")
            }
            IndexTarget::Relationship { rel_type, property } => {
                format!("CREATE INDEX IF NOT EXISTS FOR ()-[r:{rel_type}]-() ON (r.{property})")
            }
        };
        match self.run(Query::new(cypher)).await {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(error = %e, ?target, "failed to ensure Neo4j index");
                Ok(false)
            }
        }
    }

    async fn index_health(&self, expected: &[IndexTarget]) -> Result<Vec<IndexStatus>> {
        let rows = match self
            .rows(Query::new("CALL db.indexes() YIELD labelsOrTypes, properties".to_string()))
            .await
        {
            Ok(rows) => rows,
            Err(_) => {
                return Ok(expected
                    .iter()
                    .map(|t| IndexStatus {
                        target: t.clone(),
                        present: false,
                        supported: false,
                    })
                    .collect())
            }
        };
        let existing: Vec<(Vec<String>, Vec<String>)> = rows
            .into_iter()
            .filter_map(|r| {
                let labels = r
                    .get("labelsOrTypes")?
                    .as_array()?
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect();
                let props = r
                    .get("properties")?
                    .as_array()?
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect();
                Some((labels, props))
            })
            .collect();
        Ok(expected
            .iter()
            .map(|target| {
                let (name, prop) = match target {
                    IndexTarget::Node { label, property } => (label.clone(), property.clone()),
                    IndexTarget::Relationship { rel_type, property } => {
                        (rel_type.clone(), property.clone())
                    }
                };
                let present = existing
                    .iter()
                    .any(|(labels, props)| labels.contains(&name) && props.contains(&prop));
                IndexStatus {
                    target: target.clone(),
                    present,
                    supported: true,
                }
            })
            .collect())
    }

    fn supports_index_introspection(&self) -> bool {
        true
    }
}
