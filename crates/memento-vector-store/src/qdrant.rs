//! Qdrant-backed [`VectorStore`] (grounded on
//! `dashflow-qdrant::qdrant::QdrantVectorStore`).

use crate::trait_def::VectorStore;
use crate::types::{PointFilter, ScoredPoint, VectorPoint};
use async_trait::async_trait;
use memento_core::{Error, Result};
use qdrant_client::qdrant::{
    vectors_config::Config, Condition, CreateCollectionBuilder, Distance, FieldCondition, Filter,
    Match, PointStruct, SearchPointsBuilder, UpsertPointsBuilder, VectorParams, VectorsConfig,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::Value;
use std::collections::HashMap;

fn json_to_qdrant_value(v: &Value) -> qdrant_client::qdrant::Value {
    match v {
        Value::Null => qdrant_client::qdrant::Value::from(Option::<bool>::None),
        Value::Bool(b) => qdrant_client::qdrant::Value::from(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                qdrant_client::qdrant::Value::from(i)
            } else {
                qdrant_client::qdrant::Value::from(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => qdrant_client::qdrant::Value::from(s.as_str()),
        Value::Array(items) => {
            qdrant_client::qdrant::Value::from(items.iter().map(json_to_qdrant_value).collect::<Vec<_>>())
        }
        Value::Object(map) => qdrant_client::qdrant::Value::from(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_qdrant_value(v)))
                .collect::<HashMap<_, _>>(),
        ),
    }
}

fn qdrant_value_to_json(v: &qdrant_client::qdrant::Value) -> Value {
    serde_json::to_value(v).unwrap_or(Value::Null)
}

fn payload_to_json_map(payload: HashMap<String, qdrant_client::qdrant::Value>) -> HashMap<String, Value> {
    payload
        .into_iter()
        .map(|(k, v)| (k, qdrant_value_to_json(&v)))
        .collect()
}

fn filter_to_qdrant(filter: &PointFilter) -> Filter {
    Filter::must(
        filter
            .must
            .iter()
            .map(|c| {
                let matched = match &c.value {
                    Value::String(s) => Match::from(s.as_str()),
                    Value::Bool(b) => Match::from(*b),
                    Value::Number(n) => Match::from(n.as_i64().unwrap_or_default()),
                    other => Match::from(other.to_string()),
                };
                Condition::Field(FieldCondition {
                    key: c.key.clone(),
                    r#match: Some(matched),
                    ..Default::default()
                })
            })
            .collect::<Vec<_>>(),
    )
}

/// Connection to a Qdrant server over gRPC.
pub struct QdrantVectorStore {
    client: Qdrant,
}

impl QdrantVectorStore {
    pub fn new(url: &str) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| Error::database(format!("failed to create Qdrant client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        let exists = self
            .client
            .collection_exists(collection)
            .await
            .map_err(|e| Error::database(format!("failed to check Qdrant collection: {e}")))?;
        if exists {
            return Ok(());
        }
        self.client
            .create_collection(
                CreateCollectionBuilder::new(collection).vectors_config(VectorsConfig {
                    config: Some(Config::Params(VectorParams {
                        size: dimension as u64,
                        distance: Distance::Cosine.into(),
                        ..Default::default()
                    })),
                }),
            )
            .await
            .map_err(|e| Error::database(format!("failed to create Qdrant collection: {e}")))?;
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<()> {
        let point_structs: Vec<PointStruct> = points
            .into_iter()
            .map(|p| {
                let payload: Payload = p
                    .payload
                    .iter()
                    .map(|(k, v)| (k.clone(), json_to_qdrant_value(v)))
                    .collect::<HashMap<_, _>>()
                    .into();
                PointStruct::new(p.id, p.vector, payload)
            })
            .collect();
        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, point_structs).wait(true))
            .await
            .map_err(|e| Error::database(format!("failed to upsert points to Qdrant: {e}")))?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<PointFilter>,
    ) -> Result<Vec<ScoredPoint>> {
        let mut builder = SearchPointsBuilder::new(collection, vector.to_vec(), limit as u64)
            .with_payload(true);
        if let Some(f) = &filter {
            builder = builder.filter(filter_to_qdrant(f));
        }
        let response = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| Error::database(format!("Qdrant search failed: {e}")))?;
        Ok(response
            .result
            .into_iter()
            .filter_map(|p| {
                let id = match p.id?.point_id_options? {
                    qdrant_client::qdrant::point_id::PointIdOptions::Num(n) => n,
                    qdrant_client::qdrant::point_id::PointIdOptions::Uuid(_) => return None,
                };
                Some(ScoredPoint {
                    id,
                    score: p.score,
                    payload: payload_to_json_map(p.payload),
                })
            })
            .collect())
    }

    async fn delete_by_filter(&self, collection: &str, filter: PointFilter) -> Result<usize> {
        let points_before = self
            .client
            .count(qdrant_client::qdrant::CountPointsBuilder::new(collection).filter(filter_to_qdrant(&filter)))
            .await
            .map_err(|e| Error::database(format!("Qdrant count failed: {e}")))?
            .result
            .map_or(0, |r| r.count);
        self.client
            .delete_points(
                qdrant_client::qdrant::DeletePointsBuilder::new(collection)
                    .points(qdrant_client::qdrant::PointsSelector::from(filter_to_qdrant(&filter)))
                    .wait(true),
            )
            .await
            .map_err(|e| Error::database(format!("failed to delete points from Qdrant: {e}")))?;
        Ok(points_before as usize)
    }
}
