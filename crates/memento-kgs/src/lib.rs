//! Knowledge Graph Service (spec §4.2): entity/relationship CRUD, bulk
//! upserts, cached queries, search compilation, and index management over a
//! generic graph/vector/embedding stack.

pub mod cache;
pub mod codec;
pub mod search;
pub mod service;

pub use cache::TtlLruCache;
pub use codec::{entity_to_props, label_for, props_to_entity, props_to_relationship, relationship_metadata};
pub use search::{compile_exact_match_fallback, compile_structural, compile_text_predicate, map_logical_type, SearchMode, SearchRequest};
pub use service::{BulkUpsertOutcome, CreateEntityOptions, CreateRelationshipOptions, KnowledgeGraphService};
