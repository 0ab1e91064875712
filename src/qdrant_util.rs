//! Qdrant-backed chunk store.
//!
//! One collection holds every ingested document chunk as a point whose
//! payload carries the row fields; similarity search and ranking are
//! delegated entirely to Qdrant (cosine over 1536-dim embeddings).

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde::Serialize;
use serde_json::json;

use crate::error::ApiError;
use crate::openai::EMBEDDING_DIM;

pub const COLLECTION_NAME: &str = "chunks";

/// A chunk as stored: one embedded window of one document.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub doc_id: String,
    pub title: String,
    pub source: String,
    pub chunk_index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// A retrieved chunk plus its similarity in [0, 1]; transient per query.
#[derive(Debug, Clone, Serialize)]
pub struct MatchChunk {
    pub id: String,
    pub doc_id: String,
    pub title: String,
    pub source: String,
    pub chunk_index: i64,
    pub text: String,
    pub similarity: f32,
}

#[async_trait]
pub trait ChunkStore: Send + Sync {
    async fn upsert_chunk(&self, record: ChunkRecord) -> Result<(), ApiError>;
    /// Removes every chunk belonging to `doc_id`.
    async fn delete_doc(&self, doc_id: &str) -> Result<(), ApiError>;
    /// Top-`limit` most similar chunks, best first.
    async fn search(&self, embedding: Vec<f32>, limit: u64) -> Result<Vec<MatchChunk>, ApiError>;
}

pub struct QdrantChunkStore {
    client: Qdrant,
}

impl QdrantChunkStore {
    pub fn new(client: Qdrant) -> Self {
        Self { client }
    }

    pub async fn ensure_collection(&self) -> Result<(), ApiError> {
        if self.client.collection_exists(COLLECTION_NAME).await? {
            tracing::debug!(collection = COLLECTION_NAME, "collection already exists");
            return Ok(());
        }
        self.client
            .create_collection(
                CreateCollectionBuilder::new(COLLECTION_NAME)
                    .vectors_config(VectorParamsBuilder::new(EMBEDDING_DIM, Distance::Cosine)),
            )
            .await?;
        tracing::info!(collection = COLLECTION_NAME, "created Qdrant collection");
        Ok(())
    }
}

#[async_trait]
impl ChunkStore for QdrantChunkStore {
    async fn upsert_chunk(&self, record: ChunkRecord) -> Result<(), ApiError> {
        let payload = Payload::try_from(json!({
            "doc_id": record.doc_id,
            "title": record.title,
            "source": record.source,
            "chunk_index": record.chunk_index as i64,
            "text": record.text,
        }))
        .map_err(|err| ApiError::Storage(format!("invalid chunk payload: {err}")))?;
        let point = PointStruct::new(uuid::Uuid::new_v4().to_string(), record.embedding, payload);
        self.client
            .upsert_points(UpsertPointsBuilder::new(COLLECTION_NAME, vec![point]))
            .await?;
        Ok(())
    }

    async fn delete_doc(&self, doc_id: &str) -> Result<(), ApiError> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(COLLECTION_NAME)
                    .points(Filter::must([Condition::matches(
                        "doc_id",
                        doc_id.to_string(),
                    )]))
                    .wait(true),
            )
            .await?;
        Ok(())
    }

    async fn search(&self, embedding: Vec<f32>, limit: u64) -> Result<Vec<MatchChunk>, ApiError> {
        let results = self
            .client
            .search_points(
                SearchPointsBuilder::new(COLLECTION_NAME, embedding, limit).with_payload(true),
            )
            .await?;

        let matches = results
            .result
            .into_iter()
            .map(|point| {
                let id = point
                    .id
                    .clone()
                    .and_then(|id| id.point_id_options)
                    .map(|options| match options {
                        PointIdOptions::Uuid(uuid) => uuid,
                        PointIdOptions::Num(num) => num.to_string(),
                    })
                    .unwrap_or_default();
                let field = |key: &str| {
                    point
                        .payload
                        .get(key)
                        .and_then(|v| v.as_str())
                        .map_or(String::new(), |v| v.clone())
                };
                MatchChunk {
                    id,
                    doc_id: field("doc_id"),
                    title: field("title"),
                    source: field("source"),
                    chunk_index: point
                        .payload
                        .get("chunk_index")
                        .and_then(|v| v.as_integer())
                        .unwrap_or(0),
                    text: field("text"),
                    similarity: point.score,
                }
            })
            .collect();
        Ok(matches)
    }
}
