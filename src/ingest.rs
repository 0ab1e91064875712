//! Document ingestion: chunk, embed, and replace a document's stored chunks.

use serde::Serialize;

use crate::chunker;
use crate::error::ApiError;
use crate::openai::Embedder;
use crate::qdrant_util::{ChunkRecord, ChunkStore};

/// Extracted text shorter than this is treated as unreadable.
const MIN_TEXT_CHARS: usize = 10;
/// Chunks shorter than this are noise and not worth an embedding call.
const MIN_CHUNK_CHARS: usize = 5;

#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub doc_id: String,
    pub title: String,
    pub source: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub ok: bool,
    pub doc_id: String,
    pub title: String,
    pub chunks: usize,
    pub inserted: usize,
    pub message: String,
}

/// Replaces the chunk set of `doc_id` with freshly embedded chunks.
///
/// Deletion failures are non-fatal (availability over strict consistency;
/// stale duplicates are the accepted risk). The first embed or insert
/// failure aborts the loop and surfaces the partial `{inserted, total}`
/// progress instead of rolling back.
pub async fn ingest(
    embedder: &dyn Embedder,
    store: &dyn ChunkStore,
    request: IngestRequest,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<IngestReport, ApiError> {
    if request.text.trim().chars().count() < MIN_TEXT_CHARS {
        return Err(ApiError::Validation(
            "No readable text found in file.".into(),
        ));
    }

    let chunks = chunker::chunk_by_chars(&request.text, chunk_size, chunk_overlap)?;
    let total = chunks.len();
    tracing::info!(doc_id = %request.doc_id, total, "ingesting document");

    // Replace, never merge: drop whatever was stored for this doc_id first.
    if let Err(err) = store.delete_doc(&request.doc_id).await {
        tracing::warn!(doc_id = %request.doc_id, error = %err, "failed to delete prior chunks, continuing");
    }

    let mut inserted = 0;
    for (index, text) in chunks.into_iter().enumerate() {
        if text.trim().chars().count() < MIN_CHUNK_CHARS {
            continue;
        }
        let result = async {
            let embedding = embedder.embed(&text).await?;
            store
                .upsert_chunk(ChunkRecord {
                    doc_id: request.doc_id.clone(),
                    title: request.title.clone(),
                    source: request.source.clone(),
                    chunk_index: index,
                    text,
                    embedding,
                })
                .await
        }
        .await;
        if let Err(err) = result {
            return Err(ApiError::PartialIngest {
                inserted,
                total,
                message: err.to_string(),
            });
        }
        inserted += 1;
    }

    Ok(IngestReport {
        ok: true,
        doc_id: request.doc_id.clone(),
        title: request.title,
        chunks: total,
        inserted,
        message: format!(
            "Ingested {inserted}/{total} chunks into \"{}\"",
            request.doc_id
        ),
    })
}
