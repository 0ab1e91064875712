//! Stub capabilities shared by the pipeline tests. Never compiled into the
//! binary.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::ApiError;
use crate::openai::{ChatMessage, ChatModel, CompletionOptions, Embedder};
use crate::qdrant_util::{ChunkRecord, ChunkStore, MatchChunk};

/// Returns a fixed vector; optionally starts failing after `fail_after`
/// successful calls.
pub struct StubEmbedder {
    pub calls: AtomicUsize,
    pub fail_after: Option<usize>,
}

impl StubEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_after: None,
        }
    }

    pub fn failing_after(fail_after: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_after: Some(fail_after),
        }
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ApiError> {
        let done = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.fail_after {
            if done >= limit {
                return Err(ApiError::Upstream("embedding quota exhausted".into()));
            }
        }
        Ok(vec![0.1; 4])
    }
}

/// Counts completions and records the last prompt it saw.
pub struct CountingChat {
    pub calls: AtomicUsize,
    pub last_messages: Mutex<Vec<ChatMessage>>,
    pub reply: String,
}

impl CountingChat {
    pub fn replying(reply: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            last_messages: Mutex::new(Vec::new()),
            reply: reply.to_string(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for CountingChat {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _options: CompletionOptions,
    ) -> Result<String, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock() = messages.to_vec();
        Ok(self.reply.clone())
    }
}

/// In-memory chunk store with canned search results.
pub struct MemoryChunkStore {
    pub rows: Mutex<Vec<ChunkRecord>>,
    pub matches: Mutex<Vec<MatchChunk>>,
    pub deletes: AtomicUsize,
    pub fail_upsert_after: Option<usize>,
    pub fail_delete: bool,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            matches: Mutex::new(Vec::new()),
            deletes: AtomicUsize::new(0),
            fail_upsert_after: None,
            fail_delete: false,
        }
    }

    pub fn with_matches(matches: Vec<MatchChunk>) -> Self {
        let store = Self::new();
        *store.matches.lock() = matches;
        store
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().len()
    }
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    async fn upsert_chunk(&self, record: ChunkRecord) -> Result<(), ApiError> {
        if let Some(limit) = self.fail_upsert_after {
            if self.rows.lock().len() >= limit {
                return Err(ApiError::Storage("insert failed".into()));
            }
        }
        self.rows.lock().push(record);
        Ok(())
    }

    async fn delete_doc(&self, doc_id: &str) -> Result<(), ApiError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete {
            return Err(ApiError::Storage("delete failed".into()));
        }
        self.rows.lock().retain(|row| row.doc_id != doc_id);
        Ok(())
    }

    async fn search(&self, _embedding: Vec<f32>, limit: u64) -> Result<Vec<MatchChunk>, ApiError> {
        let mut matches = self.matches.lock().clone();
        matches.truncate(limit as usize);
        Ok(matches)
    }
}

pub fn match_chunk(doc_id: &str, index: i64, text: &str, similarity: f32) -> MatchChunk {
    MatchChunk {
        id: format!("{doc_id}-{index}"),
        doc_id: doc_id.to_string(),
        title: doc_id.to_string(),
        source: format!("upload://{doc_id}"),
        chunk_index: index,
        text: text.to_string(),
        similarity,
    }
}
