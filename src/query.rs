//! Grounded question answering: embed, search, gate on confidence, and
//! only then spend a generative call.

use serde::Serialize;

use crate::error::ApiError;
use crate::openai::{ChatMessage, ChatModel, CompletionOptions, Embedder};
use crate::qdrant_util::{ChunkStore, MatchChunk};

/// Character budget for the context block handed to the model.
const MAX_CONTEXT_CHARS: usize = 8000;
/// Low-confidence matches returned alongside a refusal, for transparency.
const MAX_REFUSAL_SOURCES: usize = 3;
const ANSWER_TEMPERATURE: f32 = 0.2;

const GROUNDING_PROMPT: &str = "You answer ONLY using the provided context. If the answer is \
not in the context, say \"I don't know\". Be concise (3-6 sentences). If sources conflict, say \
so briefly. Cite chunks like [title#idx] when useful.";

#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<MatchChunk>,
    /// Top similarity of the match set, the confidence signal.
    pub confidence: f32,
}

/// Answers `question` from the stored chunks.
///
/// When nothing matches, or the best match falls below `min_score`, the
/// pipeline short-circuits with a fixed refusal and never invokes the chat
/// model — hallucination and cost control in one check.
pub async fn answer(
    embedder: &dyn Embedder,
    store: &dyn ChunkStore,
    chat: &dyn ChatModel,
    question: &str,
    top_k: u64,
    min_score: f32,
) -> Result<RagAnswer, ApiError> {
    if question.trim().is_empty() {
        return Err(ApiError::Validation("Missing question".into()));
    }

    let embedding = embedder.embed(question).await?;
    let matches = store.search(embedding, top_k).await?;
    let top_similarity = matches.first().map(|m| m.similarity).unwrap_or(0.0);

    if matches.is_empty() || top_similarity < min_score {
        tracing::info!(top_similarity, min_score, "confidence gate refused query");
        let mut sources = matches;
        sources.truncate(MAX_REFUSAL_SOURCES);
        return Ok(RagAnswer {
            answer: format!(
                "I don't know based on the available documents. (max similarity {top_similarity:.2})"
            ),
            sources,
            confidence: top_similarity,
        });
    }

    let context = build_context(&matches);
    let messages = vec![
        ChatMessage::system(GROUNDING_PROMPT),
        ChatMessage::user(format!("QUESTION:\n{question}\n\nCONTEXT:\n{context}")),
    ];
    let answer = chat
        .complete(
            &messages,
            CompletionOptions {
                temperature: ANSWER_TEMPERATURE,
                json_mode: false,
            },
        )
        .await?;

    Ok(RagAnswer {
        answer,
        sources: matches,
        confidence: top_similarity,
    })
}

/// Formats the matches into one context block, preserving match order and
/// truncating to the character budget.
fn build_context(matches: &[MatchChunk]) -> String {
    let block = matches
        .iter()
        .map(|m| {
            format!(
                "[{}#{} | sim {:.3}]\n{}",
                m.title, m.chunk_index, m.similarity, m.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    if block.chars().count() <= MAX_CONTEXT_CHARS {
        block
    } else {
        block.chars().take(MAX_CONTEXT_CHARS).collect()
    }
}
