//! HTTP surface: request shapes, handlers, and router assembly.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::db::Db;
use crate::error::ApiError;
use crate::extract::extract_text;
use crate::ingest::{self, IngestRequest};
use crate::openai::OpenAiClient;
use crate::pitch;
use crate::qdrant_util::QdrantChunkStore;
use crate::query;
use crate::rate_limit::RateLimiter;
use crate::studio;

/// Document uploads are capped at 2 MiB.
const MAX_DOCUMENT_BYTES: usize = 2 * 1024 * 1024;
/// Podcast audio gets a roomier body limit.
const MAX_AUDIO_BYTES: usize = 50 * 1024 * 1024;

const CHAT_TEMPERATURE: f32 = 0.6;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub openai: Arc<OpenAiClient>,
    pub chunks: Arc<QdrantChunkStore>,
    pub db: Db,
    pub limiter: Arc<RateLimiter>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/chat", post(chat))
        .route("/api/rag", post(rag))
        .route("/api/upload", post(upload))
        .route("/api/transcribe", post(transcribe))
        .route("/api/summarize", post(run_summarize).get(latest_summary))
        .route("/api/social", post(run_social).get(latest_social))
        .route("/api/episodes", get(list_episodes))
        .layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    text: String,
}

/// Streams the pitch assistant's reply as plain text chunks. Dropping the
/// connection drops the body stream, which releases the upstream call.
async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let text = request.text.trim();
    if text.is_empty() {
        return Err(ApiError::Validation("Empty message".into()));
    }

    let messages = pitch::build_messages(text);
    let stream = state
        .openai
        .complete_stream(&messages, CHAT_TEMPERATURE)
        .await?;

    let response = (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        Body::from_stream(stream),
    )
        .into_response();
    Ok(response)
}

#[derive(Debug, Deserialize)]
struct RagRequest {
    #[serde(default)]
    question: String,
    #[serde(default, alias = "topK")]
    top_k: Option<u64>,
}

async fn rag(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RagRequest>,
) -> Result<Json<query::RagAnswer>, ApiError> {
    let ip = client_ip(&headers);
    if !state.limiter.allow(&ip) {
        tracing::debug!(%ip, "rate limited");
        return Err(ApiError::RateLimited);
    }

    let top_k = request
        .top_k
        .unwrap_or(state.config.rag_top_k)
        .clamp(1, state.config.rag_max_top_k);
    let answer = query::answer(
        state.openai.as_ref(),
        state.chunks.as_ref(),
        state.openai.as_ref(),
        &request.question,
        top_k,
        state.config.rag_min_score,
    )
    .await?;
    Ok(Json(answer))
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ingest::IngestReport>, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut doc_id_override = String::new();
    let mut title_override = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::Validation(err.to_string()))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::Validation(err.to_string()))?;
                file = Some((filename, bytes.to_vec()));
            }
            "doc_id" => {
                doc_id_override = field.text().await.unwrap_or_default();
            }
            "title" => {
                title_override = field.text().await.unwrap_or_default();
            }
            _ => {}
        }
    }

    let (filename, bytes) =
        file.ok_or_else(|| ApiError::Validation("No file uploaded (field: file)".into()))?;
    if bytes.len() > MAX_DOCUMENT_BYTES {
        return Err(ApiError::Validation(format!(
            "File too large. Max size is 2 MB, received {:.2} MB",
            bytes.len() as f64 / (1024.0 * 1024.0)
        )));
    }

    let text = extract_text(&filename, &bytes).await?;
    let title = if title_override.trim().is_empty() {
        filename
            .rsplit_once('.')
            .map(|(stem, _)| stem.to_string())
            .unwrap_or_else(|| filename.clone())
    } else {
        title_override
    };
    let doc_id = if doc_id_override.trim().is_empty() {
        filename.clone()
    } else {
        doc_id_override
    };

    let report = ingest::ingest(
        state.openai.as_ref(),
        state.chunks.as_ref(),
        IngestRequest {
            doc_id,
            title,
            source: format!("upload://{filename}"),
            text,
        },
        state.config.chunk_size,
        state.config.chunk_overlap,
    )
    .await?;
    Ok(Json(report))
}

async fn transcribe(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut file: Option<(String, String, Vec<u8>)> = None;
    let mut title = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::Validation(err.to_string()))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                let filename = field.file_name().unwrap_or("episode").to_string();
                let mime = field
                    .content_type()
                    .unwrap_or("audio/mpeg")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::Validation(err.to_string()))?;
                file = Some((filename, mime, bytes.to_vec()));
            }
            "title" => {
                title = field.text().await.unwrap_or_default();
            }
            _ => {}
        }
    }

    let (filename, mime, bytes) =
        file.ok_or_else(|| ApiError::Validation("No file".into()))?;
    let title = if title.trim().is_empty() {
        "Untitled episode".to_string()
    } else {
        title
    };

    let (episode, transcript) = studio::transcribe_episode(
        state.openai.as_ref(),
        &state.db,
        &title,
        &filename,
        &mime,
        bytes,
    )
    .await?;
    Ok(Json(json!({
        "ok": true,
        "episode": episode,
        "transcript": transcript,
    })))
}

#[derive(Debug, Deserialize)]
struct EpisodeRef {
    #[serde(default)]
    episode_id: String,
}

impl EpisodeRef {
    fn id(&self) -> Result<&str, ApiError> {
        let id = self.episode_id.trim();
        if id.is_empty() {
            return Err(ApiError::Validation("episode_id required".into()));
        }
        Ok(id)
    }
}

async fn run_summarize(
    State(state): State<AppState>,
    Json(request): Json<EpisodeRef>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let summary =
        studio::summarize_episode(state.openai.as_ref(), &state.db, request.id()?).await?;
    Ok(Json(json!({ "ok": true, "summary": summary })))
}

/// No summary yet is not an error, just `null`.
async fn latest_summary(
    State(state): State<AppState>,
    Query(request): Query<EpisodeRef>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let summary = state.db.latest_summary(request.id()?).await?;
    Ok(Json(json!({ "summary": summary })))
}

async fn run_social(
    State(state): State<AppState>,
    Json(request): Json<EpisodeRef>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let posts =
        studio::draft_social_posts(state.openai.as_ref(), &state.db, request.id()?).await?;
    Ok(Json(json!({ "ok": true, "posts": posts })))
}

async fn latest_social(
    State(state): State<AppState>,
    Query(request): Query<EpisodeRef>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let posts = state.db.latest_social_posts(request.id()?).await?;
    Ok(Json(json!({ "posts": posts })))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default)]
    limit: Option<i64>,
}

async fn list_episodes(
    State(state): State<AppState>,
    Query(request): Query<ListQuery>,
) -> Result<Json<Vec<crate::db::Episode>>, ApiError> {
    let limit = request.limit.unwrap_or(20).clamp(1, 100);
    let episodes = state.db.list_episodes(limit).await?;
    Ok(Json(episodes))
}

/// First hop of `x-forwarded-for`, or "local" when the header is absent
/// (direct connections during development).
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .unwrap_or("local")
        .to_string()
}
