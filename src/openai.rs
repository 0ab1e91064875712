//! Client for the hosted OpenAI-compatible APIs: embeddings, chat
//! completions (blocking and streamed), and audio transcription.
//!
//! Failures carry the upstream status and body back to the caller; nothing
//! is retried. The `Embedder` and `ChatModel` traits are the seams the
//! ingestion, query, and studio pipelines depend on, so tests can swap in
//! stubs that never touch the network.

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;

pub const EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const EMBEDDING_DIM: u64 = 1536;
pub const CHAT_MODEL: &str = "gpt-4o-mini";
pub const TRANSCRIPTION_MODEL: &str = "whisper-1";

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CompletionOptions {
    pub temperature: f32,
    /// Ask the model for a strict JSON object response.
    pub json_mode: bool,
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApiError>;
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: CompletionOptions,
    ) -> Result<String, ApiError>;
}

pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: &str, base_url: &str) -> Result<Self, ApiError> {
        if api_key.trim().is_empty() {
            return Err(ApiError::Validation("missing OpenAI API key".into()));
        }
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| ApiError::Validation("invalid OpenAI API key".into()))?,
        );
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Streams content deltas of a chat completion as they arrive.
    ///
    /// Dropping the returned stream drops the upstream response, which is
    /// how a client disconnect releases the connection mid-answer.
    pub async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<impl Stream<Item = Result<String, ApiError>> + Send + 'static, ApiError> {
        let body = json!({
            "model": CHAT_MODEL,
            "messages": messages,
            "temperature": temperature,
            "stream": true,
        });
        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .json(&body)
            .send()
            .await?;
        let response = error_for_status(response).await?;

        let mut bytes = response.bytes_stream();
        let stream = async_stream::stream! {
            let mut buffer = String::new();
            'outer: while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        yield Err(ApiError::from(err));
                        break;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim().to_string();
                    buffer.drain(..=newline);
                    match parse_stream_line(&line) {
                        Some(StreamDelta::Content(delta)) => yield Ok(delta),
                        Some(StreamDelta::Done) => break 'outer,
                        None => {}
                    }
                }
            }
        };
        Ok(stream)
    }

    /// Transcribes an uploaded audio file, returning the text and the
    /// language Whisper detected.
    pub async fn transcribe(
        &self,
        filename: &str,
        mime: &str,
        bytes: Vec<u8>,
    ) -> Result<(String, Option<String>), ApiError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime)
            .map_err(|err| ApiError::Validation(format!("invalid audio mime type: {err}")))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", TRANSCRIPTION_MODEL)
            .text("response_format", "verbose_json");

        let response = self
            .client
            .post(self.endpoint("audio/transcriptions"))
            .multipart(form)
            .send()
            .await?;
        let response = error_for_status(response).await?;
        let parsed: TranscriptionResponse = response.json().await?;
        Ok((parsed.text, parsed.language))
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        let body = json!({ "model": EMBEDDING_MODEL, "input": text });
        let response = self
            .client
            .post(self.endpoint("embeddings"))
            .json(&body)
            .send()
            .await?;
        let response = error_for_status(response).await?;
        let parsed: EmbeddingResponse = response.json().await?;
        let first = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Upstream("embedding response contained no data".into()))?;
        Ok(first.embedding)
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: CompletionOptions,
    ) -> Result<String, ApiError> {
        let mut body = json!({
            "model": CHAT_MODEL,
            "messages": messages,
            "temperature": options.temperature,
        });
        if options.json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }
        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .json(&body)
            .send()
            .await?;
        let response = error_for_status(response).await?;
        let parsed: CompletionResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        Ok(content)
    }
}

async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    Err(ApiError::Upstream(format!("{status}: {body}")))
}

#[derive(Debug)]
enum StreamDelta {
    Content(String),
    Done,
}

/// Parses one SSE line of a streamed chat completion.
fn parse_stream_line(line: &str) -> Option<StreamDelta> {
    let payload = line.strip_prefix("data:")?.trim();
    if payload == "[DONE]" {
        return Some(StreamDelta::Done);
    }
    let value: serde_json::Value = serde_json::from_str(payload).ok()?;
    let delta = value["choices"][0]["delta"]["content"].as_str()?;
    if delta.is_empty() {
        return None;
    }
    Some(StreamDelta::Content(delta.to_string()))
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_line_extracts_content_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#;
        match parse_stream_line(line) {
            Some(StreamDelta::Content(delta)) => assert_eq!(delta, "Hel"),
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn stream_line_recognizes_done_marker() {
        assert!(matches!(
            parse_stream_line("data: [DONE]"),
            Some(StreamDelta::Done)
        ));
    }

    #[test]
    fn stream_line_skips_noise() {
        assert!(parse_stream_line("").is_none());
        assert!(parse_stream_line(": keep-alive").is_none());
        assert!(parse_stream_line(r#"data: {"choices":[{"delta":{}}]}"#).is_none());
        assert!(parse_stream_line(r#"data: {"choices":[{"delta":{"content":""}}]}"#).is_none());
    }

    #[test]
    fn client_rejects_blank_api_key() {
        assert!(OpenAiClient::new("  ", "https://api.openai.com/v1").is_err());
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = OpenAiClient::new("sk-test", "https://api.openai.com/v1/").unwrap();
        assert_eq!(
            client.endpoint("embeddings"),
            "https://api.openai.com/v1/embeddings"
        );
    }
}
