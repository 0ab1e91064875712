//! Podcast studio pipeline: transcribe an episode, summarize the
//! transcript, then draft social posts from the summary.

use serde::Deserialize;

use crate::db::{Db, Episode, EpisodeSummary, NewSummary, SocialPosts, Transcript};
use crate::error::ApiError;
use crate::openai::{ChatMessage, ChatModel, CompletionOptions, OpenAiClient};

/// Transcripts are clipped before prompting; episodes can run long.
const TRANSCRIPT_CLIP_CHARS: usize = 20_000;
const SUMMARY_TEMPERATURE: f32 = 0.3;
const SOCIAL_TEMPERATURE: f32 = 0.5;

const SUMMARY_PROMPT: &str = r#"You extract structured insights from transcripts.
Return strict JSON matching this schema:

{
  "summary_short": "• bullet 1\n• bullet 2\n• bullet 3\n• bullet 4\n• bullet 5",
  "summary_long": "one to two paragraphs",
  "topics": ["topic1","topic2","topic3"],
  "quotes": [{"quote":"...", "start":0, "end":12}],
  "entities": {"people":[], "companies":[], "tools":[]}
}"#;

const SOCIAL_PROMPT: &str =
    "You are a social media copywriter. Produce compelling, non-generic copy.";

/// Creates the episode row, transcribes the audio, and stores the
/// transcript.
pub async fn transcribe_episode(
    openai: &OpenAiClient,
    db: &Db,
    title: &str,
    filename: &str,
    mime: &str,
    bytes: Vec<u8>,
) -> Result<(Episode, Transcript), ApiError> {
    let source = format!("upload://{filename}");
    let episode = db.insert_episode(title, &source).await?;

    let (text, language) = openai.transcribe(filename, mime, bytes).await?;
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::Validation("Empty transcription".into()));
    }

    let transcript = db
        .insert_transcript(&episode.id, &text, language.as_deref())
        .await?;
    tracing::info!(episode_id = %episode.id, chars = text.len(), "stored transcript");
    Ok((episode, transcript))
}

/// Summarizes the latest transcript of an episode into structured fields.
pub async fn summarize_episode(
    chat: &dyn ChatModel,
    db: &Db,
    episode_id: &str,
) -> Result<EpisodeSummary, ApiError> {
    let transcript = db
        .transcript_for(episode_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No transcript found for this episode.".into()))?;

    let clipped: String = transcript.text.chars().take(TRANSCRIPT_CLIP_CHARS).collect();
    let messages = vec![
        ChatMessage::system(SUMMARY_PROMPT),
        ChatMessage::user(format!("TRANSCRIPT:\n{clipped}")),
    ];
    let raw = chat
        .complete(
            &messages,
            CompletionOptions {
                temperature: SUMMARY_TEMPERATURE,
                json_mode: true,
            },
        )
        .await?;

    let summary = parse_summary(&raw)?;
    db.insert_summary(episode_id, summary).await
}

/// Drafts one LinkedIn post and two tweets from the latest summary.
pub async fn draft_social_posts(
    chat: &dyn ChatModel,
    db: &Db,
    episode_id: &str,
) -> Result<SocialPosts, ApiError> {
    let episode = db
        .episode(episode_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Episode not found".into()))?;
    let summary = db.latest_summary(episode_id).await?.ok_or_else(|| {
        ApiError::Validation(
            "No summary found for this episode. Run the summarization step first.".into(),
        )
    })?;

    let messages = vec![
        ChatMessage::system(SOCIAL_PROMPT),
        ChatMessage::user(build_social_prompt(&episode, &summary)),
    ];
    let raw = chat
        .complete(
            &messages,
            CompletionOptions {
                temperature: SOCIAL_TEMPERATURE,
                json_mode: true,
            },
        )
        .await?;

    let copy = parse_social(&raw)?;
    db.insert_social_posts(episode_id, &copy.linkedin, &copy.tweet_a, &copy.tweet_b)
        .await
}

fn build_social_prompt(episode: &Episode, summary: &EpisodeSummary) -> String {
    format!(
        "Title: {}\n\
         Short summary:\n{}\n\n\
         Long summary:\n{}\n\n\
         Quotes:\n{}\n\n\
         Topics: {}\n\n\
         TASK:\n\
         1) A LinkedIn post (200-300 words) with a strong hook and 3-5 concise takeaways. \
         Avoid hashtags in body; add 2-3 at end.\n\
         2) Two X/Twitter posts (<= 280 chars each). Each must stand alone and include a \
         punchy hook or quote.\n\n\
         Return JSON:\n{{\n  \"linkedin\": \"...\",\n  \"tweet_a\": \"...\",\n  \"tweet_b\": \"...\"\n}}",
        episode.title,
        summary.summary_short,
        summary.summary_long,
        serde_json::to_string_pretty(&summary.quotes.0).unwrap_or_else(|_| "[]".into()),
        summary.topics.0.join(", "),
    )
}

fn parse_summary(raw: &str) -> Result<NewSummary, ApiError> {
    serde_json::from_str(raw)
        .map_err(|err| ApiError::Upstream(format!("failed to parse summary JSON: {err}")))
}

#[derive(Debug, Deserialize)]
struct SocialCopy {
    linkedin: String,
    tweet_a: String,
    tweet_b: String,
}

fn parse_social(raw: &str) -> Result<SocialCopy, ApiError> {
    let copy: SocialCopy = serde_json::from_str(raw)
        .map_err(|err| ApiError::Upstream(format!("failed to parse social JSON: {err}")))?;
    if copy.linkedin.trim().is_empty()
        || copy.tweet_a.trim().is_empty()
        || copy.tweet_b.trim().is_empty()
    {
        return Err(ApiError::Upstream(
            "model JSON missing one or more required fields".into(),
        ));
    }
    Ok(copy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingChat;

    async fn test_db() -> Db {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        Db::from_pool(pool).await.unwrap()
    }

    #[test]
    fn summary_parse_tolerates_missing_fields() {
        let summary = parse_summary(r#"{"summary_short": "• a"}"#).unwrap();
        assert_eq!(summary.summary_short, "• a");
        assert!(summary.summary_long.is_empty());
        assert!(summary.topics.is_empty());
    }

    #[test]
    fn summary_parse_rejects_non_json() {
        assert!(parse_summary("not json at all").is_err());
    }

    #[test]
    fn social_parse_requires_all_three_fields() {
        assert!(parse_social(r#"{"linkedin": "a", "tweet_a": "b", "tweet_b": "c"}"#).is_ok());
        assert!(parse_social(r#"{"linkedin": "a", "tweet_a": "b"}"#).is_err());
        assert!(parse_social(r#"{"linkedin": "a", "tweet_a": "b", "tweet_b": "  "}"#).is_err());
    }

    #[tokio::test]
    async fn summarize_requires_a_transcript() {
        let db = test_db().await;
        let episode = db.insert_episode("Ep", "upload://ep.mp3").await.unwrap();
        let chat = CountingChat::replying("{}");
        let err = summarize_episode(&chat, &db, &episode.id).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(chat.call_count(), 0);
    }

    #[tokio::test]
    async fn summarize_persists_model_output() {
        let db = test_db().await;
        let episode = db.insert_episode("Ep", "upload://ep.mp3").await.unwrap();
        db.insert_transcript(&episode.id, "we talked about rust", Some("en"))
            .await
            .unwrap();
        let chat = CountingChat::replying(
            r#"{"summary_short": "• rust", "summary_long": "We talked about Rust.",
                "topics": ["rust"], "quotes": [], "entities": {}}"#,
        );

        let summary = summarize_episode(&chat, &db, &episode.id).await.unwrap();
        assert_eq!(chat.call_count(), 1);
        assert_eq!(summary.topics.0, vec!["rust".to_string()]);
        assert!(db.latest_summary(&episode.id).await.unwrap().is_some());

        let messages = chat.last_messages.lock();
        assert!(messages[1].content.contains("we talked about rust"));
    }

    #[tokio::test]
    async fn social_requires_summary_first() {
        let db = test_db().await;
        let episode = db.insert_episode("Ep", "upload://ep.mp3").await.unwrap();
        let chat = CountingChat::replying("{}");
        let err = draft_social_posts(&chat, &db, &episode.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(chat.call_count(), 0);
    }

    #[tokio::test]
    async fn social_flow_persists_copy() {
        let db = test_db().await;
        let episode = db.insert_episode("Rust at scale", "upload://ep.mp3").await.unwrap();
        db.insert_transcript(&episode.id, "transcript", None).await.unwrap();
        db.insert_summary(
            &episode.id,
            NewSummary {
                summary_short: "• takeaway".into(),
                summary_long: "Long form.".into(),
                topics: vec!["rust".into()],
                quotes: serde_json::json!([]),
                entities: serde_json::json!({}),
            },
        )
        .await
        .unwrap();

        let chat = CountingChat::replying(
            r#"{"linkedin": "A post about Rust.", "tweet_a": "tweet one", "tweet_b": "tweet two"}"#,
        );
        let posts = draft_social_posts(&chat, &db, &episode.id).await.unwrap();
        assert_eq!(posts.linkedin, "A post about Rust.");
        assert!(db.latest_social_posts(&episode.id).await.unwrap().is_some());

        let messages = chat.last_messages.lock();
        assert!(messages[1].content.contains("Rust at scale"));
        assert!(messages[1].content.contains("• takeaway"));
    }

    #[tokio::test]
    async fn social_unknown_episode_is_not_found() {
        let db = test_db().await;
        let chat = CountingChat::replying("{}");
        let err = draft_social_posts(&chat, &db, "nope").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
