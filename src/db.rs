//! SQLite rows backing the podcast studio: episodes, transcripts,
//! summaries, and drafted social posts.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use sqlx::types::Json;

use crate::error::ApiError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS episodes (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    source TEXT NOT NULL,
    duration_seconds INTEGER,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE TABLE IF NOT EXISTS transcripts (
    id TEXT PRIMARY KEY,
    episode_id TEXT NOT NULL REFERENCES episodes(id),
    text TEXT NOT NULL,
    language TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE TABLE IF NOT EXISTS episode_summaries (
    id TEXT PRIMARY KEY,
    episode_id TEXT NOT NULL REFERENCES episodes(id),
    summary_short TEXT NOT NULL,
    summary_long TEXT NOT NULL,
    topics TEXT NOT NULL,
    quotes TEXT NOT NULL,
    entities TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE TABLE IF NOT EXISTS social_posts (
    id TEXT PRIMARY KEY,
    episode_id TEXT NOT NULL REFERENCES episodes(id),
    linkedin TEXT NOT NULL,
    tweet_a TEXT NOT NULL,
    tweet_b TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Episode {
    pub id: String,
    pub title: String,
    pub source: String,
    pub duration_seconds: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Transcript {
    pub id: String,
    pub episode_id: String,
    pub text: String,
    pub language: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EpisodeSummary {
    pub id: String,
    pub episode_id: String,
    pub summary_short: String,
    pub summary_long: String,
    pub topics: Json<Vec<String>>,
    pub quotes: Json<serde_json::Value>,
    pub entities: Json<serde_json::Value>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SocialPosts {
    pub id: String,
    pub episode_id: String,
    pub linkedin: String,
    pub tweet_a: String,
    pub tweet_b: String,
    pub created_at: String,
}

/// Summary fields as extracted from the model, before persistence.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSummary {
    #[serde(default)]
    pub summary_short: String,
    #[serde(default)]
    pub summary_long: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default = "empty_array")]
    pub quotes: serde_json::Value,
    #[serde(default = "empty_object")]
    pub entities: serde_json::Value,
}

fn empty_array() -> serde_json::Value {
    serde_json::Value::Array(Vec::new())
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    pub async fn connect(database_url: &str) -> Result<Self, ApiError> {
        let pool = SqlitePool::connect(database_url).await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, ApiError> {
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn insert_episode(&self, title: &str, source: &str) -> Result<Episode, ApiError> {
        let episode = sqlx::query_as::<_, Episode>(
            "INSERT INTO episodes (id, title, source) VALUES (?, ?, ?)
             RETURNING id, title, source, duration_seconds, created_at",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(title)
        .bind(source)
        .fetch_one(&self.pool)
        .await?;
        Ok(episode)
    }

    pub async fn episode(&self, episode_id: &str) -> Result<Option<Episode>, ApiError> {
        let episode = sqlx::query_as::<_, Episode>(
            "SELECT id, title, source, duration_seconds, created_at
             FROM episodes WHERE id = ?",
        )
        .bind(episode_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(episode)
    }

    /// Newest episodes first; `limit` is clamped by the caller.
    pub async fn list_episodes(&self, limit: i64) -> Result<Vec<Episode>, ApiError> {
        let episodes = sqlx::query_as::<_, Episode>(
            "SELECT id, title, source, duration_seconds, created_at
             FROM episodes ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(episodes)
    }

    pub async fn insert_transcript(
        &self,
        episode_id: &str,
        text: &str,
        language: Option<&str>,
    ) -> Result<Transcript, ApiError> {
        let transcript = sqlx::query_as::<_, Transcript>(
            "INSERT INTO transcripts (id, episode_id, text, language) VALUES (?, ?, ?, ?)
             RETURNING id, episode_id, text, language, created_at",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(episode_id)
        .bind(text)
        .bind(language)
        .fetch_one(&self.pool)
        .await?;
        Ok(transcript)
    }

    pub async fn transcript_for(&self, episode_id: &str) -> Result<Option<Transcript>, ApiError> {
        let transcript = sqlx::query_as::<_, Transcript>(
            "SELECT id, episode_id, text, language, created_at
             FROM transcripts WHERE episode_id = ?
             ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(episode_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(transcript)
    }

    pub async fn insert_summary(
        &self,
        episode_id: &str,
        summary: NewSummary,
    ) -> Result<EpisodeSummary, ApiError> {
        let row = sqlx::query_as::<_, EpisodeSummary>(
            "INSERT INTO episode_summaries
                 (id, episode_id, summary_short, summary_long, topics, quotes, entities)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING id, episode_id, summary_short, summary_long,
                       topics, quotes, entities, created_at",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(episode_id)
        .bind(&summary.summary_short)
        .bind(&summary.summary_long)
        .bind(Json(&summary.topics))
        .bind(Json(&summary.quotes))
        .bind(Json(&summary.entities))
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn latest_summary(
        &self,
        episode_id: &str,
    ) -> Result<Option<EpisodeSummary>, ApiError> {
        let row = sqlx::query_as::<_, EpisodeSummary>(
            "SELECT id, episode_id, summary_short, summary_long,
                    topics, quotes, entities, created_at
             FROM episode_summaries WHERE episode_id = ?
             ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(episode_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn insert_social_posts(
        &self,
        episode_id: &str,
        linkedin: &str,
        tweet_a: &str,
        tweet_b: &str,
    ) -> Result<SocialPosts, ApiError> {
        let row = sqlx::query_as::<_, SocialPosts>(
            "INSERT INTO social_posts (id, episode_id, linkedin, tweet_a, tweet_b)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id, episode_id, linkedin, tweet_a, tweet_b, created_at",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(episode_id)
        .bind(linkedin)
        .bind(tweet_a)
        .bind(tweet_b)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn latest_social_posts(
        &self,
        episode_id: &str,
    ) -> Result<Option<SocialPosts>, ApiError> {
        let row = sqlx::query_as::<_, SocialPosts>(
            "SELECT id, episode_id, linkedin, tweet_a, tweet_b, created_at
             FROM social_posts WHERE episode_id = ?
             ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(episode_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
