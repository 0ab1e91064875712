//! Backend for a personal portfolio site: a streaming pitch-chat
//! assistant, RAG question answering over uploaded documents, and a
//! podcast-to-social studio pipeline. Thin orchestration over hosted
//! OpenAI APIs, Qdrant, and SQLite.

pub mod chunker;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod openai;
pub mod pitch;
pub mod qdrant_util;
pub mod query;
pub mod rate_limit;
pub mod routes;
pub mod studio;

#[cfg(test)]
pub mod testing;
