//! # docchat core
//!
//! Shared logic for docchat: data models, chunking, the vector store
//! abstraction, context retrieval, the conversational orchestrator, and the
//! tool-calling agent loop.
//!
//! This crate contains no tokio, sqlx, HTTP clients, or filesystem I/O.
//! Network-backed services (chat completion, embeddings) and storage enter
//! through the [`llm::ChatModel`], [`embedding::Embedder`], and
//! [`store::VectorStore`] traits.

pub mod agent;
pub mod chat;
pub mod chunk;
pub mod embedding;
pub mod llm;
pub mod models;
pub mod prompt;
pub mod retrieve;
pub mod store;
