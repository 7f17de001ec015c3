//! Vector store abstraction.
//!
//! The [`VectorStore`] trait holds named collections of embedded chunks plus
//! a parallel side collection of full documents (id, text, metadata, hash).
//! The side collection doubles as the ingestion ledger: a document whose id
//! and hash are already recorded does not need to be indexed again.
//!
//! [`VectorIndex`] is the cheap, cloneable handle the rest of the system
//! passes around: a store plus the collection name.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::models::{Chunk, Document, Metadata, Passage};

/// Explicit state of a named collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionState {
    /// No collection by that name exists.
    Absent,
    /// The collection exists and holds no chunks.
    Empty,
    /// The collection exists and holds this many chunks.
    Populated(u64),
}

/// A document row in a collection's side collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredDocument {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub hash: String,
    /// Unix timestamp of the ingestion that wrote this row.
    pub ingested_at: i64,
}

/// Abstract storage backend for embedded chunks.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`collection_state`](VectorStore::collection_state) | Absent / empty / populated |
/// | [`create_collection`](VectorStore::create_collection) | Create an empty collection |
/// | [`document_hash`](VectorStore::document_hash) | Ledger lookup by document id |
/// | [`add_document`](VectorStore::add_document) | Replace a document's chunks and record it |
/// | [`get_document`](VectorStore::get_document) | Read a side-collection row |
/// | [`query`](VectorStore::query) | Top-K cosine similarity search |
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn collection_state(&self, collection: &str) -> Result<CollectionState>;

    /// Create an empty collection. Creating an existing collection is an error.
    async fn create_collection(&self, collection: &str) -> Result<()>;

    /// Hash recorded for `doc_id` in the side collection, if any.
    async fn document_hash(&self, collection: &str, doc_id: &str) -> Result<Option<String>>;

    /// Atomically replace every chunk of `doc` with `chunks` (paired with
    /// `vectors` by position) and upsert the document's side-collection row.
    async fn add_document(
        &self,
        collection: &str,
        doc: &Document,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<()>;

    async fn get_document(&self, collection: &str, doc_id: &str)
        -> Result<Option<StoredDocument>>;

    /// The `top_k` chunks most similar to `query_vec`, by descending score.
    async fn query(&self, collection: &str, query_vec: &[f32], top_k: usize)
        -> Result<Vec<Passage>>;
}

/// Handle to one collection of a [`VectorStore`].
#[derive(Clone)]
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    collection: String,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("collection", &self.collection)
            .finish()
    }
}

impl VectorIndex {
    /// Look up `collection`, creating it when absent.
    ///
    /// An existing but empty collection is reused as a fresh one, never
    /// re-created. Returns the handle and the state observed before any
    /// creation.
    pub async fn bootstrap(
        store: Arc<dyn VectorStore>,
        collection: &str,
    ) -> Result<(Self, CollectionState)> {
        if collection.trim().is_empty() {
            bail!("collection name must not be empty");
        }
        let state = store.collection_state(collection).await?;
        match state {
            CollectionState::Absent => {
                store.create_collection(collection).await?;
                tracing::info!(collection, "created vector collection");
            }
            CollectionState::Empty => {
                tracing::info!(collection, "vector collection exists but is empty");
            }
            CollectionState::Populated(chunks) => {
                tracing::info!(collection, chunks, "loaded vector collection");
            }
        }
        Ok((
            Self {
                store,
                collection: collection.to_string(),
            },
            state,
        ))
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub async fn state(&self) -> Result<CollectionState> {
        self.store.collection_state(&self.collection).await
    }

    pub async fn query(&self, query_vec: &[f32], top_k: usize) -> Result<Vec<Passage>> {
        self.store.query(&self.collection, query_vec, top_k).await
    }
}

#[cfg(test)]
mod tests {
    use super::memory::InMemoryStore;
    use super::*;

    #[tokio::test]
    async fn test_bootstrap_tri_state() {
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryStore::new());

        let (index, state) = VectorIndex::bootstrap(store.clone(), "kb").await.unwrap();
        assert_eq!(state, CollectionState::Absent);
        assert_eq!(index.state().await.unwrap(), CollectionState::Empty);

        // Second bootstrap reuses the empty collection rather than failing on create.
        let (_, state) = VectorIndex::bootstrap(store.clone(), "kb").await.unwrap();
        assert_eq!(state, CollectionState::Empty);

        let doc = Document::new("a.txt", "alpha", Metadata::new());
        let chunks = crate::chunk::chunk_document(&doc, &Default::default());
        store
            .add_document("kb", &doc, &chunks, &[vec![1.0, 0.0]])
            .await
            .unwrap();
        let (_, state) = VectorIndex::bootstrap(store, "kb").await.unwrap();
        assert_eq!(state, CollectionState::Populated(1));
    }

    #[tokio::test]
    async fn test_bootstrap_rejects_blank_name() {
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryStore::new());
        assert!(VectorIndex::bootstrap(store, "  ").await.is_err());
    }
}
