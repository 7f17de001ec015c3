//! In-memory [`VectorStore`] implementation for tests and ephemeral use.
//!
//! Collections live in a `HashMap` behind `std::sync::RwLock`. Search is
//! brute-force cosine similarity over every stored vector.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{Chunk, Document, Passage};

use super::{CollectionState, StoredDocument, VectorStore};

#[derive(Default)]
struct Collection {
    documents: HashMap<String, StoredDocument>,
    nodes: Vec<(Chunk, Vec<f32>)>,
}

/// In-memory store.
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn missing(collection: &str) -> anyhow::Error {
    anyhow!("collection not found: {}", collection)
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn collection_state(&self, collection: &str) -> Result<CollectionState> {
        let collections = self.collections.read().unwrap();
        Ok(match collections.get(collection) {
            None => CollectionState::Absent,
            Some(c) if c.nodes.is_empty() => CollectionState::Empty,
            Some(c) => CollectionState::Populated(c.nodes.len() as u64),
        })
    }

    async fn create_collection(&self, collection: &str) -> Result<()> {
        let mut collections = self.collections.write().unwrap();
        if collections.contains_key(collection) {
            bail!("collection already exists: {}", collection);
        }
        collections.insert(collection.to_string(), Collection::default());
        Ok(())
    }

    async fn document_hash(&self, collection: &str, doc_id: &str) -> Result<Option<String>> {
        let collections = self.collections.read().unwrap();
        let c = collections.get(collection).ok_or_else(|| missing(collection))?;
        Ok(c.documents.get(doc_id).map(|d| d.hash.clone()))
    }

    async fn add_document(
        &self,
        collection: &str,
        doc: &Document,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<()> {
        if chunks.len() != vectors.len() {
            bail!(
                "chunk/vector count mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            );
        }
        let mut collections = self.collections.write().unwrap();
        let c = collections
            .get_mut(collection)
            .ok_or_else(|| missing(collection))?;

        c.nodes.retain(|(chunk, _)| chunk.document_id != doc.id);
        for (chunk, vec) in chunks.iter().zip(vectors.iter()) {
            c.nodes.push((chunk.clone(), vec.clone()));
        }
        c.documents.insert(
            doc.id.clone(),
            StoredDocument {
                id: doc.id.clone(),
                text: doc.text.clone(),
                metadata: doc.metadata.clone(),
                hash: doc.hash.clone(),
                ingested_at: chrono::Utc::now().timestamp(),
            },
        );
        Ok(())
    }

    async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> Result<Option<StoredDocument>> {
        let collections = self.collections.read().unwrap();
        let c = collections.get(collection).ok_or_else(|| missing(collection))?;
        Ok(c.documents.get(doc_id).cloned())
    }

    async fn query(
        &self,
        collection: &str,
        query_vec: &[f32],
        top_k: usize,
    ) -> Result<Vec<Passage>> {
        let collections = self.collections.read().unwrap();
        let c = collections.get(collection).ok_or_else(|| missing(collection))?;
        let mut passages: Vec<Passage> = c
            .nodes
            .iter()
            .map(|(chunk, vec)| Passage {
                chunk: chunk.clone(),
                score: cosine_similarity(query_vec, vec),
            })
            .collect();
        passages.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        passages.truncate(top_k);
        Ok(passages)
    }
}
