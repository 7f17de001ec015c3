//! SQLite-backed [`VectorStore`] implementation.
//!
//! Chunks and their embeddings live in `nodes`; full documents live in the
//! `documents` side collection, which is also the ingestion ledger. Search
//! is brute-force cosine similarity over every node of a collection.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use docchat_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use docchat_core::models::{Chunk, Document, Metadata, Passage};
use docchat_core::store::{CollectionState, StoredDocument, VectorStore};

use crate::{db, migrate};

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the store file, creating it and its schema when missing.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path, 5).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn parse_metadata(json: &str) -> Metadata {
    serde_json::from_str(json).unwrap_or_default()
}

async fn ensure_collection(pool: &SqlitePool, collection: &str) -> Result<()> {
    let exists: bool =
        sqlx::query_scalar("SELECT COUNT(*) > 0 FROM collections WHERE name = ?")
            .bind(collection)
            .fetch_one(pool)
            .await?;
    if !exists {
        bail!("collection not found: {}", collection);
    }
    Ok(())
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn collection_state(&self, collection: &str) -> Result<CollectionState> {
        let exists: bool =
            sqlx::query_scalar("SELECT COUNT(*) > 0 FROM collections WHERE name = ?")
                .bind(collection)
                .fetch_one(&self.pool)
                .await?;
        if !exists {
            return Ok(CollectionState::Absent);
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nodes WHERE collection = ?")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(if count == 0 {
            CollectionState::Empty
        } else {
            CollectionState::Populated(count as u64)
        })
    }

    async fn create_collection(&self, collection: &str) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO collections (name, created_at) VALUES (?, ?) ON CONFLICT(name) DO NOTHING",
        )
        .bind(collection)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            bail!("collection already exists: {}", collection);
        }
        Ok(())
    }

    async fn document_hash(&self, collection: &str, doc_id: &str) -> Result<Option<String>> {
        ensure_collection(&self.pool, collection).await?;
        let hash: Option<String> =
            sqlx::query_scalar("SELECT hash FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(doc_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(hash)
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
        ensure_collection(&self.pool, collection).await?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM nodes WHERE collection = ? AND document_id = ?")
            .bind(collection)
            .bind(&doc.id)
            .execute(&mut *tx)
            .await?;

        for (chunk, vec) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                r#"
                INSERT INTO nodes (id, collection, document_id, chunk_index, text, hash,
                                   metadata_json, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(collection)
            .bind(&chunk.document_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(serde_json::to_string(&chunk.metadata)?)
            .bind(vec_to_blob(vec))
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, text, metadata_json, hash, ingested_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(collection, id) DO UPDATE SET
                text = excluded.text,
                metadata_json = excluded.metadata_json,
                hash = excluded.hash,
                ingested_at = excluded.ingested_at
            "#,
        )
        .bind(collection)
        .bind(&doc.id)
        .bind(&doc.text)
        .bind(serde_json::to_string(&doc.metadata)?)
        .bind(&doc.hash)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> Result<Option<StoredDocument>> {
        ensure_collection(&self.pool, collection).await?;
        let row = sqlx::query(
            "SELECT id, text, metadata_json, hash, ingested_at FROM documents WHERE collection = ? AND id = ?",
        )
        .bind(collection)
        .bind(doc_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let metadata_json: String = r.get("metadata_json");
            StoredDocument {
                id: r.get("id"),
                text: r.get("text"),
                metadata: parse_metadata(&metadata_json),
                hash: r.get("hash"),
                ingested_at: r.get("ingested_at"),
            }
        }))
    }

    async fn query(
        &self,
        collection: &str,
        query_vec: &[f32],
        top_k: usize,
    ) -> Result<Vec<Passage>> {
        ensure_collection(&self.pool, collection).await?;
        let rows = sqlx::query(
            r#"
            SELECT id, document_id, chunk_index, text, hash, metadata_json, embedding
            FROM nodes
            WHERE collection = ?
            ORDER BY rowid
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        let mut passages: Vec<Passage> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let metadata_json: String = row.get("metadata_json");
                Passage {
                    score: cosine_similarity(query_vec, &blob_to_vec(&blob)),
                    chunk: Chunk {
                        id: row.get("id"),
                        document_id: row.get("document_id"),
                        chunk_index: row.get("chunk_index"),
                        text: row.get("text"),
                        hash: row.get("hash"),
                        metadata: parse_metadata(&metadata_json),
                    },
                }
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

#[cfg(test)]
mod tests {
    use super::*;
    use docchat_core::chunk::{chunk_document, ChunkingParams};

    async fn store() -> (tempfile::TempDir, SqliteVectorStore) {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = SqliteVectorStore::open(&tmp.path().join("vectors.sqlite"))
            .await
            .unwrap();
        (tmp, store)
    }

    fn doc(id: &str, text: &str) -> Document {
        let mut metadata = Metadata::new();
        metadata.insert("file_name".to_string(), id.to_string());
        Document::new(id, text, metadata)
    }

    #[tokio::test]
    async fn test_collection_tri_state() {
        let (_tmp, store) = store().await;
        assert_eq!(store.collection_state("kb").await.unwrap(), CollectionState::Absent);
        store.create_collection("kb").await.unwrap();
        assert_eq!(store.collection_state("kb").await.unwrap(), CollectionState::Empty);
        assert!(store.create_collection("kb").await.is_err());

        let d = doc("a.txt", "alpha");
        let chunks = chunk_document(&d, &ChunkingParams::default());
        store.add_document("kb", &d, &chunks, &[vec![1.0, 0.0]]).await.unwrap();
        assert_eq!(
            store.collection_state("kb").await.unwrap(),
            CollectionState::Populated(1)
        );
    }

    #[tokio::test]
    async fn test_add_document_replaces_and_records_ledger() {
        let (_tmp, store) = store().await;
        store.create_collection("kb").await.unwrap();

        let v1 = doc("a.txt", "first version");
        let c1 = chunk_document(&v1, &ChunkingParams::default());
        store.add_document("kb", &v1, &c1, &[vec![1.0, 0.0]]).await.unwrap();

        let v2 = doc("a.txt", "second version");
        let c2 = chunk_document(&v2, &ChunkingParams::default());
        store.add_document("kb", &v2, &c2, &[vec![0.0, 1.0]]).await.unwrap();

        assert_eq!(
            store.collection_state("kb").await.unwrap(),
            CollectionState::Populated(1)
        );
        assert_eq!(store.document_hash("kb", "a.txt").await.unwrap(), Some(v2.hash));
        let stored = store.get_document("kb", "a.txt").await.unwrap().unwrap();
        assert_eq!(stored.text, "second version");
        assert_eq!(stored.metadata.get("file_name").map(String::as_str), Some("a.txt"));
        assert_eq!(store.document_hash("kb", "missing.txt").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_query_ranks_and_carries_metadata() {
        let (_tmp, store) = store().await;
        store.create_collection("kb").await.unwrap();
        for (id, text, vec) in [
            ("sky.txt", "The sky is blue.", vec![1.0, 0.0]),
            ("grass.txt", "Grass is green.", vec![0.0, 1.0]),
        ] {
            let d = doc(id, text);
            let chunks = chunk_document(&d, &ChunkingParams::default());
            store.add_document("kb", &d, &chunks, &[vec]).await.unwrap();
        }

        let hits = store.query("kb", &[0.9, 0.1], 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.text, "The sky is blue.");
        assert_eq!(
            hits[0].chunk.metadata.get("file_name").map(String::as_str),
            Some("sky.txt")
        );
    }

    #[tokio::test]
    async fn test_unknown_collection_errors() {
        let (_tmp, store) = store().await;
        assert!(store.query("nope", &[1.0], 3).await.is_err());
        assert!(store.document_hash("nope", "a").await.is_err());
    }
}
