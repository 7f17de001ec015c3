//! Core data models shared by ingestion, retrieval, and chat.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Flat string metadata attached to documents and copied onto their chunks.
///
/// A `BTreeMap` keeps key order stable so rendered context is deterministic.
pub type Metadata = BTreeMap<String, String>;

/// A source document loaded from the "new" directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Stable identifier (the file name).
    pub id: String,
    /// Full extracted text.
    pub text: String,
    pub metadata: Metadata,
    /// SHA-256 of `text`, used by the ingestion ledger.
    pub hash: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>, metadata: Metadata) -> Self {
        let text = text.into();
        let hash = sha256_hex(&text);
        Self {
            id: id.into(),
            text,
            metadata,
            hash,
        }
    }
}

/// A contiguous span of a document's text.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
    pub metadata: Metadata,
}

/// A chunk returned by similarity search, with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    pub chunk: Chunk,
    pub score: f32,
}

/// One turn of conversation history as supplied by the caller.
///
/// Any role other than `"user"` is treated as the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == "user"
    }
}

/// A `(column name, column type)` pair read from the database catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
}

pub(crate) fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
