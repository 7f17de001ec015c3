//! Fakes and fixtures shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use docchat::config::Config;
use docchat::sqlite_store::SqliteVectorStore;
use docchat_core::embedding::Embedder;
use docchat_core::llm::{ChatModel, Completion, CompletionRequest, Message, ToolCall};
use docchat_core::store::VectorStore;

// ============ Fakes ============

const DIMS: usize = 256;

/// Bag-of-words hashing embedder. Texts sharing words point the same way.
#[derive(Default)]
pub struct BagOfWordsEmbedder {
    calls: AtomicUsize,
}

impl BagOfWordsEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn bucket(word: &str) -> usize {
    let mut h: u64 = 0xcbf29ce484222325;
    for b in word.bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    (h % DIMS as u64) as usize
}

#[async_trait]
impl Embedder for BagOfWordsEmbedder {
    fn model_name(&self) -> &str {
        "bag-of-words"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; DIMS];
                for word in t.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
                    v[bucket(&word.to_lowercase())] += 1.0;
                }
                v
            })
            .collect())
    }
}

/// Replays queued replies and records every request it receives.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Message>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Message>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        self.requests.lock().unwrap().push(request);
        let message = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("script exhausted"))?;
        Ok(Completion {
            message,
            finish_reason: Some("stop".to_string()),
        })
    }
}

pub fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    }
}

// ============ Setup ============

pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.documents.new_dir = root.join("data/new");
    config.documents.processed_dir = root.join("data/processed");
    config.vector_store.path = root.join("data/vectors.sqlite");
    config.sql.path = root.join("data/sqlite_data.db");
    config.retrieval.top_k = 1;
    config
}

pub fn write_new(config: &Config, name: &str, text: &str) {
    fs::create_dir_all(&config.documents.new_dir).unwrap();
    fs::write(config.documents.new_dir.join(name), text).unwrap();
}

pub fn file_count(dir: &Path) -> usize {
    fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

pub async fn open_store(config: &Config) -> Arc<dyn VectorStore> {
    Arc::new(
        SqliteVectorStore::open(&config.vector_store.path)
            .await
            .unwrap(),
    )
}
