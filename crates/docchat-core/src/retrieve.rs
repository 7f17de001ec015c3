//! Context retrieval: nearest passages for a query, rendered into one
//! context block for the chat model.

use anyhow::Result;
use std::sync::Arc;

use crate::embedding::{embed_query, Embedder};
use crate::models::Passage;
use crate::prompt::PromptConfig;
use crate::store::VectorIndex;

pub struct Retriever {
    index: VectorIndex,
    embedder: Arc<dyn Embedder>,
    prompts: Arc<PromptConfig>,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        index: VectorIndex,
        embedder: Arc<dyn Embedder>,
        prompts: Arc<PromptConfig>,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            embedder,
            prompts,
            top_k: top_k.max(1),
        }
    }

    /// The configured default number of passages.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Fetch the `top_k` passages nearest to `query`, by descending score.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Passage>> {
        let query_vec = embed_query(self.embedder.as_ref(), query).await?;
        let mut passages = self.index.query(&query_vec, top_k).await?;
        // Stable: ties keep the store's order.
        passages.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        passages.truncate(top_k);
        tracing::debug!(query, hits = passages.len(), "retrieved passages");
        Ok(passages)
    }

    /// Render passages into the context template.
    ///
    /// Each passage is its metadata as `key: value` lines, a blank line, then
    /// its text. Passages are separated by a blank line.
    pub fn format_context(&self, passages: &[Passage]) -> String {
        let context_str = passages
            .iter()
            .map(render_passage)
            .collect::<Vec<_>>()
            .join("\n\n");
        self.prompts.render_context(&context_str)
    }
}

fn render_passage(passage: &Passage) -> String {
    let chunk = &passage.chunk;
    if chunk.metadata.is_empty() {
        return chunk.text.clone();
    }
    let meta = chunk
        .metadata
        .iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\n\n{}", meta, chunk.text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, Metadata};
    use crate::store::memory::InMemoryStore;
    use crate::store::VectorStore;
    use async_trait::async_trait;

    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        fn model_name(&self) -> &str {
            "axis"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| if t.contains("sky") { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
                .collect())
        }
    }

    fn passage(text: &str, file: &str, score: f32) -> Passage {
        let mut metadata = Metadata::new();
        metadata.insert("file_name".to_string(), file.to_string());
        metadata.insert("file_path".to_string(), format!("/docs/{}", file));
        Passage {
            chunk: Chunk {
                id: "c".to_string(),
                document_id: file.to_string(),
                chunk_index: 0,
                text: text.to_string(),
                hash: String::new(),
                metadata,
            },
            score,
        }
    }

    async fn retriever() -> Retriever {
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryStore::new());
        let (index, _) = VectorIndex::bootstrap(store, "kb").await.unwrap();
        Retriever::new(index, Arc::new(AxisEmbedder), Arc::new(PromptConfig::default()), 3)
    }

    #[tokio::test]
    async fn test_format_context_is_deterministic_and_bounded() {
        let r = retriever().await;
        let passages = vec![
            passage("The sky is blue.", "sky.txt", 0.9),
            passage("Grass is green.", "grass.txt", 0.4),
        ];
        let a = r.format_context(&passages);
        let b = r.format_context(&passages);
        assert_eq!(a, b);
        assert_eq!(a.matches("---------------------").count(), 2);
        assert!(a.contains("file_name: sky.txt\nfile_path: /docs/sky.txt\n\nThe sky is blue."));
        assert!(a.contains("The sky is blue.\n\nfile_name: grass.txt"));
    }

    #[tokio::test]
    async fn test_format_context_empty_keeps_boundaries() {
        let r = retriever().await;
        let text = r.format_context(&[]);
        assert_eq!(text.matches("---------------------").count(), 2);
    }

    #[tokio::test]
    async fn test_retrieve_orders_by_similarity() {
        let r = retriever().await;
        let store = r.index().store().clone();
        for (id, text) in [("grass.txt", "Grass is green."), ("sky.txt", "The sky is blue.")] {
            let doc = crate::models::Document::new(id, text, Metadata::new());
            let chunks = crate::chunk::chunk_document(&doc, &Default::default());
            let vectors = AxisEmbedder
                .embed(&chunks.iter().map(|c| c.text.clone()).collect::<Vec<_>>())
                .await
                .unwrap();
            store.add_document("kb", &doc, &chunks, &vectors).await.unwrap();
        }

        let hits = r.retrieve("What color is the sky?", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.text, "The sky is blue.");

        let hits = r.retrieve("What color is the sky?", 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);
    }
}
