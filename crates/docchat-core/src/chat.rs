//! Conversational orchestrator.
//!
//! [`ChatEngine::chat`] turns a query plus caller-supplied history into one
//! chat completion:
//!
//! ```text
//! system prompt
//!   ├── history turns (user / assistant)
//!   ├── [rewrite]  history.len() > 1 → isolated completion → standalone query
//!   ├── [context]  use_context       → retrieve top-K → "{context}\n\nQuestion: {query}"
//!   └── final user message → completion → trimmed answer
//! ```
//!
//! The rewrite call sees only the last `history_window` turns and the raw
//! query. It never sees retrieved context and never touches the history.

use anyhow::Result;
use std::sync::Arc;

use crate::llm::{ChatModel, CompletionRequest, Message};
use crate::models::ChatTurn;
use crate::prompt::PromptConfig;
use crate::retrieve::Retriever;

/// Default number of history turns fed to the rewrite call.
pub const DEFAULT_HISTORY_WINDOW: usize = 5;

pub struct ChatEngine {
    model: Arc<dyn ChatModel>,
    retriever: Retriever,
    prompts: Arc<PromptConfig>,
    history_window: usize,
}

impl ChatEngine {
    pub fn new(
        model: Arc<dyn ChatModel>,
        retriever: Retriever,
        prompts: Arc<PromptConfig>,
        history_window: usize,
    ) -> Self {
        Self {
            model,
            retriever,
            prompts,
            history_window: history_window.max(1),
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Answer `query` given the prior `history`.
    pub async fn chat(&self, query: &str, history: &[ChatTurn], use_context: bool) -> Result<String> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(self.prompts.system.as_str()));
        for turn in history {
            messages.push(if turn.is_user() {
                Message::user(turn.content.as_str())
            } else {
                Message::assistant(turn.content.as_str())
            });
        }

        let mut query = query.to_string();
        if history.len() > 1 {
            query = self.rewrite_query(&query, history).await?;
            tracing::info!(rewritten = %query, "rewrote follow-up query");
        }

        let content = if use_context {
            let passages = self
                .retriever
                .retrieve(&query, self.retriever.top_k())
                .await?;
            let context = self.retriever.format_context(&passages);
            format!("{}\n\nQuestion: {}", context, query)
        } else {
            query
        };
        messages.push(Message::user(content));

        let completion = self.model.complete(CompletionRequest::new(messages)).await?;
        Ok(completion.text().trim().to_string())
    }

    /// Rewrite a follow-up question into a standalone one.
    pub async fn rewrite_query(&self, query: &str, history: &[ChatTurn]) -> Result<String> {
        let start = history.len().saturating_sub(self.history_window);
        let chat_history = history[start..]
            .iter()
            .map(|t| format!("{}: {}", t.role, t.content))
            .collect::<Vec<_>>()
            .join("\n");

        let messages = vec![
            Message::system(self.prompts.rewrite_system.as_str()),
            Message::user(self.prompts.render_rewrite(&chat_history, query)),
        ];
        let completion = self.model.complete(CompletionRequest::new(messages)).await?;
        Ok(completion.text().trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::Embedder;
    use crate::llm::Completion;
    use crate::store::memory::InMemoryStore;
    use crate::store::{VectorIndex, VectorStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records every request; answers rewrites with "REWRITTEN" and chats
    /// with "  answer  ".
    #[derive(Default)]
    struct ScriptedModel {
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedModel {
        fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
            let is_rewrite = request.messages[0].content_str() == PromptConfig::default().rewrite_system;
            self.requests.lock().unwrap().push(request);
            let text = if is_rewrite { " REWRITTEN \n" } else { "  answer  " };
            Ok(Completion {
                message: Message::assistant(text),
                finish_reason: Some("stop".to_string()),
            })
        }
    }

    #[derive(Default)]
    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    async fn engine() -> (ChatEngine, Arc<ScriptedModel>, Arc<CountingEmbedder>) {
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryStore::new());
        let (index, _) = VectorIndex::bootstrap(store, "kb").await.unwrap();
        let embedder = Arc::new(CountingEmbedder::default());
        let model = Arc::new(ScriptedModel::default());
        let prompts = Arc::new(PromptConfig::default());
        let retriever = Retriever::new(index, embedder.clone(), prompts.clone(), 3);
        let engine = ChatEngine::new(model.clone(), retriever, prompts, DEFAULT_HISTORY_WINDOW);
        (engine, model, embedder)
    }

    fn history(n: usize) -> Vec<ChatTurn> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    ChatTurn::user(format!("q{}", i))
                } else {
                    ChatTurn::assistant(format!("a{}", i))
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn test_empty_history_skips_rewrite() {
        let (engine, model, _) = engine().await;
        let answer = engine.chat("hello", &[], true).await.unwrap();
        assert_eq!(answer, "answer");

        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        let last = requests[0].messages.last().unwrap();
        assert!(last.content_str().ends_with("\n\nQuestion: hello"));
        assert!(last.content_str().contains("---------------------"));
    }

    #[tokio::test]
    async fn test_single_turn_history_skips_rewrite() {
        let (engine, model, _) = engine().await;
        engine.chat("hello", &history(1), false).await.unwrap();
        assert_eq!(model.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_two_turn_history_rewrites() {
        let (engine, model, _) = engine().await;
        engine.chat("and then?", &history(2), false).await.unwrap();

        let requests = model.requests();
        assert_eq!(requests.len(), 2);
        let rewrite_input = requests[0].messages[1].content_str();
        assert!(rewrite_input.contains("user: q0\nassistant: a1"));
        assert!(rewrite_input.contains("and then?"));
        assert_eq!(requests[1].messages.last().unwrap().content_str(), "REWRITTEN");
    }

    #[tokio::test]
    async fn test_rewrite_uses_last_window_turns() {
        let (engine, model, _) = engine().await;
        engine.chat("next", &history(8), false).await.unwrap();

        let rewrite_input = model.requests()[0].messages[1].content_str().to_string();
        assert!(!rewrite_input.contains("q2"));
        assert!(rewrite_input.contains("a3"));
        assert!(rewrite_input.contains("a7"));
    }

    #[tokio::test]
    async fn test_history_is_role_mapped() {
        let (engine, model, _) = engine().await;
        let mut turns = history(1);
        turns.push(ChatTurn {
            role: "bot".to_string(),
            content: "hi".to_string(),
        });
        engine.chat("x", &turns, false).await.unwrap();

        let chat = &model.requests()[1];
        assert_eq!(chat.messages.len(), 4);
        assert_eq!(chat.messages[1].role, crate::llm::Role::User);
        assert_eq!(chat.messages[2].role, crate::llm::Role::Assistant);
    }

    #[tokio::test]
    async fn test_no_context_never_retrieves() {
        let (engine, model, embedder) = engine().await;
        engine.chat("what did I ask?", &[], false).await.unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            model.requests()[0].messages.last().unwrap().content_str(),
            "what did I ask?"
        );

        engine.chat("what did I ask?", &[], true).await.unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }
}
