//! The facade the CLI and HTTP server talk to.
//!
//! Wires the document manager, retriever, chat engine and SQL agent from a
//! [`Config`]. Construction runs one ingestion pass; when nothing is new the
//! existing index is used as-is.

use anyhow::{Context, Result};
use std::sync::Arc;

use docchat_core::agent::{AgentRun, ToolAgent};
use docchat_core::chat::ChatEngine;
use docchat_core::embedding::Embedder;
use docchat_core::llm::ChatModel;
use docchat_core::models::ChatTurn;
use docchat_core::retrieve::Retriever;
use docchat_core::store::VectorStore;

use crate::config::Config;
use crate::documents::{DocumentManager, IngestReport};
use crate::embedding::create_embedder;
use crate::openai::OpenAIChatModel;
use crate::sql::SqliteDatabase;
use crate::sql_agent::build_sql_agent;
use crate::sqlite_store::SqliteVectorStore;

pub struct Assistant {
    documents: DocumentManager,
    chat: ChatEngine,
    sql_agent: ToolAgent,
    sql_db: Arc<SqliteDatabase>,
    startup_ingest: Option<IngestReport>,
}

impl Assistant {
    /// Build every service named in `config` (SQLite store, HTTP clients).
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store: Arc<dyn VectorStore> = Arc::new(
            SqliteVectorStore::open(&config.vector_store.path)
                .await
                .context("Failed to open vector store")?,
        );
        let embedder = create_embedder(&config.embedding)?;
        let model: Arc<dyn ChatModel> = Arc::new(OpenAIChatModel::new(&config.llm)?);
        Self::with_services(config, store, embedder, model).await
    }

    /// Build from explicit service implementations.
    pub async fn with_services(
        config: &Config,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn ChatModel>,
    ) -> Result<Self> {
        let prompts = Arc::new(config.prompt_config());

        let documents = DocumentManager::new(config, store, embedder.clone()).await?;
        let startup_ingest = documents.ingest().await?;
        match &startup_ingest {
            Some(report) => tracing::info!(
                files = report.files,
                chunks = report.chunks,
                "startup ingestion complete"
            ),
            None => tracing::info!(
                collection = documents.index().collection(),
                "using existing index"
            ),
        }

        let retriever = Retriever::new(
            documents.index().clone(),
            embedder,
            prompts.clone(),
            config.retrieval.top_k,
        );
        let chat = ChatEngine::new(
            model.clone(),
            retriever,
            prompts.clone(),
            config.retrieval.history_window,
        );

        let sql_db = Arc::new(SqliteDatabase::open(&config.sql.path).await?);
        let sql_agent = build_sql_agent(model, sql_db.clone(), &prompts.sql_agent, &config.sql);

        Ok(Self {
            documents,
            chat,
            sql_agent,
            sql_db,
            startup_ingest,
        })
    }

    pub fn documents(&self) -> &DocumentManager {
        &self.documents
    }

    pub fn startup_ingest(&self) -> Option<&IngestReport> {
        self.startup_ingest.as_ref()
    }

    pub async fn chat(&self, query: &str, history: &[ChatTurn], use_context: bool) -> Result<String> {
        self.chat.chat(query, history, use_context).await
    }

    /// Answer a question about the relational database.
    pub async fn sql_query(&self, query: &str) -> Result<String> {
        Ok(self.sql_run(query).await?.answer().to_string())
    }

    /// Like [`sql_query`](Self::sql_query) but returns the full transcript.
    pub async fn sql_run(&self, query: &str) -> Result<AgentRun> {
        self.sql_agent.run(query).await
    }

    pub async fn close(&self) {
        self.sql_db.close().await;
    }
}
