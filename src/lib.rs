//! # docchat
//!
//! A local-first document chat assistant. Files dropped into a "new"
//! directory are chunked, embedded, and indexed in SQLite; questions are
//! answered by a hosted chat model from the most similar passages and the
//! conversation so far. A tool-calling agent answers questions about a
//! relational database.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │  data/new   │──▶│  Documents   │──▶│ SQLite store │
//! │  (files)    │   │ Chunk+Embed │   │ nodes + docs │
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            │ retrieve
//!                  ┌──────────────┐   ┌──────┴───────┐
//!   CLI / HTTP ───▶│  Assistant   │──▶│  ChatEngine  │──▶ chat model
//!                  └──────┬───────┘   └──────────────┘
//!                         │           ┌──────────────┐
//!                         └──────────▶│  ToolAgent   │──▶ chat model
//!                                     │  SQL tools   │──▶ SQLite db
//!                                     └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docchat init                          # create directories and vector store
//! cp notes.pdf data/new/
//! docchat ingest                        # index new files
//! docchat ask "What color is the sky?"
//! docchat seed-db                       # example products/staff/orders tables
//! docchat sql "Who sold the laptop?"
//! docchat serve                         # HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | Tracing subscriber setup |
//! | [`db`] | SQLite connection |
//! | [`migrate`] | Vector store schema |
//! | [`sqlite_store`] | SQLite vector store |
//! | [`embedding`] | OpenAI / Ollama embedders |
//! | [`openai`] | OpenAI-compatible chat model |
//! | [`extract`] | Text extraction (PDF, DOCX, PPTX, XLSX) |
//! | [`documents`] | Document store manager and ingestion |
//! | [`sql`] | Relational data access |
//! | [`sql_agent`] | SQL tools for the agent |
//! | [`assistant`] | Facade over chat and SQL |
//! | [`server`] | HTTP server |

pub mod assistant;
pub mod config;
pub mod db;
pub mod documents;
pub mod embedding;
pub mod extract;
pub mod logging;
pub mod migrate;
pub mod openai;
pub mod server;
pub mod sql;
pub mod sql_agent;
pub mod sqlite_store;
