//! # docchat CLI
//!
//! ## Usage
//!
//! ```bash
//! docchat --config ./config/docchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat init` | Create the document directories and the vector store |
//! | `docchat pending` | List files waiting in the "new" directory |
//! | `docchat ingest` | Index new files and move them to "processed" |
//! | `docchat ask "<query>"` | One-shot question over the indexed documents |
//! | `docchat chat` | Interactive conversation |
//! | `docchat sql "<question>"` | Ask the SQL agent |
//! | `docchat seed-db` | Create the example products/staff/orders tables |
//! | `docchat tables` | Show tables and columns of the SQL database |
//! | `docchat serve` | Start the HTTP server |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use docchat::assistant::Assistant;
use docchat::config::{self, Config};
use docchat::documents::DocumentManager;
use docchat::embedding::{create_embedder, DisabledEmbedder};
use docchat::sql::SqliteDatabase;
use docchat::sqlite_store::SqliteVectorStore;
use docchat::{logging, server};
use docchat_core::models::ChatTurn;
use docchat_core::store::{CollectionState, VectorStore};

/// docchat: chat with your documents and your database.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "docchat: chat with your documents and your database",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the document directories and the vector store collection.
    ///
    /// Idempotent: an existing collection is reused.
    Init,

    /// List files in the "new" directory that have not been ingested.
    Pending,

    /// Chunk, embed and index every new file, then move it to "processed".
    Ingest,

    /// Ask a single question.
    Ask {
        query: String,

        /// Answer without retrieving document context.
        #[arg(long)]
        no_context: bool,
    },

    /// Interactive chat. `/reset` clears history, `/nocontext` toggles
    /// retrieval, `/quit` exits.
    Chat,

    /// Ask a natural-language question about the SQL database.
    Sql {
        question: String,

        /// Print the agent's tool calls and intermediate thoughts.
        #[arg(long)]
        verbose: bool,
    },

    /// Create and fill the example products, staff and orders tables.
    SeedDb,

    /// Show tables and their columns in the SQL database.
    Tables,

    /// Start the HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        let cfg = Config::default();
        cfg.validate()?;
        cfg
    };
    logging::init(&cfg.logging);
    if !cli.config.exists() {
        tracing::warn!(path = %cli.config.display(), "config file not found, using defaults");
    }

    match cli.command {
        Commands::Init => {
            let store: Arc<dyn VectorStore> =
                Arc::new(SqliteVectorStore::open(&cfg.vector_store.path).await?);
            let manager = DocumentManager::new(&cfg, store, Arc::new(DisabledEmbedder)).await?;
            let state = match manager.initial_state() {
                CollectionState::Absent => "created".to_string(),
                CollectionState::Empty => "exists (empty)".to_string(),
                CollectionState::Populated(n) => format!("exists ({} chunks)", n),
            };
            println!("new dir:       {}", cfg.documents.new_dir.display());
            println!("processed dir: {}", cfg.documents.processed_dir.display());
            println!("collection:    {} {}", cfg.vector_store.collection, state);
        }
        Commands::Pending => {
            let store: Arc<dyn VectorStore> =
                Arc::new(SqliteVectorStore::open(&cfg.vector_store.path).await?);
            let manager = DocumentManager::new(&cfg, store, Arc::new(DisabledEmbedder)).await?;
            let files = manager.list_unprocessed()?;
            if files.is_empty() {
                println!("No new documents.");
            }
            for name in files {
                println!("{}", name);
            }
        }
        Commands::Ingest => {
            let store: Arc<dyn VectorStore> =
                Arc::new(SqliteVectorStore::open(&cfg.vector_store.path).await?);
            let embedder = create_embedder(&cfg.embedding)?;
            let manager = DocumentManager::new(&cfg, store, embedder).await?;
            match manager.ingest().await? {
                None => println!("No new documents."),
                Some(report) => {
                    println!("ingest {}", report.index.collection());
                    println!("  files moved: {}", report.files);
                    println!("  documents indexed: {}", report.indexed);
                    println!("  already indexed: {}", report.skipped);
                    println!("  chunks written: {}", report.chunks);
                    println!("ok");
                }
            }
        }
        Commands::Ask { query, no_context } => {
            let assistant = Assistant::from_config(&cfg).await?;
            let answer = assistant.chat(&query, &[], !no_context).await?;
            println!("{}", answer);
            assistant.close().await;
        }
        Commands::Chat => {
            let assistant = Assistant::from_config(&cfg).await?;
            run_repl(&assistant).await?;
            assistant.close().await;
        }
        Commands::Sql { question, verbose } => {
            let assistant = Assistant::from_config(&cfg).await?;
            let run = assistant.sql_run(&question).await?;
            if verbose {
                println!("=== Detailed Response Breakdown ===");
                for (i, step) in run.steps().iter().enumerate() {
                    println!("\nStep {}:\n{}", i + 1, step);
                }
                println!();
            }
            println!("{}", run.answer());
            assistant.close().await;
        }
        Commands::SeedDb => {
            let db = SqliteDatabase::open(&cfg.sql.path).await?;
            db.seed_example_data().await?;
            println!("Tables created successfully in {}", cfg.sql.path.display());
            db.close().await;
        }
        Commands::Tables => {
            let db = SqliteDatabase::open(&cfg.sql.path).await?;
            for table in db.list_tables().await? {
                println!("{}", table);
                for col in db.describe_table(&table).await? {
                    println!("  {} {}", col.name, col.column_type);
                }
            }
            db.close().await;
        }
        Commands::Serve => {
            let assistant = Arc::new(Assistant::from_config(&cfg).await?);
            server::run_server(assistant, &cfg.server.bind).await?;
        }
    }

    Ok(())
}

async fn run_repl(assistant: &Assistant) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut history: Vec<ChatTurn> = Vec::new();
    let mut use_context = true;

    println!("docchat: ask about your documents. /reset, /nocontext, /quit");
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                history.clear();
                println!("(history cleared)");
                continue;
            }
            "/nocontext" => {
                use_context = !use_context;
                println!("(document context {})", if use_context { "on" } else { "off" });
                continue;
            }
            _ => {}
        }

        match assistant.chat(input, &history, use_context).await {
            Ok(answer) => {
                println!("{}\n", answer);
                history.push(ChatTurn::user(input));
                history.push(ChatTurn::assistant(answer));
            }
            Err(e) => eprintln!("Error: {:#}", e),
        }
    }
    Ok(())
}
