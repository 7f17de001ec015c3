//! Document store manager.
//!
//! Files are dropped into the "new" directory by an external actor. One
//! [`DocumentManager::ingest`] pass loads each of them, splits it into
//! overlapping chunks, embeds the chunks, writes chunks plus the full
//! document row into the vector store, and finally moves the file into the
//! "processed" directory:
//!
//! ```text
//! new/a.pdf ──extract──► Document ──chunk──► [Chunk] ──embed──► [Vec<f32>]
//!                                                                   │
//!             processed/a.pdf ◄──move── add_document (one transaction)
//! ```
//!
//! The side collection doubles as an ingestion ledger. A file whose id and
//! text hash are already recorded (an earlier run indexed it but failed to
//! move it) is only moved; its chunks are not inserted a second time.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use docchat_core::chunk::{chunk_document, ChunkingParams};
use docchat_core::embedding::Embedder;
use docchat_core::models::{Document, Metadata};
use docchat_core::store::{CollectionState, VectorIndex, VectorStore};

use crate::config::Config;
use crate::embedding::embed_batched;
use crate::extract::{extract_file, FileKind};

pub struct DocumentManager {
    new_dir: PathBuf,
    processed_dir: PathBuf,
    index: VectorIndex,
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingParams,
    batch_size: usize,
    initial_state: CollectionState,
}

/// Outcome of one ingestion pass that found work to do.
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Handle to the updated collection.
    pub index: VectorIndex,
    /// Files moved from "new" to "processed".
    pub files: usize,
    /// Documents whose chunks were (re)written.
    pub indexed: usize,
    /// Documents already recorded with the same hash; only moved.
    pub skipped: usize,
    pub chunks: usize,
}

impl DocumentManager {
    /// Create the directories if missing and bootstrap the collection.
    pub async fn new(
        config: &Config,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let new_dir = config.documents.new_dir.clone();
        let processed_dir = config.documents.processed_dir.clone();
        for dir in [&new_dir, &processed_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }

        let (index, initial_state) =
            VectorIndex::bootstrap(store, &config.vector_store.collection).await?;

        Ok(Self {
            new_dir,
            processed_dir,
            index,
            embedder,
            chunking: config.chunking.params(),
            batch_size: config.embedding.batch_size,
            initial_state,
        })
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Collection state observed at construction, before any creation.
    pub fn initial_state(&self) -> CollectionState {
        self.initial_state
    }

    /// Regular files (or symlinks to them) directly inside the "new"
    /// directory, sorted by name.
    pub fn list_unprocessed(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.new_dir)
            .with_context(|| format!("Failed to read directory: {}", self.new_dir.display()))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            // Follows symlinks; dangling links are skipped.
            match std::fs::metadata(entry.path()) {
                Ok(meta) if meta.is_file() => {}
                _ => continue,
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            } else {
                tracing::warn!(path = %entry.path().display(), "skipping file with non UTF-8 name");
            }
        }
        names.sort();
        Ok(names)
    }

    /// Index every unprocessed file. `None` when there is nothing new.
    ///
    /// Any failure aborts the pass. Files handled before the failure stay
    /// in "processed"; the failing file and the rest stay in "new".
    pub async fn ingest(&self) -> Result<Option<IngestReport>> {
        let files = self.list_unprocessed()?;
        if files.is_empty() {
            tracing::info!(dir = %self.new_dir.display(), "no new documents");
            return Ok(None);
        }

        tracing::info!(count = files.len(), "ingesting new documents");
        let store = self.index.store();
        let collection = self.index.collection();
        let mut report = IngestReport {
            index: self.index.clone(),
            files: 0,
            indexed: 0,
            skipped: 0,
            chunks: 0,
        };

        for name in &files {
            let path = self.new_dir.join(name);
            let doc = load_document(&path)?;

            let recorded = store.document_hash(collection, &doc.id).await?;
            if recorded.as_deref() == Some(doc.hash.as_str()) {
                tracing::info!(document = %doc.id, "already indexed, completing move");
                report.skipped += 1;
            } else {
                let chunks = chunk_document(&doc, &self.chunking);
                let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
                let vectors = embed_batched(self.embedder.as_ref(), &texts, self.batch_size)
                    .await
                    .with_context(|| format!("Failed to embed {}", doc.id))?;
                store
                    .add_document(collection, &doc, &chunks, &vectors)
                    .await
                    .with_context(|| format!("Failed to index {}", doc.id))?;
                tracing::info!(
                    document = %doc.id,
                    chunks = chunks.len(),
                    replaced = recorded.is_some(),
                    "indexed document"
                );
                report.indexed += 1;
                report.chunks += chunks.len();
            }

            move_file(&path, &self.processed_dir)?;
            report.files += 1;
        }

        Ok(Some(report))
    }
}

/// Load a file as a [`Document`] identified by its file name.
pub fn load_document(path: &Path) -> Result<Document> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid file name: {}", path.display()))?
        .to_string();

    let text = extract_file(path)?;
    let meta = std::fs::metadata(path)?;

    let mut metadata = Metadata::new();
    metadata.insert("file_name".to_string(), file_name.clone());
    let full_path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    metadata.insert("file_path".to_string(), full_path.display().to_string());
    metadata.insert("file_type".to_string(), FileKind::mime_type(path).to_string());
    metadata.insert("file_size".to_string(), meta.len().to_string());
    if let Ok(modified) = meta.modified() {
        let date: chrono::DateTime<chrono::Utc> = modified.into();
        metadata.insert(
            "last_modified_date".to_string(),
            date.format("%Y-%m-%d").to_string(),
        );
    }

    Ok(Document::new(file_name, text, metadata))
}

/// Move `src` into `dest_dir`, keeping its file name.
///
/// Falls back to copy + remove when rename fails (e.g. across devices).
pub fn move_file(src: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let name = src
        .file_name()
        .with_context(|| format!("Invalid file name: {}", src.display()))?;
    let dest = dest_dir.join(name);

    if std::fs::rename(src, &dest).is_err() {
        std::fs::copy(src, &dest).with_context(|| {
            format!("Failed to copy {} to {}", src.display(), dest.display())
        })?;
        std::fs::remove_file(src)
            .with_context(|| format!("Failed to remove {}", src.display()))?;
    }
    tracing::debug!(from = %src.display(), to = %dest.display(), "moved file");
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_move_file() {
        let tmp = TempDir::new().unwrap();
        let src_dir = tmp.path().join("new");
        let dest_dir = tmp.path().join("processed");
        std::fs::create_dir_all(&src_dir).unwrap();
        std::fs::create_dir_all(&dest_dir).unwrap();
        let src = src_dir.join("a.txt");
        std::fs::write(&src, "hello").unwrap();

        let dest = move_file(&src, &dest_dir).unwrap();
        assert!(!src.exists());
        assert_eq!(std::fs::read_to_string(dest).unwrap(), "hello");
    }

    #[test]
    fn test_load_document_metadata() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes.md");
        std::fs::write(&path, "# Title\n\nThe sky is blue.").unwrap();

        let doc = load_document(&path).unwrap();
        assert_eq!(doc.id, "notes.md");
        assert_eq!(doc.text, "# Title\n\nThe sky is blue.");
        assert_eq!(doc.metadata["file_name"], "notes.md");
        assert_eq!(doc.metadata["file_type"], "text/markdown");
        assert_eq!(doc.metadata["file_size"], "25");
        assert!(doc.metadata["file_path"].ends_with("notes.md"));
        assert!(doc.metadata.contains_key("last_modified_date"));
    }
}
