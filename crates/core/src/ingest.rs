use crate::chunking::{chunk_documents, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::error::IngestError;
use crate::extractor::LoaderRegistry;
use crate::index::VectorIndex;
use crate::models::{Document, IngestionStats};
use crate::traits::VectorStore;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestionReport {
    pub stats: IngestionStats,
    pub skipped_files: Vec<SkippedFile>,
}

/// Loads every supported file under `root`, chunks the documents and adds the
/// chunks the index has not seen yet.
///
/// A file that cannot be loaded is logged and listed in `skipped_files`; it
/// never stops the run. Chunking and index failures do.
pub async fn ingest_directory<S, E>(
    root: &Path,
    registry: &LoaderRegistry,
    chunking: &ChunkingConfig,
    index: &VectorIndex<S, E>,
) -> Result<IngestionReport, IngestError>
where
    S: VectorStore + Send + Sync,
    E: Embedder + Send + Sync,
{
    chunking.validate()?;

    let files = registry.discover_files(root);
    info!(root = %root.display(), files = files.len(), "discovered files");

    let mut report = IngestionReport::default();
    report.stats.files_found = files.len();

    if files.is_empty() {
        return Ok(report);
    }

    let mut documents: Vec<Document> = Vec::new();
    for path in files {
        match registry.dispatch(&path) {
            Ok(loaded) => {
                debug!(path = %path.display(), documents = loaded.len(), "loaded file");
                documents.extend(loaded);
            }
            Err(error) if error.is_per_file() => {
                warn!(path = %path.display(), error = %error, "skipping file");
                report.skipped_files.push(SkippedFile {
                    reason: error.to_string(),
                    path,
                });
            }
            Err(error) => return Err(error),
        }
    }
    report.stats.documents_loaded = documents.len();
    info!(documents = documents.len(), "loaded documents");

    let chunks = chunk_documents(&documents, chunking)?;
    report.stats.chunks_created = chunks.len();
    info!(chunks = chunks.len(), "chunked documents");

    report.stats.chunks_added = index.add(&chunks).await?;
    info!(
        added = report.stats.chunks_added,
        skipped_files = report.skipped_files.len(),
        "ingestion finished"
    );

    Ok(report)
}
