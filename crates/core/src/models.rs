use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::error::IngestError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Text,
    Markdown,
    Html,
    Python,
    Notebook,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Text => "text",
            FileType::Markdown => "markdown",
            FileType::Html => "html",
            FileType::Python => "python",
            FileType::Notebook => "notebook",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Markdown,
    Code,
    Raw,
}

/// Metadata attached to every document and inherited verbatim by its chunks.
///
/// `source`, `file_path` and `file_type` are always present. The remaining
/// fields are format-specific and only set by the loader that knows them;
/// anything else a custom extractor wants to carry goes into `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    pub source: String,
    pub file_path: String,
    pub file_type: FileType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_type: Option<CellType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_code: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring_count: Option<usize>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl DocumentMetadata {
    pub fn new(
        source: impl Into<String>,
        file_path: impl Into<String>,
        file_type: FileType,
    ) -> Self {
        Self {
            source: source.into(),
            file_path: file_path.into(),
            file_type,
            page: None,
            cell_index: None,
            cell_type: None,
            cell_count: None,
            title: None,
            is_code: None,
            docstring_count: None,
            extra: BTreeMap::new(),
        }
    }

    /// Human readable position of the content inside its file.
    ///
    /// Exactly one of page, cell, title wins, in that order.
    pub fn location(&self) -> String {
        if let Some(page) = self.page {
            format!("Page {page}")
        } else if let Some(cell_index) = self.cell_index {
            format!("Cell {cell_index}")
        } else if let Some(title) = &self.title {
            format!("Title: {title}")
        } else {
            "N/A".to_string()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(content: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }
}

/// Hex encoded SHA-256 of a chunk's exact text. The deduplication key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    pub(crate) fn from_hex(hex: String) -> Self {
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub content: String,
    pub metadata: DocumentMetadata,
    pub content_hash: ContentHash,
}

impl Chunk {
    pub fn new(content: impl Into<String>, metadata: DocumentMetadata) -> Self {
        let content = content.into();
        let content_hash = crate::dedup::content_hash(&content);
        Self {
            content,
            metadata,
            content_hash,
        }
    }
}

/// A chunk as persisted in a collection, together with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedRecord {
    pub id: String,
    pub content_hash: ContentHash,
    pub content: String,
    pub metadata: DocumentMetadata,
    pub embedding: Vec<f32>,
    pub indexed_at: DateTime<Utc>,
}

impl IndexedRecord {
    pub fn into_chunk(self) -> Chunk {
        Chunk {
            content: self.content,
            metadata: self.metadata,
            content_hash: self.content_hash,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: IndexedRecord,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceInfo {
    pub filename: String,
    pub file_type: String,
    pub location: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct IngestionStats {
    pub files_found: usize,
    pub documents_loaded: usize,
    pub chunks_created: usize,
    pub chunks_added: usize,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub default_k: usize,
    pub collection: String,
    pub persist_dir: PathBuf,
    pub embedding_model: String,
    /// Vector length of the `char-ngram` model. Local models fix their own.
    pub embedding_dimensions: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            chunk_overlap: 200,
            default_k: 4,
            collection: "rag_documents".to_string(),
            persist_dir: PathBuf::from("index_store"),
            embedding_model: crate::embeddings::DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimensions: crate::embeddings::DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.default_k == 0 {
            return Err(IngestError::InvalidArgument(
                "default_k must be at least 1".to_string(),
            ));
        }
        if self.collection.trim().is_empty() {
            return Err(IngestError::InvalidArgument(
                "collection name is empty".to_string(),
            ));
        }
        if self.embedding_model.trim().is_empty() {
            return Err(IngestError::InvalidArgument(
                "embedding model name is empty".to_string(),
            ));
        }
        if self.embedding_dimensions == 0 {
            return Err(IngestError::InvalidArgument(
                "embedding_dimensions must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_takes_precedence_over_cell_and_title() {
        let mut metadata = DocumentMetadata::new("a.pdf", "/data/a.pdf", FileType::Pdf);
        metadata.page = Some(3);
        metadata.cell_index = Some(7);
        metadata.title = Some("Intro".to_string());
        assert_eq!(metadata.location(), "Page 3");

        metadata.page = None;
        assert_eq!(metadata.location(), "Cell 7");

        metadata.cell_index = None;
        assert_eq!(metadata.location(), "Title: Intro");

        metadata.title = None;
        assert_eq!(metadata.location(), "N/A");
    }

    #[test]
    fn metadata_serializes_only_present_keys() -> Result<(), Box<dyn std::error::Error>> {
        let mut metadata = DocumentMetadata::new("nb.ipynb", "/data/nb.ipynb", FileType::Notebook);
        metadata.cell_index = Some(2);
        metadata.cell_type = Some(CellType::Code);

        let value = serde_json::to_value(&metadata)?;
        assert_eq!(value["file_type"], "notebook");
        assert_eq!(value["cell_type"], "code");
        assert!(value.get("page").is_none());
        assert!(value.get("extra").is_none());

        let parsed: DocumentMetadata = serde_json::from_value(value)?;
        assert_eq!(parsed, metadata);
        Ok(())
    }

    #[test]
    fn config_rejects_overlap_not_smaller_than_size() {
        let config = PipelineConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(IngestError::InvalidChunkConfig(_))
        ));
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn config_requires_an_embedding_model() {
        let config = PipelineConfig {
            embedding_model: " ".to_string(),
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(IngestError::InvalidArgument(_))
        ));
        assert_eq!(PipelineConfig::default().embedding_model, "bge-base-en-v1.5");
    }
}
