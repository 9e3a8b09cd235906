use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to extract {path}: {reason}")]
    Extraction { path: String, reason: String },

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Index(#[from] IndexError),
}

impl IngestError {
    /// Errors that concern a single input file rather than the pipeline.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            IngestError::UnsupportedFormat(_)
                | IngestError::Extraction { .. }
                | IngestError::PdfParse(_)
                | IngestError::MissingFileName(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index unavailable at {path}: {reason}")]
    Unavailable { path: String, reason: String },

    #[error("index corrupt at {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("embedding model mismatch: collection uses {expected}, got {found}")]
    EmbeddingMismatch { expected: String, found: String },

    #[error("unknown embedding model: {0}")]
    UnknownModel(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("lancedb error: {0}")]
    Lance(#[from] lancedb::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("generation backend returned {status}: {details}")]
    BackendResponse { status: u16, details: String },

    #[error("generation backend returned no completion text")]
    EmptyCompletion,

    #[error("no API key configured for the generation backend")]
    MissingApiKey,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Retrieval(#[from] IndexError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_file_level_errors_are_skippable() {
        let skippable = [
            IngestError::UnsupportedFormat(".xlsx".to_string()),
            IngestError::Extraction {
                path: "a.txt".to_string(),
                reason: "permission denied".to_string(),
            },
            IngestError::PdfParse("a.pdf: no pages".to_string()),
            IngestError::MissingFileName("/".to_string()),
        ];
        assert!(skippable.iter().all(IngestError::is_per_file));

        let fatal = [
            IngestError::InvalidChunkConfig("overlap".to_string()),
            IngestError::InvalidArgument("k".to_string()),
            IngestError::Index(IndexError::UnknownModel("word2vec".to_string())),
        ];
        assert!(!fatal.iter().any(IngestError::is_per_file));
    }
}
