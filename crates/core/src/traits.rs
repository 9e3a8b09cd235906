use crate::error::IndexError;
use crate::models::{ContentHash, IndexedRecord, ScoredRecord};
use async_trait::async_trait;
use std::collections::HashSet;

/// Persistence backend behind [`crate::index::VectorIndex`].
#[async_trait]
pub trait VectorStore {
    /// Creates the collection if needed and checks it was built with the same
    /// embedding model.
    async fn ensure_collection(&self, model_id: &str, dimensions: usize) -> Result<(), IndexError>;

    /// Every content hash currently stored, read in one pass.
    async fn content_hashes(&self) -> Result<HashSet<ContentHash>, IndexError>;

    /// Durably appends records. Each record's hash, metadata and embedding are
    /// written together, and a batch is either stored whole or not at all.
    async fn insert(&self, records: &[IndexedRecord]) -> Result<(), IndexError>;

    async fn nearest(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredRecord>, IndexError>;

    async fn len(&self) -> Result<usize, IndexError>;

    async fn drop_collection(&self) -> Result<(), IndexError>;
}
