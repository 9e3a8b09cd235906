use crate::dedup::partition;
use crate::embeddings::Embedder;
use crate::error::IndexError;
use crate::models::{Chunk, IndexedRecord, ScoredRecord};
use crate::traits::VectorStore;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Handle over one persisted collection and the embedder it was built with.
///
/// Construct once at start-up and share it. All writes go through [`add`],
/// which serializes the hash scan and the append so two ingestion runs in
/// this process cannot store the same content twice.
///
/// [`add`]: VectorIndex::add
pub struct VectorIndex<S, E>
where
    S: VectorStore,
    E: Embedder,
{
    store: S,
    embedder: E,
    writer: Mutex<()>,
}

impl<S, E> VectorIndex<S, E>
where
    S: VectorStore + Send + Sync,
    E: Embedder + Send + Sync,
{
    pub async fn open(store: S, embedder: E) -> Result<Self, IndexError> {
        store
            .ensure_collection(&embedder.model_id(), embedder.dimensions())
            .await?;

        Ok(Self {
            store,
            embedder,
            writer: Mutex::new(()),
        })
    }

    /// Embeds and stores the chunks whose content is not indexed yet.
    /// Returns how many records were written.
    pub async fn add(&self, chunks: &[Chunk]) -> Result<usize, IndexError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let _writer = self.writer.lock().await;

        let existing = self.store.content_hashes().await?;
        let split = partition(chunks, &existing);
        debug!(
            candidates = chunks.len(),
            fresh = split.fresh.len(),
            duplicates = split.duplicates.len(),
            "deduplicated chunks"
        );

        if split.fresh.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = split
            .fresh
            .iter()
            .map(|chunk| chunk.content.clone())
            .collect();
        let embeddings = self.embedder.embed_documents(&texts).await?;

        if embeddings.len() != split.fresh.len() {
            return Err(IndexError::InvalidArgument(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                split.fresh.len()
            )));
        }

        let dimensions = self.embedder.dimensions();
        let indexed_at = Utc::now();
        let records = split
            .fresh
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                if embedding.len() != dimensions {
                    return Err(IndexError::InvalidArgument(format!(
                        "embedding dimension {} != {}",
                        embedding.len(),
                        dimensions
                    )));
                }

                Ok(IndexedRecord {
                    id: Uuid::new_v4().to_string(),
                    content_hash: chunk.content_hash.clone(),
                    content: chunk.content.clone(),
                    metadata: chunk.metadata.clone(),
                    embedding,
                    indexed_at,
                })
            })
            .collect::<Result<Vec<_>, IndexError>>()?;

        self.store.insert(&records).await?;
        info!(
            added = records.len(),
            skipped = split.duplicates.len(),
            "indexed new chunks"
        );

        Ok(records.len())
    }

    /// Number of stored records, or 0 when the collection cannot be read.
    pub async fn count(&self) -> usize {
        match self.store.len().await {
            Ok(count) => count,
            Err(error) => {
                warn!(error = %error, "unable to count indexed records");
                0
            }
        }
    }

    /// Drops every record and starts over with an empty collection.
    pub async fn clear(&self) -> Result<(), IndexError> {
        let _writer = self.writer.lock().await;
        self.store.drop_collection().await?;
        self.store
            .ensure_collection(&self.embedder.model_id(), self.embedder.dimensions())
            .await?;
        info!("cleared collection");
        Ok(())
    }

    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredRecord>, IndexError> {
        if k == 0 {
            return Err(IndexError::InvalidArgument(
                "k must be at least 1".to_string(),
            ));
        }

        let query_vector = self.embedder.embed_query(query).await?;
        if query_vector.len() != self.embedder.dimensions() {
            return Err(IndexError::InvalidArgument(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.embedder.dimensions()
            )));
        }

        self.store.nearest(&query_vector, k).await
    }
}
