//! LanceDB backed [`VectorStore`].

use crate::error::IndexError;
use crate::models::{ContentHash, DocumentMetadata, IndexedRecord, ScoredRecord};
use crate::traits::VectorStore;
use arrow_array::types::Float32Type;
use arrow_array::{
    Array, ArrayRef, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{connect, Connection, DistanceType, Table};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

const MANIFEST_SUFFIX: &str = "manifest.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    collection: String,
    embedding_model: String,
    dimensions: usize,
    created_at: DateTime<Utc>,
}

/// A named collection stored as a LanceDB table under `persist_dir`.
///
/// The table is named after the collection. Next to it,
/// `<collection>.manifest.json` pins the embedding model the vectors were
/// produced with.
pub struct LanceStore {
    persist_dir: PathBuf,
    collection: String,
    connection: RwLock<Option<Connection>>,
}

impl LanceStore {
    pub fn new(persist_dir: impl Into<PathBuf>, collection: impl Into<String>) -> Self {
        Self {
            persist_dir: persist_dir.into(),
            collection: collection.into(),
            connection: RwLock::new(None),
        }
    }

    pub fn persist_dir(&self) -> &Path {
        &self.persist_dir
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn manifest_path(&self) -> PathBuf {
        self.persist_dir
            .join(format!("{}.{MANIFEST_SUFFIX}", self.collection))
    }

    async fn connection(&self) -> Result<Connection, IndexError> {
        {
            let conn = self.connection.read().await;
            if let Some(ref conn) = *conn {
                return Ok(conn.clone());
            }
        }

        let mut slot = self.connection.write().await;
        if let Some(ref conn) = *slot {
            return Ok(conn.clone());
        }

        let uri = self.persist_dir.to_string_lossy().to_string();
        let conn = connect(&uri).execute().await?;
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn create_persist_dir(&self) -> Result<(), IndexError> {
        fs::create_dir_all(&self.persist_dir)
            .await
            .map_err(|error| unavailable(&self.persist_dir, error))
    }

    /// The collection table, or `None` when nothing was written yet.
    async fn table(&self) -> Result<Option<Table>, IndexError> {
        match fs::metadata(&self.persist_dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(IndexError::Unavailable {
                    path: self.persist_dir.display().to_string(),
                    reason: "not a directory".to_string(),
                })
            }
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(unavailable(&self.persist_dir, error)),
        }

        let conn = self.connection().await?;
        let names = conn.table_names().execute().await?;
        if !names.iter().any(|name| name == &self.collection) {
            return Ok(None);
        }

        Ok(Some(conn.open_table(&self.collection).execute().await?))
    }

    async fn table_or_create(&self, dimensions: usize) -> Result<Table, IndexError> {
        if let Some(table) = self.table().await? {
            return Ok(table);
        }

        self.create_persist_dir().await?;
        let conn = self.connection().await?;
        let table = conn
            .create_empty_table(&self.collection, records_schema(dimensions))
            .execute()
            .await?;
        info!(collection = %self.collection, dimensions, "created collection table");
        Ok(table)
    }

    async fn read_manifest(&self) -> Result<Option<Manifest>, IndexError> {
        let path = self.manifest_path();
        match fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|error| IndexError::Corrupt {
                    path: path.display().to_string(),
                    reason: error.to_string(),
                }),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(unavailable(&path, error)),
        }
    }
}

#[async_trait]
impl VectorStore for LanceStore {
    async fn ensure_collection(&self, model_id: &str, dimensions: usize) -> Result<(), IndexError> {
        self.create_persist_dir().await?;

        match self.read_manifest().await? {
            Some(manifest) => {
                if manifest.embedding_model != model_id || manifest.dimensions != dimensions {
                    return Err(IndexError::EmbeddingMismatch {
                        expected: format!(
                            "{} ({} dims)",
                            manifest.embedding_model, manifest.dimensions
                        ),
                        found: format!("{model_id} ({dimensions} dims)"),
                    });
                }
            }
            None => {
                let manifest = Manifest {
                    collection: self.collection.clone(),
                    embedding_model: model_id.to_string(),
                    dimensions,
                    created_at: Utc::now(),
                };
                let path = self.manifest_path();
                fs::write(&path, serde_json::to_string_pretty(&manifest)?)
                    .await
                    .map_err(|error| unavailable(&path, error))?;
                debug!(collection = %self.collection, model = model_id, "wrote manifest");
            }
        }

        self.table_or_create(dimensions).await?;
        Ok(())
    }

    async fn content_hashes(&self) -> Result<HashSet<ContentHash>, IndexError> {
        let Some(table) = self.table().await? else {
            return Ok(HashSet::new());
        };

        let mut stream = table
            .query()
            .select(Select::columns(&["content_hash"]))
            .execute()
            .await?;

        let mut hashes = HashSet::new();
        while let Some(batch) = stream.try_next().await? {
            let column = string_column(&batch, "content_hash", &self.collection)?;
            for row in 0..batch.num_rows() {
                hashes.insert(ContentHash::from_hex(column.value(row).to_string()));
            }
        }
        Ok(hashes)
    }

    async fn insert(&self, records: &[IndexedRecord]) -> Result<(), IndexError> {
        let Some(first) = records.first() else {
            return Ok(());
        };

        let table = self.table_or_create(first.embedding.len()).await?;
        let batch = records_to_batch(records)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        // One add is one committed table version: either every record lands or none.
        table.add(Box::new(batches)).execute().await?;

        debug!(collection = %self.collection, records = records.len(), "appended records");
        Ok(())
    }

    async fn nearest(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredRecord>, IndexError> {
        let Some(table) = self.table().await? else {
            return Ok(Vec::new());
        };

        let mut stream = table
            .vector_search(query_vector.to_vec())?
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await?;

        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            hits.extend(batch_to_scored(&batch, &self.collection)?);
        }

        hits.sort_by(|left, right| right.score.total_cmp(&left.score));
        hits.truncate(k);
        Ok(hits)
    }

    async fn len(&self) -> Result<usize, IndexError> {
        match self.table().await? {
            Some(table) => Ok(table.count_rows(None).await?),
            None => Ok(0),
        }
    }

    async fn drop_collection(&self) -> Result<(), IndexError> {
        if self.table().await?.is_some() {
            let conn = self.connection().await?;
            conn.drop_table(&self.collection, &[]).await?;
        }

        let path = self.manifest_path();
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(unavailable(&path, error)),
        }
    }
}

fn records_schema(dimensions: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("content_hash", DataType::Utf8, false),
        Field::new("content", DataType::Utf8, false),
        Field::new("metadata", DataType::Utf8, false),
        Field::new("indexed_at", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dimensions as i32,
            ),
            true,
        ),
    ]))
}

fn records_to_batch(records: &[IndexedRecord]) -> Result<RecordBatch, IndexError> {
    let dimensions = records.first().map_or(0, |record| record.embedding.len());
    if let Some(record) = records
        .iter()
        .find(|record| record.embedding.len() != dimensions)
    {
        return Err(IndexError::InvalidArgument(format!(
            "record {} has {} dims, batch has {dimensions}",
            record.id,
            record.embedding.len()
        )));
    }

    let ids: Vec<String> = records.iter().map(|record| record.id.clone()).collect();
    let hashes: Vec<String> = records
        .iter()
        .map(|record| record.content_hash.to_string())
        .collect();
    let contents: Vec<String> = records.iter().map(|record| record.content.clone()).collect();
    let metadata = records
        .iter()
        .map(|record| serde_json::to_string(&record.metadata))
        .collect::<Result<Vec<_>, _>>()?;
    let indexed_at: Vec<String> = records
        .iter()
        .map(|record| record.indexed_at.to_rfc3339())
        .collect();
    let vectors = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
        records
            .iter()
            .map(|record| Some(record.embedding.iter().copied().map(Some).collect::<Vec<_>>())),
        dimensions as i32,
    );

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(StringArray::from(hashes)),
        Arc::new(StringArray::from(contents)),
        Arc::new(StringArray::from(metadata)),
        Arc::new(StringArray::from(indexed_at)),
        Arc::new(vectors),
    ];

    Ok(RecordBatch::try_new(records_schema(dimensions), columns)?)
}

fn batch_to_scored(batch: &RecordBatch, collection: &str) -> Result<Vec<ScoredRecord>, IndexError> {
    let ids = string_column(batch, "id", collection)?;
    let hashes = string_column(batch, "content_hash", collection)?;
    let contents = string_column(batch, "content", collection)?;
    let metadata = string_column(batch, "metadata", collection)?;
    let indexed_at = string_column(batch, "indexed_at", collection)?;
    let vectors = batch
        .column_by_name("vector")
        .and_then(|column| column.as_any().downcast_ref::<FixedSizeListArray>());
    let distances = batch
        .column_by_name("_distance")
        .and_then(|column| column.as_any().downcast_ref::<Float32Array>());

    let mut hits = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let metadata: DocumentMetadata =
            serde_json::from_str(metadata.value(row)).map_err(|error| IndexError::Corrupt {
                path: collection.to_string(),
                reason: format!("metadata of record {}: {error}", ids.value(row)),
            })?;
        let indexed_at = DateTime::parse_from_rfc3339(indexed_at.value(row))
            .map(|at| at.with_timezone(&Utc))
            .map_err(|error| IndexError::Corrupt {
                path: collection.to_string(),
                reason: format!("indexed_at of record {}: {error}", ids.value(row)),
            })?;
        let embedding = vectors
            .map(|vectors| vectors.value(row))
            .and_then(|values| {
                values
                    .as_any()
                    .downcast_ref::<Float32Array>()
                    .map(|values| values.values().to_vec())
            })
            .unwrap_or_default();

        hits.push(ScoredRecord {
            score: distances.map_or(0.0, |distances| 1.0 - distances.value(row)),
            record: IndexedRecord {
                id: ids.value(row).to_string(),
                content_hash: ContentHash::from_hex(hashes.value(row).to_string()),
                content: contents.value(row).to_string(),
                metadata,
                embedding,
                indexed_at,
            },
        });
    }
    Ok(hits)
}

fn string_column<'a>(
    batch: &'a RecordBatch,
    name: &str,
    collection: &str,
) -> Result<&'a StringArray, IndexError> {
    batch
        .column_by_name(name)
        .and_then(|column| column.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| IndexError::Corrupt {
            path: collection.to_string(),
            reason: format!("missing {name} column"),
        })
}

fn unavailable(path: &Path, error: std::io::Error) -> IndexError {
    IndexError::Unavailable {
        path: path.display().to_string(),
        reason: error.to_string(),
    }
}
