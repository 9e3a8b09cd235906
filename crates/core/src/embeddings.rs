use crate::error::IndexError;
use async_trait::async_trait;

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

/// Model name that selects [`CharacterNgramEmbedder`].
pub const CHARACTER_NGRAM_MODEL: &str = "char-ngram";

pub const DEFAULT_EMBEDDING_MODEL: &str = "bge-base-en-v1.5";

/// Text to vector capability shared by indexing and querying.
///
/// Implementations must return vectors of `dimensions()` length. The
/// `model_id()` is pinned in the collection manifest, so two embedders that
/// produce incomparable vectors must report different ids.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_id(&self) -> String;
    fn dimensions(&self) -> usize;

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        self.embed_documents(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| IndexError::Embedding("no vector returned for query".to_string()))
    }
}

#[async_trait]
impl Embedder for Box<dyn Embedder> {
    fn model_id(&self) -> String {
        (**self).model_id()
    }

    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        (**self).embed_documents(texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        (**self).embed_query(text).await
    }
}

/// Builds the embedder configured by name.
///
/// `char-ngram` is the offline hashing model and honours `dimensions`. Any
/// other name is looked up among the local fastembed models, whose vector
/// length is fixed by the model.
pub fn embedder_for(model: &str, dimensions: usize) -> Result<Box<dyn Embedder>, IndexError> {
    match model {
        CHARACTER_NGRAM_MODEL => Ok(Box::new(CharacterNgramEmbedder::with_dimensions(
            dimensions,
        ))),
        #[cfg(feature = "local-embeddings-fastembed")]
        other => Ok(Box::new(FastEmbedder::new(other)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        other => Err(IndexError::UnknownModel(format!(
            "{other} (local models require the local-embeddings-fastembed feature)"
        ))),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// L2-normalized trigram histogram of `text`.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        // Inputs shorter than one trigram still get a bucket.
        if chars.len() < 3 {
            let token = chars.iter().collect::<String>();
            let bucket = bucket_for(&token, vector.len());
            vector[bucket] += 1.0;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let bucket = bucket_for(&token, vector.len());
            vector[bucket] += 1.0;
        }

        normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn model_id(&self) -> String {
        format!("{CHARACTER_NGRAM_MODEL}-{}", self.dimensions.max(1))
    }

    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }
}

fn bucket_for(token: &str, buckets: usize) -> usize {
    let mut hash = 1469598103934665603u64;
    for byte in token.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(1099511628211);
    }
    (hash % buckets as u64) as usize
}

fn normalize(vector: &mut [f32]) {
    let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for value in vector.iter_mut() {
            *value /= magnitude;
        }
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
pub use local::FastEmbedder;

#[cfg(feature = "local-embeddings-fastembed")]
mod local {
    use super::Embedder;
    use crate::error::IndexError;
    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::{Arc, Mutex};
    use tracing::info;

    const SUPPORTED: &str = "all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, \
        bge-large-en-v1.5, nomic-embed-text-v1, nomic-embed-text-v1.5, \
        multilingual-e5-small, multilingual-e5-base, multilingual-e5-large";

    /// Sentence embedding model run locally through fastembed.
    ///
    /// Weights are fetched from Hugging Face and cached on first use, so
    /// building the embedder is cheap and never touches the network.
    pub struct FastEmbedder {
        name: String,
        model: EmbeddingModel,
        dimensions: usize,
        loaded: Arc<Mutex<Option<TextEmbedding>>>,
    }

    impl FastEmbedder {
        pub fn new(name: &str) -> Result<Self, IndexError> {
            let (model, dimensions) = resolve(name)?;
            Ok(Self {
                name: name.to_string(),
                model,
                dimensions,
                loaded: Arc::new(Mutex::new(None)),
            })
        }
    }

    fn resolve(name: &str) -> Result<(EmbeddingModel, usize), IndexError> {
        match name {
            "all-minilm-l6-v2" => Ok((EmbeddingModel::AllMiniLML6V2, 384)),
            "bge-small-en-v1.5" => Ok((EmbeddingModel::BGESmallENV15, 384)),
            "bge-base-en-v1.5" => Ok((EmbeddingModel::BGEBaseENV15, 768)),
            "bge-large-en-v1.5" => Ok((EmbeddingModel::BGELargeENV15, 1024)),
            "nomic-embed-text-v1" => Ok((EmbeddingModel::NomicEmbedTextV1, 768)),
            "nomic-embed-text-v1.5" => Ok((EmbeddingModel::NomicEmbedTextV15, 768)),
            "multilingual-e5-small" => Ok((EmbeddingModel::MultilingualE5Small, 384)),
            "multilingual-e5-base" => Ok((EmbeddingModel::MultilingualE5Base, 768)),
            "multilingual-e5-large" => Ok((EmbeddingModel::MultilingualE5Large, 1024)),
            other => Err(IndexError::UnknownModel(format!(
                "{other} (supported: char-ngram, {SUPPORTED})"
            ))),
        }
    }

    #[async_trait]
    impl Embedder for FastEmbedder {
        fn model_id(&self) -> String {
            self.name.clone()
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }

        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
            let loaded = Arc::clone(&self.loaded);
            let model = self.model.clone();
            let name = self.name.clone();
            let texts = texts.to_vec();

            tokio::task::spawn_blocking(move || {
                let mut slot = loaded.lock().map_err(|_| {
                    IndexError::Embedding("embedding model lock poisoned".to_string())
                })?;

                if slot.is_none() {
                    info!(model = %name, "loading local embedding model");
                    let embedding = TextEmbedding::try_new(
                        InitOptions::new(model).with_show_download_progress(true),
                    )
                    .map_err(|error| {
                        IndexError::Embedding(format!("failed to load {name}: {error}"))
                    })?;
                    *slot = Some(embedding);
                }

                let embedding = slot
                    .as_mut()
                    .ok_or_else(|| IndexError::Embedding(format!("{name} is not loaded")))?;
                embedding
                    .embed(texts, None)
                    .map_err(|error| IndexError::Embedding(error.to_string()))
            })
            .await
            .map_err(|error| IndexError::Embedding(error.to_string()))?
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedder_is_deterministic() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed("Hydraulic pressure and flow");
        let second = embedder.embed("Hydraulic pressure and flow");
        assert_eq!(first, second);
    }

    #[test]
    fn embedder_outputs_expected_length() {
        let embedder = CharacterNgramEmbedder { dimensions: 32 };
        let vector = embedder.embed("abc");
        assert_eq!(vector.len(), 32);
        assert_eq!(embedder.model_id(), "char-ngram-32");
    }

    #[test]
    fn vectors_are_unit_length() {
        let embedder = CharacterNgramEmbedder::default();
        for text in ["a", "ab", "retrieval augmented generation"] {
            let norm = embedder
                .embed(text)
                .iter()
                .map(|value| value * value)
                .sum::<f32>()
                .sqrt();
            assert!((norm - 1.0).abs() < 1e-5, "{text} has norm {norm}");
        }
    }

    #[tokio::test]
    async fn batch_and_query_match_single_embedding() -> Result<(), Box<dyn std::error::Error>> {
        let embedder = CharacterNgramEmbedder::default();
        let batch = embedder
            .embed_documents(&["first text".to_string(), "second text".to_string()])
            .await?;
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1], embedder.embed("second text"));
        assert_eq!(embedder.embed_query("first text").await?, batch[0]);
        Ok(())
    }

    #[tokio::test]
    async fn char_ngram_is_selected_by_name() -> Result<(), Box<dyn std::error::Error>> {
        let embedder = embedder_for(CHARACTER_NGRAM_MODEL, 64)?;
        assert_eq!(embedder.model_id(), "char-ngram-64");
        assert_eq!(embedder.dimensions(), 64);
        assert_eq!(embedder.embed_query("boxed").await?.len(), 64);
        Ok(())
    }

    #[test]
    fn unknown_model_name_is_rejected() {
        assert!(matches!(
            embedder_for("word2vec-google-news", 64),
            Err(IndexError::UnknownModel(name)) if name.starts_with("word2vec-google-news")
        ));
    }

    #[cfg(feature = "local-embeddings-fastembed")]
    #[test]
    fn local_model_reports_its_own_dimensions() -> Result<(), Box<dyn std::error::Error>> {
        let embedder = embedder_for(DEFAULT_EMBEDDING_MODEL, 64)?;
        assert_eq!(embedder.model_id(), "bge-base-en-v1.5");
        assert_eq!(embedder.dimensions(), 768);

        let small = FastEmbedder::new("all-minilm-l6-v2")?;
        assert_eq!(small.dimensions(), 384);
        Ok(())
    }
}
