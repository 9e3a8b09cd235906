pub mod chunking;
pub mod dedup;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod loaders;
pub mod models;
pub mod retrieval;
pub mod stores;
pub mod traits;

pub use chunking::{chunk_documents, split_text, ChunkingConfig, SEPARATORS};
pub use dedup::{content_hash, partition, Partition};
#[cfg(feature = "local-embeddings-fastembed")]
pub use embeddings::FastEmbedder;
pub use embeddings::{
    embedder_for, CharacterNgramEmbedder, Embedder, CHARACTER_NGRAM_MODEL,
    DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_MODEL,
};
pub use error::{GenerationError, IndexError, IngestError};
pub use extractor::{Extractor, LoaderRegistry};
pub use generation::{
    answer_question, build_prompt, Generator, OpenAiCompatibleGenerator, QueryAnswer,
    DEFAULT_LLM_BASE_URL, DEFAULT_LLM_MODEL, DEFAULT_LLM_TEMPERATURE, NO_DOCUMENTS_ANSWER,
};
pub use index::VectorIndex;
pub use ingest::{ingest_directory, IngestionReport, SkippedFile};
pub use loaders::{HtmlLoader, NotebookLoader, PdfLoader, PythonLoader, TextLoader};
pub use models::{
    CellType, Chunk, ContentHash, Document, DocumentMetadata, FileType, IndexedRecord,
    IngestionStats, PipelineConfig, ScoredRecord, SourceInfo,
};
pub use retrieval::{format_context, format_sources, Retriever};
pub use stores::LanceStore;
pub use traits::VectorStore;
