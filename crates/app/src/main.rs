use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use docrag_core::{
    answer_question, embedder_for, format_sources, ingest_directory, ChunkingConfig, LanceStore,
    LoaderRegistry, OpenAiCompatibleGenerator, PipelineConfig, Retriever, SourceInfo, VectorIndex,
    DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_MODEL, DEFAULT_LLM_BASE_URL,
    DEFAULT_LLM_MODEL,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docrag", version, about = "Ingest documents and ask questions about them")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding persisted collections
    #[arg(long, global = true, env = "DOCRAG_PERSIST_DIR", default_value = "index_store")]
    persist_dir: PathBuf,

    /// Collection name
    #[arg(long, global = true, env = "DOCRAG_COLLECTION", default_value = "rag_documents")]
    collection: String,

    /// Maximum chunk length in characters
    #[arg(long, global = true, env = "DOCRAG_CHUNK_SIZE", default_value_t = 1000)]
    chunk_size: usize,

    /// Characters shared between neighbouring chunks
    #[arg(long, global = true, env = "DOCRAG_CHUNK_OVERLAP", default_value_t = 200)]
    chunk_overlap: usize,

    /// Chunks retrieved when -k is not given
    #[arg(long, global = true, env = "DOCRAG_DEFAULT_K", default_value_t = 4)]
    default_k: usize,

    /// Embedding model: `char-ngram` or a local model such as bge-base-en-v1.5
    #[arg(
        long,
        global = true,
        env = "DOCRAG_EMBEDDING_MODEL",
        default_value = DEFAULT_EMBEDDING_MODEL
    )]
    embedding_model: String,

    /// Vector length of the char-ngram model; fixed once a collection exists
    #[arg(
        long,
        global = true,
        env = "DOCRAG_EMBEDDING_DIMENSIONS",
        default_value_t = DEFAULT_EMBEDDING_DIMENSIONS
    )]
    embedding_dimensions: usize,

    /// OpenAI compatible API base URL used by `ask`
    #[arg(long, global = true, env = "DOCRAG_LLM_BASE_URL", default_value = DEFAULT_LLM_BASE_URL)]
    llm_base_url: String,

    /// Chat model used by `ask`
    #[arg(long, global = true, env = "DOCRAG_LLM_MODEL", default_value = DEFAULT_LLM_MODEL)]
    llm_model: String,

    #[arg(long, global = true, env = "DOCRAG_LLM_TEMPERATURE", default_value_t = 0.0)]
    llm_temperature: f32,

    /// API key for the generation backend
    #[arg(long, global = true, env = "GROQ_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Load, chunk and index every supported file under a directory.
    Ingest {
        /// Directory scanned recursively.
        #[arg(long, env = "DOCRAG_DATA_DIR", default_value = "data")]
        data_dir: PathBuf,
        /// Print the ingestion report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Show the chunks closest to a query.
    Search {
        query: String,
        /// Number of chunks to return.
        #[arg(short)]
        k: Option<usize>,
    },
    /// Answer a question from the indexed documents.
    Ask {
        question: String,
        /// Number of chunks handed to the model.
        #[arg(short)]
        k: Option<usize>,
    },
    /// Print the number of indexed chunks.
    Stats,
    /// Delete every indexed chunk.
    Clear {
        /// Confirm the deletion.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

impl Cli {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            default_k: self.default_k,
            collection: self.collection.clone(),
            persist_dir: self.persist_dir.clone(),
            embedding_model: self.embedding_model.clone(),
            embedding_dimensions: self.embedding_dimensions,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.pipeline_config();
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        persist_dir = %config.persist_dir.display(),
        collection = %config.collection,
        embedding_model = %config.embedding_model,
        "docrag boot"
    );

    let store = LanceStore::new(&config.persist_dir, &config.collection);
    let embedder = embedder_for(&config.embedding_model, config.embedding_dimensions)
        .context("selecting the embedding model")?;
    let index = VectorIndex::open(store, embedder)
        .await
        .with_context(|| format!("opening collection {}", config.collection))?;

    match cli.command {
        Command::Ingest { data_dir, json } => {
            let registry = LoaderRegistry::with_defaults();
            let chunking = ChunkingConfig::from(&config);
            let report = ingest_directory(&data_dir, &registry, &chunking, &index).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                let stats = report.stats;
                println!("files found:      {}", stats.files_found);
                println!("documents loaded: {}", stats.documents_loaded);
                println!("chunks created:   {}", stats.chunks_created);
                println!("chunks added:     {}", stats.chunks_added);
                for skipped in &report.skipped_files {
                    println!("skipped {}: {}", skipped.path.display(), skipped.reason);
                }
            }
        }
        Command::Search { query, k } => {
            let retriever = Retriever::new(&index, config.default_k);
            let chunks = retriever
                .search(&query, k.unwrap_or(retriever.default_k()))
                .await?;

            if chunks.is_empty() {
                println!("no matching chunks");
            }
            print_sources(&format_sources(&chunks));
        }
        Command::Ask { question, k } => {
            let generator = OpenAiCompatibleGenerator::new(
                &cli.llm_base_url,
                cli.api_key.clone(),
                cli.llm_model.clone(),
                cli.llm_temperature,
            )
            .context("configuring the generation backend (set GROQ_API_KEY or --api-key)")?;

            let retriever = Retriever::new(&index, config.default_k);
            let answer = answer_question(
                &retriever,
                &generator,
                &question,
                k.unwrap_or(retriever.default_k()),
            )
            .await?;

            println!("{}\n", answer.answer);
            if answer.retrieved_docs > 0 {
                println!("sources ({}):", answer.retrieved_docs);
                print_sources(&answer.sources);
            }
        }
        Command::Stats => {
            println!("collection: {}", config.collection);
            println!("location:   {}", config.persist_dir.display());
            println!("model:      {}", config.embedding_model);
            println!("chunks:     {}", index.count().await);
        }
        Command::Clear { yes } => {
            if !yes {
                warn!("clear refused without --yes");
                anyhow::bail!("refusing to delete collection {} without --yes", config.collection);
            }
            index.clear().await?;
            println!("cleared collection {}", config.collection);
        }
    }

    Ok(())
}

fn print_sources(sources: &[SourceInfo]) {
    for (rank, source) in sources.iter().enumerate() {
        println!(
            "[{}] {} ({}, {})",
            rank + 1,
            source.filename,
            source.file_type,
            source.location
        );
        println!("    {}", source.snippet.replace('\n', " "));
    }
}
