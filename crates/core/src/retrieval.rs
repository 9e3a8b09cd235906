use crate::embeddings::Embedder;
use crate::error::IndexError;
use crate::index::VectorIndex;
use crate::models::{Chunk, SourceInfo};
use crate::traits::VectorStore;
use tracing::debug;

const SNIPPET_CHARS: usize = 200;

/// Top-k lookup over a [`VectorIndex`], best match first.
pub struct Retriever<'a, S, E>
where
    S: VectorStore,
    E: Embedder,
{
    index: &'a VectorIndex<S, E>,
    default_k: usize,
}

impl<'a, S, E> Retriever<'a, S, E>
where
    S: VectorStore + Send + Sync,
    E: Embedder + Send + Sync,
{
    pub fn new(index: &'a VectorIndex<S, E>, default_k: usize) -> Self {
        Self { index, default_k }
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<Chunk>, IndexError> {
        let hits = self.index.search(query, k).await?;
        debug!(k, hits = hits.len(), "retrieved chunks");
        Ok(hits.into_iter().map(|hit| hit.record.into_chunk()).collect())
    }

    pub async fn search_default(&self, query: &str) -> Result<Vec<Chunk>, IndexError> {
        self.search(query, self.default_k).await
    }
}

/// Citation entries for retrieved chunks, in the same order.
pub fn format_sources(chunks: &[Chunk]) -> Vec<SourceInfo> {
    chunks
        .iter()
        .map(|chunk| SourceInfo {
            filename: chunk.metadata.source.clone(),
            file_type: chunk.metadata.file_type.to_string(),
            location: chunk.metadata.location(),
            snippet: snippet(&chunk.content),
        })
        .collect()
}

/// Numbered context blocks handed to the generation step.
pub fn format_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(index, chunk)| {
            format!(
                "[Document {}]\nSource: {} ({}, {})\nContent: {}\n",
                index + 1,
                chunk.metadata.source,
                chunk.metadata.file_type,
                chunk.metadata.location(),
                chunk.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n")
}

fn snippet(content: &str) -> String {
    match content.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::models::{DocumentMetadata, FileType};
    use crate::stores::LanceStore;
    use tempfile::tempdir;

    fn text_chunk(text: &str, source: &str) -> Chunk {
        Chunk::new(
            text,
            DocumentMetadata::new(source, format!("/data/{source}"), FileType::Text),
        )
    }

    #[test]
    fn sources_use_location_precedence_and_snippets() {
        let mut paged = DocumentMetadata::new("guide.pdf", "/data/guide.pdf", FileType::Pdf);
        paged.page = Some(2);
        paged.cell_index = Some(5);
        let long_text = "x".repeat(250);

        let sources = format_sources(&[
            Chunk::new(long_text.clone(), paged),
            text_chunk("short", "notes.txt"),
        ]);

        assert_eq!(sources[0].filename, "guide.pdf");
        assert_eq!(sources[0].file_type, "pdf");
        assert_eq!(sources[0].location, "Page 2");
        assert_eq!(sources[0].snippet, format!("{}...", &long_text[..200]));
        assert_eq!(sources[1].location, "N/A");
        assert_eq!(sources[1].snippet, "short");
    }

    #[test]
    fn snippet_counts_characters_not_bytes() {
        let text = "é".repeat(201);
        assert_eq!(snippet(&text), format!("{}...", "é".repeat(200)));
        assert_eq!(snippet(&"é".repeat(200)), "é".repeat(200));
    }

    #[test]
    fn context_blocks_are_numbered_and_separated() {
        let mut cell = DocumentMetadata::new("nb.ipynb", "/data/nb.ipynb", FileType::Notebook);
        cell.cell_index = Some(3);

        let context = format_context(&[
            text_chunk("first body", "a.txt"),
            Chunk::new("second body", cell),
        ]);

        assert_eq!(
            context,
            "[Document 1]\nSource: a.txt (text, N/A)\nContent: first body\n\
             \n---\n\
             [Document 2]\nSource: nb.ipynb (notebook, Cell 3)\nContent: second body\n"
        );
        assert!(format_context(&[]).is_empty());
    }

    #[tokio::test]
    async fn unrelated_content_still_returns_up_to_k() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let index = VectorIndex::open(
            LanceStore::new(dir.path(), "docs"),
            CharacterNgramEmbedder::default(),
        )
        .await?;
        index
            .add(&[
                text_chunk("The tide tables for the northern harbour.", "tides.txt"),
                text_chunk("Sourdough needs a long cold proof.", "bread.txt"),
                text_chunk("Violin strings are tuned in fifths.", "music.txt"),
                text_chunk("Granite forms from slowly cooling magma.", "rocks.txt"),
                text_chunk("Comets shed dust when near the sun.", "space.txt"),
            ])
            .await?;

        let retriever = Retriever::new(&index, 4);
        let chunks = retriever.search_default("quarterly tax filing deadlines").await?;

        assert_eq!(chunks.len(), 4);
        assert!(format_sources(&chunks)
            .iter()
            .all(|source| source.location == "N/A"));
        Ok(())
    }

    #[tokio::test]
    async fn empty_index_returns_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let index = VectorIndex::open(
            LanceStore::new(dir.path(), "docs"),
            CharacterNgramEmbedder::default(),
        )
        .await?;

        let retriever = Retriever::new(&index, 4);
        assert!(retriever.search("anything", 3).await?.is_empty());
        assert_eq!(retriever.default_k(), 4);
        Ok(())
    }
}
