use crate::error::IngestError;
use crate::models::{Chunk, Document, PipelineConfig};
use std::collections::VecDeque;

/// Split points in priority order. The empty separator splits between characters.
pub const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for ChunkingConfig {
    fn from(value: &PipelineConfig) -> Self {
        Self {
            chunk_size: value.chunk_size,
            chunk_overlap: value.chunk_overlap,
        }
    }
}

impl ChunkingConfig {
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
        Ok(())
    }
}

/// Splits every document and copies its metadata onto each piece.
pub fn chunk_documents(
    documents: &[Document],
    config: &ChunkingConfig,
) -> Result<Vec<Chunk>, IngestError> {
    config.validate()?;

    let mut chunks = Vec::new();
    for document in documents {
        for piece in split_text(&document.content, *config) {
            chunks.push(Chunk::new(piece, document.metadata.clone()));
        }
    }

    Ok(chunks)
}

/// Splits `text` into pieces of at most `chunk_size` characters, with roughly
/// `chunk_overlap` characters repeated between neighbours.
pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    split_recursive(text, &SEPARATORS, config)
}

fn split_recursive(text: &str, separators: &[&'static str], config: ChunkingConfig) -> Vec<String> {
    let (separator, remaining) = select_separator(text, separators);

    let mut output = Vec::new();
    let mut pending: Vec<&str> = Vec::new();

    for piece in split_keeping_separator(text, separator) {
        if char_len(piece) < config.chunk_size {
            pending.push(piece);
            continue;
        }

        if !pending.is_empty() {
            output.extend(merge_pieces(&pending, config));
            pending.clear();
        }

        if remaining.is_empty() {
            output.push(piece.to_string());
        } else {
            output.extend(split_recursive(piece, remaining, config));
        }
    }

    if !pending.is_empty() {
        output.extend(merge_pieces(&pending, config));
    }

    output
}

fn select_separator<'a>(
    text: &str,
    separators: &'a [&'static str],
) -> (&'static str, &'a [&'static str]) {
    for (index, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return ("", &[]);
        }
        if text.contains(separator) {
            return (separator, &separators[index + 1..]);
        }
    }
    ("", &[])
}

/// The separator stays at the start of the piece that follows it.
fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(index, ch)| &text[index..index + ch.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (index, _) in text.match_indices(separator) {
        if index > start {
            pieces.push(&text[start..index]);
        }
        start = index;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn merge_pieces(pieces: &[&str], config: ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        let len = char_len(piece);

        if total + len > config.chunk_size && !window.is_empty() {
            push_joined(&window, &mut chunks);

            while total > config.chunk_overlap || (total > 0 && total + len > config.chunk_size) {
                match window.pop_front() {
                    Some(front) => total -= char_len(front),
                    None => break,
                }
            }
        }

        window.push_back(piece);
        total += len;
    }

    push_joined(&window, &mut chunks);
    chunks
}

fn push_joined(window: &VecDeque<&str>, chunks: &mut Vec<String>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentMetadata, FileType};

    fn config(chunk_size: usize, chunk_overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size,
            chunk_overlap,
        }
    }

    #[test]
    fn words_merge_with_overlap() {
        let text = "one two three four five six seven eight nine ten";
        let chunks = split_text(text, config(15, 5));
        assert_eq!(
            chunks,
            vec!["one two three", "four five six", "six seven", "eight nine ten"]
        );
    }

    #[test]
    fn paragraphs_are_preferred_split_points() {
        let text = "First paragraph.\n\nSecond paragraph.";
        let chunks = split_text(text, config(20, 0));
        assert_eq!(chunks, vec!["First paragraph.", "Second paragraph."]);
    }

    #[test]
    fn unbroken_text_falls_back_to_characters() {
        let chunks = split_text("abcdefghij", config(4, 1));
        assert_eq!(chunks, vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = split_text("A is B.", ChunkingConfig::default());
        assert_eq!(chunks, vec!["A is B."]);
    }

    #[test]
    fn whitespace_only_text_yields_nothing() {
        assert!(split_text(" \n\n \n", config(10, 2)).is_empty());
    }

    #[test]
    fn multibyte_text_respects_character_bound() {
        let text = "äöü ß€ ñç ø å ".repeat(40);
        let limits = config(12, 4);
        for chunk in split_text(&text, limits) {
            assert!(chunk.chars().count() <= limits.chunk_size);
        }
    }

    #[test]
    fn long_document_chunks_stay_bounded_and_keep_metadata() -> Result<(), IngestError> {
        let mut metadata = DocumentMetadata::new("test.txt", "/data/test.txt", FileType::Text);
        metadata.page = Some(2);
        let document = Document::new("This is a test sentence. ".repeat(100), metadata.clone());
        let limits = ChunkingConfig::default();

        let chunks = chunk_documents(&[document], &limits)?;

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= limits.chunk_size + limits.chunk_overlap);
            assert_eq!(chunk.metadata, metadata);
        }
        Ok(())
    }

    #[test]
    fn chunking_is_deterministic() -> Result<(), IngestError> {
        let text = "Lorem ipsum dolor sit amet.\nConsectetur adipiscing elit. ".repeat(60);
        let document = Document::new(
            text,
            DocumentMetadata::new("lorem.md", "/data/lorem.md", FileType::Markdown),
        );
        let limits = config(120, 30);

        let first = chunk_documents(std::slice::from_ref(&document), &limits)?;
        let second = chunk_documents(std::slice::from_ref(&document), &limits)?;

        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn invalid_config_is_rejected() {
        let document = Document::new(
            "text",
            DocumentMetadata::new("a.txt", "/data/a.txt", FileType::Text),
        );
        let result = chunk_documents(&[document], &config(10, 10));
        assert!(matches!(result, Err(IngestError::InvalidChunkConfig(_))));
    }
}
