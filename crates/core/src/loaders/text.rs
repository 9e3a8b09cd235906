use crate::error::IngestError;
use crate::extractor::{display_name, extraction_error, Extractor};
use crate::models::{Document, DocumentMetadata, FileType};
use std::fs;
use std::path::Path;

/// Plain text and Markdown, loaded whole.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextLoader;

impl Extractor for TextLoader {
    fn extract(&self, path: &Path) -> Result<Vec<Document>, IngestError> {
        let content = fs::read_to_string(path).map_err(|error| extraction_error(path, error))?;

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let is_markdown = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("md"));
        let file_type = if is_markdown {
            FileType::Markdown
        } else {
            FileType::Text
        };

        Ok(vec![Document::new(
            content,
            DocumentMetadata::new(display_name(path)?, path.display().to_string(), file_type),
        )])
    }
}
