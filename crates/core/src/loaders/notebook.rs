use crate::error::IngestError;
use crate::extractor::{display_name, extraction_error, Extractor};
use crate::models::{CellType, Document, DocumentMetadata, FileType};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct Notebook {
    #[serde(default)]
    nbformat: Option<u32>,
    #[serde(default)]
    cells: Vec<NotebookCell>,
}

#[derive(Debug, Deserialize)]
struct NotebookCell {
    cell_type: String,
    #[serde(default)]
    source: Option<CellSource>,
}

/// nbformat allows a cell's source as one string or as a list of lines.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CellSource {
    Text(String),
    Lines(Vec<String>),
}

impl NotebookCell {
    fn source(&self) -> String {
        match &self.source {
            Some(CellSource::Text(text)) => text.clone(),
            Some(CellSource::Lines(lines)) => lines.concat(),
            None => String::new(),
        }
    }
}

/// Jupyter notebooks: one document per markdown cell and per code cell that
/// carries comments or docstrings.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotebookLoader;

impl Extractor for NotebookLoader {
    fn extract(&self, path: &Path) -> Result<Vec<Document>, IngestError> {
        let raw = fs::read_to_string(path).map_err(|error| extraction_error(path, error))?;
        let notebook: Notebook =
            serde_json::from_str(&raw).map_err(|error| extraction_error(path, error))?;

        if let Some(version) = notebook.nbformat.filter(|version| *version < 4) {
            return Err(extraction_error(
                path,
                format!("nbformat {version} is not supported, convert to version 4"),
            ));
        }

        let name = display_name(path)?;
        let file_path = path.display().to_string();
        let mut documents = Vec::new();

        for (cell_index, cell) in notebook.cells.iter().enumerate() {
            let (cell_type, content) = match cell.cell_type.as_str() {
                "markdown" => (CellType::Markdown, cell.source()),
                "code" => (CellType::Code, code_commentary(&cell.source())),
                _ => continue,
            };

            if content.trim().is_empty() {
                continue;
            }

            let mut metadata = DocumentMetadata::new(&name, &file_path, FileType::Notebook);
            metadata.cell_index = Some(cell_index);
            metadata.cell_type = Some(cell_type);
            documents.push(Document::new(content, metadata));
        }

        if documents.is_empty() {
            let mut metadata = DocumentMetadata::new(&name, &file_path, FileType::Notebook);
            metadata.cell_count = Some(notebook.cells.len());
            documents.push(Document::new(format!("Jupyter Notebook: {name}"), metadata));
        }

        Ok(documents)
    }
}

/// Comment lines and docstring lines of a code cell.
fn code_commentary(source: &str) -> String {
    source
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('#') || line.contains("\"\"\"") || line.contains("'''"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn write_notebook(
        dir: &Path,
        name: &str,
        cells: serde_json::Value,
    ) -> Result<std::path::PathBuf, Box<dyn std::error::Error>> {
        let path = dir.join(name);
        let notebook = json!({
            "nbformat": 4,
            "nbformat_minor": 5,
            "metadata": {},
            "cells": cells,
        });
        fs::write(&path, serde_json::to_string_pretty(&notebook)?)?;
        Ok(path)
    }

    #[test]
    fn cells_become_documents_with_their_index() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = write_notebook(
            dir.path(),
            "analysis.ipynb",
            json!([
                {"cell_type": "markdown", "metadata": {}, "source": ["# Analysis\n", "Loads the data."]},
                {"cell_type": "code", "metadata": {}, "outputs": [], "source": "x = 1\ny = 2"},
                {"cell_type": "code", "metadata": {}, "outputs": [], "source": "  # sum the values\nz = x + y"},
                {"cell_type": "raw", "metadata": {}, "source": "ignored"}
            ]),
        )?;

        let documents = NotebookLoader.extract(&path)?;

        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].content, "# Analysis\nLoads the data.");
        assert_eq!(documents[0].metadata.cell_index, Some(0));
        assert_eq!(documents[0].metadata.cell_type, Some(CellType::Markdown));
        assert_eq!(documents[1].content, "# sum the values");
        assert_eq!(documents[1].metadata.cell_index, Some(2));
        assert_eq!(documents[1].metadata.cell_type, Some(CellType::Code));
        assert_eq!(documents[1].metadata.file_type, FileType::Notebook);
        Ok(())
    }

    #[test]
    fn silent_notebook_gets_a_placeholder() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = write_notebook(
            dir.path(),
            "quiet.ipynb",
            json!([{"cell_type": "code", "metadata": {}, "outputs": [], "source": "print(1)"}]),
        )?;

        let documents = NotebookLoader.extract(&path)?;

        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].content, "Jupyter Notebook: quiet.ipynb");
        assert_eq!(documents[0].metadata.cell_count, Some(1));
        assert_eq!(documents[0].metadata.cell_index, None);
        Ok(())
    }

    #[test]
    fn malformed_json_fails_extraction() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.ipynb");
        fs::write(&path, "{\"cells\": [")?;

        let result = NotebookLoader.extract(&path);
        assert!(matches!(result, Err(IngestError::Extraction { .. })));
        Ok(())
    }
}
