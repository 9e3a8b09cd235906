use crate::error::IngestError;
use crate::loaders::{HtmlLoader, NotebookLoader, PdfLoader, PythonLoader, TextLoader};
use crate::models::Document;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use walkdir::WalkDir;

/// Turns one file into documents.
///
/// Implementations fail on unreadable or malformed input, never return
/// whitespace-only documents, and always fill `source`, `file_path` and
/// `file_type`.
pub trait Extractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Vec<Document>, IngestError>;
}

/// Maps lowercase file extensions to extractors.
#[derive(Clone, Default)]
pub struct LoaderRegistry {
    extractors: BTreeMap<String, Arc<dyn Extractor>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table: pdf, txt, md, html, htm, py, ipynb.
    pub fn with_defaults() -> Self {
        let text: Arc<dyn Extractor> = Arc::new(TextLoader);
        let html: Arc<dyn Extractor> = Arc::new(HtmlLoader);

        let mut registry = Self::new();
        registry.register_shared("pdf", Arc::new(PdfLoader));
        registry.register_shared("txt", text.clone());
        registry.register_shared("md", text);
        registry.register_shared("html", html.clone());
        registry.register_shared("htm", html);
        registry.register_shared("py", Arc::new(PythonLoader));
        registry.register_shared("ipynb", Arc::new(NotebookLoader));
        registry
    }

    pub fn register<E: Extractor + 'static>(&mut self, extension: &str, extractor: E) {
        self.register_shared(extension, Arc::new(extractor));
    }

    fn register_shared(&mut self, extension: &str, extractor: Arc<dyn Extractor>) {
        self.extractors.insert(normalize_extension(extension), extractor);
    }

    /// Registered extensions in ascending order, without the leading dot.
    pub fn supported_extensions(&self) -> Vec<&str> {
        self.extractors.keys().map(String::as_str).collect()
    }

    pub fn supports(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.extractors.contains_key(&ext))
    }

    /// Runs the extractor registered for the path's extension.
    pub fn dispatch(&self, path: &Path) -> Result<Vec<Document>, IngestError> {
        let extension = extension_of(path).unwrap_or_default();
        let extractor = self
            .extractors
            .get(&extension)
            .ok_or_else(|| IngestError::UnsupportedFormat(display_extension(&extension, path)))?;

        extractor.extract(path)
    }

    /// Recursively lists every file under `root` with a registered extension,
    /// sorted so repeated runs see the same order.
    pub fn discover_files(&self, root: &Path) -> Vec<PathBuf> {
        if !root.exists() {
            warn!(root = %root.display(), "data directory does not exist");
            return Vec::new();
        }

        let mut files = Vec::new();

        for entry in WalkDir::new(root).into_iter().filter_map(|item| match item {
            Ok(entry) => Some(entry),
            Err(error) => {
                warn!(error = %error, "skipping unreadable directory entry");
                None
            }
        }) {
            if !entry.file_type().is_file() {
                continue;
            }

            if self.supports(entry.path()) {
                files.push(entry.path().to_path_buf());
            }
        }

        files.sort_unstable();
        files
    }
}

fn normalize_extension(extension: &str) -> String {
    extension.trim_start_matches('.').to_lowercase()
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(normalize_extension)
}

fn display_extension(extension: &str, path: &Path) -> String {
    if extension.is_empty() {
        format!("{} has no extension", path.display())
    } else {
        format!(".{extension}")
    }
}

/// Shared by the loaders: file name shown in citations.
pub(crate) fn display_name(path: &Path) -> Result<String, IngestError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            IngestError::MissingFileName(format!("path missing filename: {}", path.display()))
        })
}

pub(crate) fn extraction_error(path: &Path, reason: impl ToString) -> IngestError {
    IngestError::Extraction {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}
