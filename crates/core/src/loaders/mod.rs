//! Extraction capabilities, one per supported format.

pub mod html;
pub mod notebook;
pub mod pdf;
pub mod python;
pub mod text;

pub use html::HtmlLoader;
pub use notebook::NotebookLoader;
pub use pdf::PdfLoader;
pub use python::PythonLoader;
pub use text::TextLoader;
