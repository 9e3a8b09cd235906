use crate::error::IngestError;
use crate::extractor::{display_name, Extractor};
use crate::models::{Document, DocumentMetadata, FileType};
use std::path::Path;

/// One document per PDF page that has extractable text.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfLoader;

impl Extractor for PdfLoader {
    fn extract(&self, path: &Path) -> Result<Vec<Document>, IngestError> {
        let pdf = lopdf::Document::load(path).map_err(|error| {
            IngestError::PdfParse(format!("{}: {error}", path.display()))
        })?;

        let name = display_name(path)?;
        let file_path = path.display().to_string();

        let mut documents = Vec::new();
        for (page_no, _page_id) in pdf.get_pages() {
            let text = pdf.extract_text(&[page_no]).map_err(|error| {
                IngestError::PdfParse(format!("{} page {page_no}: {error}", path.display()))
            })?;

            if text.trim().is_empty() {
                continue;
            }

            let mut metadata = DocumentMetadata::new(&name, &file_path, FileType::Pdf);
            metadata.page = Some(page_no);
            documents.push(Document::new(text, metadata));
        }

        if documents.is_empty() {
            return Err(IngestError::PdfParse(format!(
                "pdf had no readable page text: {}",
                path.display()
            )));
        }

        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};
    use std::fs;
    use tempfile::tempdir;

    fn write_single_page_pdf(path: &Path, text: &str) -> Result<(), Box<dyn std::error::Error>> {
        let mut pdf = lopdf::Document::with_version("1.5");
        let pages_id = pdf.new_object_id();
        let font_id = pdf.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = pdf.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = pdf.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = pdf.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        pdf.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = pdf.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        pdf.trailer.set("Root", catalog_id);
        pdf.save(path)?;
        Ok(())
    }

    #[test]
    fn pages_carry_their_number() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("manual.pdf");
        write_single_page_pdf(&path, "Hydraulic pressure limits")?;

        let documents = PdfLoader.extract(&path)?;

        assert_eq!(documents.len(), 1);
        assert!(documents[0].content.contains("Hydraulic"));
        assert_eq!(documents[0].metadata.page, Some(1));
        assert_eq!(documents[0].metadata.file_type, FileType::Pdf);
        assert_eq!(documents[0].metadata.source, "manual.pdf");
        Ok(())
    }

    #[test]
    fn broken_pdf_is_a_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("unreadable.pdf");
        fs::write(&path, b"%PDF-1.4\n%broken")?;

        let result = PdfLoader.extract(&path);

        assert!(matches!(result, Err(IngestError::PdfParse(_))));
        Ok(())
    }

    #[test]
    fn missing_pdf_is_a_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let result = PdfLoader.extract(&dir.path().join("absent.pdf"));
        assert!(matches!(result, Err(IngestError::PdfParse(_))));
        Ok(())
    }
}
