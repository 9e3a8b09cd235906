use crate::error::IngestError;
use crate::extractor::{display_name, extraction_error, Extractor};
use crate::models::{Document, DocumentMetadata, FileType};
use regex::{Captures, Regex};
use std::fs;
use std::path::Path;

/// Elements whose text never reaches the document.
const STRIPPED_ELEMENTS: [&str; 5] = ["script", "style", "nav", "footer", "header"];

/// Visible text of an HTML page, one line per text node.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlLoader;

impl Extractor for HtmlLoader {
    fn extract(&self, path: &Path) -> Result<Vec<Document>, IngestError> {
        let html = fs::read_to_string(path).map_err(|error| extraction_error(path, error))?;
        let name = display_name(path)?;

        let title = page_title(&html)?.unwrap_or_else(|| {
            path.file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or(name.as_str())
                .to_string()
        });
        let content = visible_text(&html)?;

        if content.is_empty() {
            return Ok(Vec::new());
        }

        let mut metadata = DocumentMetadata::new(name, path.display().to_string(), FileType::Html);
        metadata.title = Some(title);

        Ok(vec![Document::new(content, metadata)])
    }
}

fn page_title(html: &str) -> Result<Option<String>, IngestError> {
    let title_re = Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>")?;

    let Some(inner) = title_re.captures(html).and_then(|capture| capture.get(1)) else {
        return Ok(None);
    };

    let title = decode_entities(inner.as_str())?
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    Ok((!title.is_empty()).then_some(title))
}

fn visible_text(html: &str) -> Result<String, IngestError> {
    let comment_re = Regex::new(r"(?s)<!--.*?-->")?;
    let mut cleaned = comment_re.replace_all(html, "\n").into_owned();

    for element in STRIPPED_ELEMENTS {
        let element_re = Regex::new(&format!(r"(?is)<{element}\b[^>]*>.*?</{element}\s*>"))?;
        cleaned = element_re.replace_all(&cleaned, "\n").into_owned();
    }

    let tag_re = Regex::new(r"(?s)<[^>]*>")?;
    let text = tag_re.replace_all(&cleaned, "\n");
    let decoded = decode_entities(&text)?;

    Ok(decoded
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}

fn decode_entities(text: &str) -> Result<String, IngestError> {
    let entity_re = Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);")?;

    Ok(entity_re
        .replace_all(text, |capture: &Captures| {
            let entity = &capture[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                    u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32)
                }
                _ if entity.starts_with('#') => {
                    entity[1..].parse::<u32>().ok().and_then(char::from_u32)
                }
                _ => None,
            };

            decoded.map_or_else(|| capture[0].to_string(), String::from)
        })
        .into_owned())
}
