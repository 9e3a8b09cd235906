use crate::error::IngestError;
use crate::extractor::{display_name, extraction_error, Extractor};
use crate::models::{Document, DocumentMetadata, FileType};
use regex::Regex;
use std::fs;
use std::path::Path;

/// Python source with its docstrings lifted to the front.
#[derive(Debug, Default, Clone, Copy)]
pub struct PythonLoader;

impl Extractor for PythonLoader {
    fn extract(&self, path: &Path) -> Result<Vec<Document>, IngestError> {
        let source = fs::read_to_string(path).map_err(|error| extraction_error(path, error))?;

        if source.trim().is_empty() {
            return Ok(Vec::new());
        }

        let docstrings = collect_docstrings(&source)?;

        let mut content = String::with_capacity(source.len());
        if !docstrings.is_empty() {
            content.push_str("=== Docstrings ===\n");
            content.push_str(&docstrings.join("\n\n"));
            content.push_str("\n\n=== Source Code ===\n");
        }
        content.push_str(&source);

        let mut metadata = DocumentMetadata::new(
            display_name(path)?,
            path.display().to_string(),
            FileType::Python,
        );
        metadata.is_code = Some(true);
        metadata.docstring_count = Some(docstrings.len());

        Ok(vec![Document::new(content, metadata)])
    }
}

/// Module, class and function docstrings in source order.
///
/// A docstring is a triple-quoted string that opens the module or the body of
/// a `def`/`class` block. Unterminated strings end the scan; whatever was
/// found before is kept.
fn collect_docstrings(source: &str) -> Result<Vec<String>, IngestError> {
    let header_re = Regex::new(r"^(?:async\s+def|def|class)\s+\w+")?;

    let lines: Vec<&str> = source.lines().collect();
    let mut docstrings = Vec::new();
    let mut expect_docstring = true;
    let mut header_depth: Option<i32> = None;
    let mut index = 0;

    while index < lines.len() {
        let trimmed = lines[index].trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            index += 1;
            continue;
        }

        if expect_docstring {
            expect_docstring = false;
            match read_docstring(&lines, index) {
                Some(Ok((text, next))) => {
                    if !text.is_empty() {
                        docstrings.push(text);
                    }
                    index = next;
                    continue;
                }
                Some(Err(())) => break,
                None => {}
            }
        }

        if header_depth.is_none() && header_re.is_match(trimmed) {
            header_depth = Some(0);
        }

        if let Some(depth) = header_depth.as_mut() {
            let code = strip_comment(trimmed);
            *depth += bracket_delta(code);
            if *depth <= 0 {
                header_depth = None;
                expect_docstring = code.ends_with(':');
            }
        }

        index += 1;
    }

    Ok(docstrings)
}

/// `None` when the line does not open a string, `Err` when it never closes.
fn read_docstring(lines: &[&str], start: usize) -> Option<Result<(String, usize), ()>> {
    let trimmed = lines[start].trim_start();
    let unprefixed = trimmed.trim_start_matches(['r', 'R', 'u', 'U']);
    if trimmed.len() - unprefixed.len() > 1 {
        return None;
    }

    let delimiter = ["\"\"\"", "'''"]
        .into_iter()
        .find(|delimiter| unprefixed.starts_with(delimiter))?;
    let first = &unprefixed[delimiter.len()..];

    if let Some(end) = first.find(delimiter) {
        return Some(Ok((clean_docstring(&first[..end]), start + 1)));
    }

    let mut body = vec![first];
    for (offset, line) in lines[start + 1..].iter().enumerate() {
        if let Some(end) = line.find(delimiter) {
            body.push(&line[..end]);
            return Some(Ok((clean_docstring(&body.join("\n")), start + offset + 2)));
        }
        body.push(line);
    }

    Some(Err(()))
}

/// Trims surrounding blank lines and removes the common indentation of every
/// line after the first.
fn clean_docstring(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().collect();
    let Some((first, rest)) = lines.split_first() else {
        return String::new();
    };

    let indent = rest
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned = vec![first.trim().to_string()];
    cleaned.extend(rest.iter().map(|line| {
        if line.trim().is_empty() {
            String::new()
        } else {
            line.get(indent..)
                .unwrap_or_else(|| line.trim_start())
                .trim_end()
                .to_string()
        }
    }));

    while cleaned.first().is_some_and(|line| line.is_empty()) {
        cleaned.remove(0);
    }
    while cleaned.last().is_some_and(|line| line.is_empty()) {
        cleaned.pop();
    }

    cleaned.join("\n")
}

fn strip_comment(line: &str) -> &str {
    line.split_once('#').map_or(line, |(code, _)| code).trim_end()
}

fn bracket_delta(code: &str) -> i32 {
    code.chars()
        .map(|ch| match ch {
            '(' | '[' | '{' => 1,
            ')' | ']' | '}' => -1,
            _ => 0,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MODULE: &str = r#"
"""
This is a module docstring.
"""

def test_function():
    """This is a function docstring."""
    return 42

class TestClass:
    """This is a class docstring.

    With a second paragraph.
    """

    async def method(
        self,
        value,
    ):
        '''Method docstring.'''
        return value

def no_docs(x):
    text = """not a docstring"""
    return x
"#;

    #[test]
    fn docstrings_are_lifted_before_source() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("module.py");
        fs::write(&path, MODULE)?;

        let documents = PythonLoader.extract(&path)?;

        assert_eq!(documents.len(), 1);
        let document = &documents[0];
        assert!(document.content.starts_with("=== Docstrings ===\nThis is a module docstring."));
        assert!(document.content.contains("This is a function docstring."));
        assert!(document.content.contains("This is a class docstring."));
        assert!(document.content.contains("\n\n=== Source Code ===\n"));
        assert!(document.content.ends_with(MODULE));
        assert_eq!(document.metadata.file_type, FileType::Python);
        assert_eq!(document.metadata.is_code, Some(true));
        assert_eq!(document.metadata.docstring_count, Some(4));
        Ok(())
    }

    #[test]
    fn multiline_docstring_is_dedented() -> Result<(), IngestError> {
        let docstrings = collect_docstrings(MODULE)?;
        assert_eq!(
            docstrings[2],
            "This is a class docstring.\n\nWith a second paragraph."
        );
        assert_eq!(docstrings[3], "Method docstring.");
        Ok(())
    }

    #[test]
    fn source_without_docstrings_is_kept_verbatim() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("plain.py");
        let source = "import os\n\nprint(os.getcwd())\n";
        fs::write(&path, source)?;

        let documents = PythonLoader.extract(&path)?;
        assert_eq!(documents[0].content, source);
        assert_eq!(documents[0].metadata.docstring_count, Some(0));
        Ok(())
    }

    #[test]
    fn unterminated_docstring_still_loads() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.py");
        fs::write(&path, "def f():\n    \"\"\"never closed\n    return 1\n")?;

        let documents = PythonLoader.extract(&path)?;
        assert_eq!(documents[0].metadata.docstring_count, Some(0));
        Ok(())
    }
}
