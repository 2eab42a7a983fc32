//! JSON lines collection reader.
//!
//! Each non-empty line is one object:
//! ```jsonl
//! {"id": "D1", "contents": "Stars emit radiation."}
//! ```

use std::io::BufRead;

use serde::Deserialize;

use crate::collection::RawDocument;
use crate::error::{PipelineError, Result};

#[derive(Deserialize)]
struct JsonRecord {
    #[serde(alias = "docid", alias = "_id")]
    id: String,
    #[serde(alias = "text")]
    contents: String,
}

/// Iterator over JSON lines records.
pub struct JsonDocuments {
    input: Box<dyn BufRead + Send>,
    source: String,
    line: usize,
}

impl JsonDocuments {
    pub fn new(input: Box<dyn BufRead + Send>, source: String) -> Self {
        JsonDocuments {
            input,
            source,
            line: 0,
        }
    }
}

impl Iterator for JsonDocuments {
    type Item = Result<RawDocument>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();
        loop {
            line.clear();
            match self.input.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line += 1;
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    return Some(
                        serde_json::from_str::<JsonRecord>(trimmed)
                            .map(|record| RawDocument {
                                id: record.id,
                                contents: record.contents,
                                raw: trimmed.to_string(),
                            })
                            .map_err(|e| {
                                PipelineError::collection(format!(
                                    "{}: line {}: {e}",
                                    self.source, self.line
                                ))
                            }),
                    );
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read(input: &str) -> Vec<Result<RawDocument>> {
        JsonDocuments::new(
            Box::new(Cursor::new(input.to_string())),
            "docs.jsonl".to_string(),
        )
        .collect()
    }

    #[test]
    fn test_json_lines() {
        let docs = read(
            "{\"id\": \"D1\", \"contents\": \"first\"}\n\n{\"_id\": \"D2\", \"text\": \"second\"}\n",
        );
        assert_eq!(docs.len(), 2);
        let first = docs[0].as_ref().unwrap();
        assert_eq!(first.id, "D1");
        assert_eq!(first.contents, "first");
        assert_eq!(first.raw, "{\"id\": \"D1\", \"contents\": \"first\"}");
        assert_eq!(docs[1].as_ref().unwrap().id, "D2");
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let docs = read("{\"id\": \"D1\", \"contents\": \"ok\"}\n{\"id\": 5}\n");
        let err = docs[1].as_ref().unwrap_err().to_string();
        assert!(err.contains("docs.jsonl: line 2"), "{err}");
    }
}
