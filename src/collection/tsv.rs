//! Tab-separated collection reader (`id<TAB>contents`).

use std::io::BufRead;

use crate::collection::RawDocument;
use crate::error::{PipelineError, Result};

/// Iterator over `id<TAB>contents` lines.
pub struct TsvDocuments {
    input: Box<dyn BufRead + Send>,
    source: String,
    line: usize,
}

impl TsvDocuments {
    pub fn new(input: Box<dyn BufRead + Send>, source: String) -> Self {
        TsvDocuments {
            input,
            source,
            line: 0,
        }
    }

    fn parse(&self, line: &str) -> Result<RawDocument> {
        let (id, contents) = line.split_once('\t').ok_or_else(|| {
            PipelineError::collection(format!(
                "{}: line {}: expected <id><TAB><contents>",
                self.source, self.line
            ))
        })?;
        let id = id.trim();
        if id.is_empty() {
            return Err(PipelineError::collection(format!(
                "{}: line {}: empty document id",
                self.source, self.line
            )));
        }
        Ok(RawDocument {
            id: id.to_string(),
            contents: contents.trim().to_string(),
            raw: line.to_string(),
        })
    }
}

impl Iterator for TsvDocuments {
    type Item = Result<RawDocument>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();
        loop {
            line.clear();
            match self.input.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line += 1;
                    let record = line.trim_end_matches(['\r', '\n']);
                    if record.trim().is_empty() {
                        continue;
                    }
                    return Some(self.parse(record));
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}
