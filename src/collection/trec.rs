//! TREC SGML collection reader.
//!
//! Records look like:
//! ```text
//! <DOC>
//! <DOCNO>D1555982</DOCNO>
//! <TEXT>
//! https://answers.yahoo.com/question/index?qid=20071007114826AAwCFvR
//! The hot glowing surfaces of stars emit energy in the form of electromagnetic radiation.
//! </TEXT>
//! </DOC>
//! ```

use std::io::BufRead;
use std::sync::LazyLock;

use regex::Regex;

use crate::collection::RawDocument;
use crate::error::{PipelineError, Result};

static DOCNO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<DOCNO>\s*(.*?)\s*</DOCNO>").expect("valid DOCNO pattern"));

static MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid markup pattern"));

const DOC_START: &str = "<DOC>";
const DOC_END: &str = "</DOC>";

/// Iterator over the `<DOC>` records of one TREC stream.
pub struct TrecDocuments {
    input: Box<dyn BufRead + Send>,
    source: String,
    clean: bool,
    line: usize,
    /// Text following the last `</DOC>` on its line.
    carry: String,
}

impl TrecDocuments {
    /// `clean` keeps the body as-is apart from the `<TEXT>` markers; otherwise
    /// every markup tag is stripped.
    pub fn new(input: Box<dyn BufRead + Send>, source: String, clean: bool) -> Self {
        TrecDocuments {
            input,
            source,
            clean,
            line: 0,
            carry: String::new(),
        }
    }

    fn read_line(&mut self, buf: &mut String) -> Result<bool> {
        if !self.carry.is_empty() {
            *buf = std::mem::take(&mut self.carry);
            return Ok(true);
        }
        buf.clear();
        let read = self.input.read_line(buf)?;
        if read > 0 {
            self.line += 1;
        }
        Ok(read > 0)
    }

    fn next_record(&mut self) -> Result<Option<RawDocument>> {
        let mut line = String::new();

        let mut pending = loop {
            if !self.read_line(&mut line)? {
                return Ok(None);
            }
            if let Some(rest) = line.trim_start().strip_prefix(DOC_START) {
                break rest.to_string();
            }
        };
        let start = self.line;

        let mut body = String::new();
        loop {
            if let Some(end) = pending.find(DOC_END) {
                body.push_str(&pending[..end]);
                let rest = &pending[end + DOC_END.len()..];
                if !rest.trim().is_empty() {
                    self.carry = rest.to_string();
                }
                break;
            }
            body.push_str(&pending);
            if !self.read_line(&mut line)? {
                return Err(PipelineError::collection(format!(
                    "{}: line {start}: unterminated {DOC_START} record",
                    self.source
                )));
            }
            pending = std::mem::take(&mut line);
        }

        self.build(body, start).map(Some)
    }

    fn build(&self, body: String, start: usize) -> Result<RawDocument> {
        let id = DOCNO
            .captures(&body)
            .map(|caps| caps[1].trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                PipelineError::collection(format!(
                    "{}: line {start}: record without <DOCNO>",
                    self.source
                ))
            })?;

        let text = DOCNO.replace(&body, "");
        let contents = if self.clean {
            text.replace("<TEXT>", "").replace("</TEXT>", "")
        } else {
            MARKUP.replace_all(&text, " ").into_owned()
        };

        Ok(RawDocument {
            id,
            contents: contents.trim().to_string(),
            raw: format!("{DOC_START}{body}{DOC_END}"),
        })
    }
}

impl Iterator for TrecDocuments {
    type Item = Result<RawDocument>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "\
<DOC>
<DOCNO>D1</DOCNO>
<TEXT>
http://example.com/stars
Stars emit <b>radiation</b>.
</TEXT>
</DOC>
<DOC>
<DOCNO> D2 </DOCNO>
<TEXT>
Planets orbit stars.
</TEXT>
</DOC>
";

    fn read(input: &str, clean: bool) -> Vec<Result<RawDocument>> {
        TrecDocuments::new(
            Box::new(Cursor::new(input.to_string())),
            "sample.trec".to_string(),
            clean,
        )
        .collect()
    }

    #[test]
    fn test_clean_trec_keeps_body_markup() {
        let docs: Vec<_> = read(SAMPLE, true).into_iter().map(|d| d.unwrap()).collect();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "D1");
        assert_eq!(
            docs[0].contents,
            "http://example.com/stars\nStars emit <b>radiation</b>."
        );
        assert!(docs[0].raw.starts_with("<DOC>\n<DOCNO>D1</DOCNO>"));
        assert!(docs[0].raw.ends_with("</TEXT>\n</DOC>"));
        assert_eq!(docs[1].id, "D2");
        assert_eq!(docs[1].contents, "Planets orbit stars.");
    }

    #[test]
    fn test_trec_strips_markup() {
        let docs: Vec<_> = read(SAMPLE, false).into_iter().map(|d| d.unwrap()).collect();
        assert!(!docs[0].contents.contains('<'));
        assert!(docs[0].contents.contains("radiation"));
    }

    #[test]
    fn test_single_line_record_and_leading_noise() {
        let docs = read("junk\n<DOC><DOCNO>X9</DOCNO>inline text</DOC>\n", true);
        assert_eq!(docs.len(), 1);
        let doc = docs[0].as_ref().unwrap();
        assert_eq!(doc.id, "X9");
        assert_eq!(doc.contents, "inline text");
    }

    #[test]
    fn test_records_sharing_a_line() {
        let docs = read(
            "<DOC><DOCNO>A1</DOCNO>first</DOC><DOC><DOCNO>A2</DOCNO>\nsecond\n</DOC> <DOC><DOCNO>A3</DOCNO>third</DOC>\n",
            true,
        );
        let docs: Vec<_> = docs.into_iter().map(|d| d.unwrap()).collect();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["A1", "A2", "A3"]);
        assert_eq!(docs[1].contents, "second");
        assert_eq!(docs[2].contents, "third");
    }

    #[test]
    fn test_unterminated_record() {
        let docs = read("<DOC>\n<DOCNO>D1</DOCNO>\ntext\n", true);
        assert_eq!(docs.len(), 1);
        let err = docs[0].as_ref().unwrap_err().to_string();
        assert!(err.contains("sample.trec: line 1"), "{err}");
    }

    #[test]
    fn test_missing_docno() {
        let docs = read("<DOC>\n<TEXT>no id</TEXT>\n</DOC>\n", true);
        assert!(matches!(docs[0], Err(PipelineError::Collection(_))));
    }
}
