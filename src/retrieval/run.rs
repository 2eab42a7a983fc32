//! Run files.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

/// Run file layouts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunFormat {
    /// `qid Q0 docid rank score tag`
    #[default]
    Trec,
    /// `qid<TAB>docid<TAB>rank`
    Msmarco,
}

/// One ranked result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEntry {
    pub topic_id: String,
    pub doc_id: String,
    /// 1-based rank within the topic.
    pub rank: usize,
    pub score: f32,
}

/// Writes [`RunEntry`] rows in a [`RunFormat`].
pub struct RunWriter<W: Write> {
    out: W,
    format: RunFormat,
    tag: String,
    rows: usize,
}

impl<W: Write> RunWriter<W> {
    /// `tag` is the run name in the last TREC column.
    pub fn new(out: W, format: RunFormat, tag: impl Into<String>) -> Self {
        RunWriter {
            out,
            format,
            tag: tag.into(),
            rows: 0,
        }
    }

    pub fn write_entry(&mut self, entry: &RunEntry) -> io::Result<()> {
        match self.format {
            RunFormat::Trec => writeln!(
                self.out,
                "{} Q0 {} {} {:.6} {}",
                entry.topic_id, entry.doc_id, entry.rank, entry.score, self.tag
            )?,
            RunFormat::Msmarco => writeln!(
                self.out,
                "{}\t{}\t{}",
                entry.topic_id, entry.doc_id, entry.rank
            )?,
        }
        self.rows += 1;
        Ok(())
    }

    pub fn write_all<'a, I>(&mut self, entries: I) -> io::Result<()>
    where
        I: IntoIterator<Item = &'a RunEntry>,
    {
        for entry in entries {
            self.write_entry(entry)?;
        }
        Ok(())
    }

    /// Rows written so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}
