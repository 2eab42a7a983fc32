//! Document collections read from disk.
//!
//! A collection is a directory of plain or gzip-compressed files in one of
//! the supported [`CollectionFormat`]s. [`Collection::documents`] walks the
//! files in name order and yields one [`RawDocument`] per record.
//!
//! # Example
//!
//! ```no_run
//! use coreir::collection::{Collection, CollectionFormat};
//!
//! let collection = Collection::new("data/collections/ms-marco-doc", CollectionFormat::CleanTrec);
//! for doc in collection.documents().unwrap() {
//!     let doc = doc.unwrap();
//!     println!("{}: {} bytes", doc.id, doc.contents.len());
//! }
//! ```

use std::collections::VecDeque;
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::acquisition::PARTIAL_SUFFIX;
use crate::error::{PipelineError, Result};
use crate::util::open_compressed;

pub mod json;
pub mod trec;
pub mod tsv;

/// One record of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    /// External document identifier.
    pub id: String,

    /// Text to be analyzed and indexed.
    pub contents: String,

    /// The record as it appeared in the collection file.
    pub raw: String,
}

/// Boxed document stream produced by a format reader.
pub type DocumentStream = Box<dyn Iterator<Item = Result<RawDocument>> + Send>;

/// On-disk collection formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionFormat {
    /// TREC SGML records with an already clean body; only `<TEXT>` markers are removed.
    CleanTrec,
    /// TREC SGML records; all markup is stripped from the body.
    Trec,
    /// JSON lines with `id` and `contents`.
    Json,
    /// `id<TAB>contents` lines.
    Tsv,
}

impl CollectionFormat {
    /// Parse one input stream. `source` names the stream in error messages.
    pub fn parse(self, input: Box<dyn BufRead + Send>, source: String) -> DocumentStream {
        match self {
            CollectionFormat::CleanTrec => Box::new(trec::TrecDocuments::new(input, source, true)),
            CollectionFormat::Trec => Box::new(trec::TrecDocuments::new(input, source, false)),
            CollectionFormat::Json => Box::new(json::JsonDocuments::new(input, source)),
            CollectionFormat::Tsv => Box::new(tsv::TsvDocuments::new(input, source)),
        }
    }
}

/// A directory of collection files.
#[derive(Debug, Clone)]
pub struct Collection {
    root: PathBuf,
    format: CollectionFormat,
}

impl Collection {
    /// Create a collection rooted at `root`.
    pub fn new<P: AsRef<Path>>(root: P, format: CollectionFormat) -> Self {
        Collection {
            root: root.as_ref().to_path_buf(),
            format,
        }
    }

    /// The collection directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The collection format.
    pub fn format(&self) -> CollectionFormat {
        self.format
    }

    /// Regular files of the collection, sorted by name.
    ///
    /// Hidden files and unfinished downloads are skipped. A missing or empty
    /// directory is an error.
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(PipelineError::missing(&self.root));
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type()?.is_file() || is_ignored(&path) {
                continue;
            }
            files.push(path);
        }
        files.sort();

        if files.is_empty() {
            return Err(PipelineError::collection(format!(
                "no collection files in {}",
                self.root.display()
            )));
        }
        Ok(files)
    }

    /// Iterate over every document of every file.
    pub fn documents(&self) -> Result<Documents> {
        Ok(Documents {
            files: self.files()?.into(),
            current: None,
            format: self.format,
        })
    }
}

fn is_ignored(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'));
    let partial = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == PARTIAL_SUFFIX);
    hidden || partial
}

/// Iterator over the documents of a [`Collection`].
pub struct Documents {
    files: VecDeque<PathBuf>,
    current: Option<DocumentStream>,
    format: CollectionFormat,
}

impl Iterator for Documents {
    type Item = Result<RawDocument>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(stream) = self.current.as_mut() {
                if let Some(item) = stream.next() {
                    return Some(item);
                }
                self.current = None;
            }

            let path = self.files.pop_front()?;
            match open_compressed(&path) {
                Ok(input) => {
                    log::debug!("reading collection file {}", path.display());
                    self.current = Some(self.format.parse(input, path.display().to_string()));
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}
