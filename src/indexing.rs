//! Index construction.
//!
//! Builds a search-library index from a collection directory. An existing
//! index at the target path is reused unless `force` is set; there is no
//! content-based staleness check. The index is written into a staging
//! directory next to the target and moved into place after the final
//! commit, so an interrupted build never leaves a directory that a later
//! run would take for a finished index.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use tantivy::schema::{
    Field, IndexRecordOption, STORED, STRING, Schema, TextFieldIndexing, TextOptions,
};
use tantivy::tokenizer::TextAnalyzer;
use tantivy::{Index, IndexWriter, TantivyDocument};

use crate::analysis::{AnalyzerConfig, analyze, register_analyzers};
use crate::collection::{Collection, CollectionFormat, RawDocument};
use crate::error::{PipelineError, Result};
use crate::util::{discard, ensure_dir};

/// Stored document identifier.
pub const ID_FIELD: &str = "id";
/// Analyzed document text.
pub const CONTENTS_FIELD: &str = "contents";
/// Stored raw record.
pub const RAW_FIELD: &str = "raw";
/// Stored analyzed term list.
pub const VECTOR_FIELD: &str = "vector";

/// Documents between two progress log lines.
const PROGRESS_INTERVAL: u64 = 100_000;

const MIB: usize = 1024 * 1024;
const MIN_BUFFER_PER_THREAD_MB: usize = 15;
const MAX_BUFFER_PER_THREAD_MB: usize = 4000;

/// How collection records become index documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    /// Index `contents`, store `id`, plus `raw`/`vector` as configured.
    #[default]
    Default,
}

/// Configuration for the indexing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Target index directory.
    pub index_path: PathBuf,

    /// Format of the collection files.
    pub collection_format: CollectionFormat,

    /// Document generator.
    pub generator: GeneratorKind,

    /// Analyzer for the `contents` field.
    pub analyzer: AnalyzerConfig,

    /// Number of indexing threads.
    pub threads: usize,

    /// Total indexing memory buffer in MiB, shared by all threads.
    pub memory_buffer_mb: usize,

    /// Record term positions.
    pub store_positions: bool,

    /// Store the analyzed term list of each document.
    pub store_doc_vectors: bool,

    /// Store the raw collection record.
    pub store_raw: bool,

    /// Rebuild even if an index already exists.
    pub force: bool,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        IndexingConfig {
            index_path: PathBuf::from("data/indexes/ms-marco-doc/index-msmarco-doc"),
            collection_format: CollectionFormat::CleanTrec,
            generator: GeneratorKind::Default,
            analyzer: AnalyzerConfig::default(),
            threads: 1,
            memory_buffer_mb: 1024,
            store_positions: true,
            store_doc_vectors: true,
            store_raw: true,
            force: false,
        }
    }
}

impl IndexingConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(PipelineError::invalid_config(
                "indexing threads must be at least 1",
            ));
        }
        let per_thread = self.memory_buffer_mb / self.threads;
        if !(MIN_BUFFER_PER_THREAD_MB..=MAX_BUFFER_PER_THREAD_MB).contains(&per_thread) {
            return Err(PipelineError::invalid_config(format!(
                "memory buffer of {} MiB over {} threads gives {per_thread} MiB per thread; \
                 each thread needs between {MIN_BUFFER_PER_THREAD_MB} and {MAX_BUFFER_PER_THREAD_MB} MiB",
                self.memory_buffer_mb, self.threads
            )));
        }
        Ok(())
    }
}

/// Outcome of the indexing stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexReport {
    /// Index directory.
    pub index_path: PathBuf,

    /// Whether an existing index was reused.
    pub skipped: bool,

    /// Documents added during this run.
    pub documents: u64,

    /// Searchable segments after the final commit.
    pub segments: usize,

    /// Time spent in the stage.
    pub duration_ms: u64,
}

/// Fields of an index built by this crate.
#[derive(Debug, Clone, Copy)]
pub struct IndexFields {
    pub id: Field,
    pub contents: Field,
    pub raw: Option<Field>,
    pub vector: Option<Field>,
}

impl IndexFields {
    /// Look the fields up in an existing schema.
    pub fn from_schema(schema: &Schema) -> Result<Self> {
        Ok(IndexFields {
            id: schema.get_field(ID_FIELD)?,
            contents: schema.get_field(CONTENTS_FIELD)?,
            raw: schema.get_field(RAW_FIELD).ok(),
            vector: schema.get_field(VECTOR_FIELD).ok(),
        })
    }
}

/// Build the index schema for `config`.
pub fn build_schema(config: &IndexingConfig) -> (Schema, IndexFields) {
    let mut builder = Schema::builder();

    let id = builder.add_text_field(ID_FIELD, STRING | STORED);

    let record = if config.store_positions {
        IndexRecordOption::WithFreqsAndPositions
    } else {
        IndexRecordOption::WithFreqs
    };
    let indexing = TextFieldIndexing::default()
        .set_tokenizer(config.analyzer.tokenizer_name())
        .set_index_option(record);
    let contents = builder.add_text_field(
        CONTENTS_FIELD,
        TextOptions::default().set_indexing_options(indexing),
    );

    let raw = config
        .store_raw
        .then(|| builder.add_text_field(RAW_FIELD, STORED));
    let vector = config
        .store_doc_vectors
        .then(|| builder.add_text_field(VECTOR_FIELD, STORED));

    (
        builder.build(),
        IndexFields {
            id,
            contents,
            raw,
            vector,
        },
    )
}

/// Turns collection records into index documents.
pub trait DocumentGenerator {
    fn generate(&mut self, doc: RawDocument) -> Result<TantivyDocument>;
}

impl GeneratorKind {
    /// Create the generator for an index with the given fields.
    pub fn create(self, index: &Index, fields: IndexFields) -> Result<Box<dyn DocumentGenerator>> {
        match self {
            GeneratorKind::Default => Ok(Box::new(DefaultDocumentGenerator::new(index, fields)?)),
        }
    }
}

/// The standard generator.
pub struct DefaultDocumentGenerator {
    fields: IndexFields,
    analyzer: Option<TextAnalyzer>,
}

impl DefaultDocumentGenerator {
    pub fn new(index: &Index, fields: IndexFields) -> Result<Self> {
        let analyzer = match fields.vector {
            Some(_) => Some(index.tokenizer_for_field(fields.contents)?),
            None => None,
        };
        Ok(DefaultDocumentGenerator { fields, analyzer })
    }
}

impl DocumentGenerator for DefaultDocumentGenerator {
    fn generate(&mut self, doc: RawDocument) -> Result<TantivyDocument> {
        if doc.id.is_empty() {
            return Err(PipelineError::collection("document without id"));
        }

        let mut document = TantivyDocument::default();
        document.add_text(self.fields.id, &doc.id);
        if let (Some(field), Some(analyzer)) = (self.fields.vector, self.analyzer.as_mut()) {
            document.add_text(field, analyze(analyzer, &doc.contents).join(" "));
        }
        document.add_text(self.fields.contents, &doc.contents);
        if let Some(field) = self.fields.raw {
            document.add_text(field, &doc.raw);
        }
        Ok(document)
    }
}

/// Build the index for the collection in `input_dir`.
pub fn build_index(input_dir: &Path, config: &IndexingConfig) -> Result<IndexReport> {
    config.validate()?;
    let start = Instant::now();
    let index_path = &config.index_path;

    if index_path.exists() && !config.force {
        info!(
            "index {} already exists, skipping indexing",
            index_path.display()
        );
        return Ok(IndexReport {
            index_path: index_path.clone(),
            skipped: true,
            documents: 0,
            segments: 0,
            duration_ms: start.elapsed().as_millis() as u64,
        });
    }

    let collection = Collection::new(input_dir, config.collection_format);
    let documents = collection.documents()?;

    let staging = staging_path(index_path);
    discard(&staging);
    ensure_dir(&staging)?;

    info!(
        "indexing {} ({:?}) into {} with {} thread(s)",
        input_dir.display(),
        config.collection_format,
        index_path.display(),
        config.threads
    );
    let (documents, segments) = match write_index(&staging, documents, config) {
        Ok(counts) => counts,
        Err(e) => {
            discard(&staging);
            return Err(e);
        }
    };

    if index_path.exists() {
        debug!("removing previous index {}", index_path.display());
        fs::remove_dir_all(index_path)?;
    }
    if let Some(parent) = index_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    fs::rename(&staging, index_path)?;

    info!(
        "indexed {documents} documents into {segments} segment(s) in {:.1}s",
        start.elapsed().as_secs_f64()
    );
    Ok(IndexReport {
        index_path: index_path.clone(),
        skipped: false,
        documents,
        segments,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

fn write_index(
    dir: &Path,
    documents: impl Iterator<Item = Result<RawDocument>>,
    config: &IndexingConfig,
) -> Result<(u64, usize)> {
    let (schema, fields) = build_schema(config);
    let index = Index::create_in_dir(dir, schema)?;
    register_analyzers(&index);

    let mut writer: IndexWriter =
        index.writer_with_num_threads(config.threads, config.memory_buffer_mb * MIB)?;
    let mut generator = config.generator.create(&index, fields)?;

    let mut count = 0u64;
    for doc in documents {
        writer.add_document(generator.generate(doc?)?)?;
        count += 1;
        if count % PROGRESS_INTERVAL == 0 {
            info!("{count} documents indexed");
        }
    }

    writer.commit()?;
    writer.wait_merging_threads()?;

    let segments = index.searchable_segment_metas()?.len();
    Ok((count, segments))
}

fn staging_path(index_path: &Path) -> PathBuf {
    let mut name = index_path.file_name().unwrap_or_default().to_os_string();
    name.push(".staging");
    index_path.with_file_name(name)
}
