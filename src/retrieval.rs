//! Ranked retrieval over a topic set.
//!
//! [`retrieve`] makes sure the run file exists, reads the topics, opens the
//! index and searches every topic on a rayon pool, then writes the ranked
//! rows in topic order.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, info};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tantivy::schema::Value;
use tantivy::tokenizer::TextAnalyzer;
use tantivy::{DocAddress, Index, IndexReader, ReloadPolicy, Searcher, TantivyDocument};

use crate::analysis::{analyze, register_analyzers};
use crate::error::{PipelineError, Result};
use crate::indexing::IndexFields;
use crate::util::ensure_file;

pub mod run;
pub mod scoring;
pub mod topics;

pub use run::{RunEntry, RunFormat, RunWriter};
pub use scoring::{DEFAULT_B, DEFAULT_K1, ScoringModel};
pub use topics::{Topic, TopicFormat, read_topics};

/// Default run tag in TREC output.
pub const DEFAULT_RUN_TAG: &str = "coreir";

/// Processors minus one, never below one.
pub fn default_threads() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

/// Configuration for the retrieval stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Ranking function.
    pub model: ScoringModel,

    /// Maximum rows per topic.
    pub hits: usize,

    /// Search threads; unset means [`default_threads`] on the running machine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,

    /// Layout of the topic files.
    pub topic_format: TopicFormat,

    /// Topic files, merged.
    pub topics: Vec<PathBuf>,

    /// Run file to write.
    pub output: PathBuf,

    /// Layout of the run file.
    pub output_format: RunFormat,

    /// Run name in TREC output.
    pub run_tag: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        RetrievalConfig {
            model: ScoringModel::default(),
            hits: 1000,
            threads: None,
            topic_format: TopicFormat::TsvInt,
            topics: vec![PathBuf::from(
                "data/topics-and-qrels/topics.msmarco-doc.dev.txt",
            )],
            output: PathBuf::from("data/runs/run.msmarco-doc.dev.bm25.txt"),
            output_format: RunFormat::Trec,
            run_tag: DEFAULT_RUN_TAG.to_string(),
        }
    }
}

impl RetrievalConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.hits == 0 {
            return Err(PipelineError::invalid_config("hits must be at least 1"));
        }
        if self.threads == Some(0) {
            return Err(PipelineError::invalid_config(
                "retrieval threads must be at least 1",
            ));
        }
        if self.topics.is_empty() {
            return Err(PipelineError::invalid_config("no topic files given"));
        }
        if self.run_tag.chars().any(char::is_whitespace) {
            return Err(PipelineError::invalid_config(format!(
                "run tag {:?} must not contain whitespace",
                self.run_tag
            )));
        }
        self.model.validate()
    }

    /// Effective search thread count.
    pub fn threads(&self) -> usize {
        self.threads.unwrap_or_else(default_threads)
    }
}

/// Outcome of the retrieval stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalReport {
    /// Run file written.
    pub output: PathBuf,

    /// Ranking function used.
    pub model: ScoringModel,

    /// Topics searched.
    pub topics: usize,

    /// Topics without any matching document.
    pub empty_topics: usize,

    /// Rows written.
    pub rows: usize,

    /// Time spent in the stage.
    pub duration_ms: u64,
}

/// An open index ready to answer topics.
pub struct TopicSearcher {
    reader: IndexReader,
    fields: IndexFields,
    analyzer: TextAnalyzer,
}

impl TopicSearcher {
    /// Open the index at `index_path`.
    pub fn open(index_path: &Path) -> Result<Self> {
        if !index_path.is_dir() {
            return Err(PipelineError::missing(index_path));
        }
        let index = Index::open_in_dir(index_path)?;
        register_analyzers(&index);

        let fields = IndexFields::from_schema(&index.schema())?;
        let analyzer = index.tokenizer_for_field(fields.contents)?;
        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(TopicSearcher {
            reader,
            fields,
            analyzer,
        })
    }

    /// Documents in the index.
    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Rank the documents for one topic.
    ///
    /// Rows are ordered by score, ties by document id, and ranked from 1.
    /// At most `hits` rows are kept; a tie at the cutoff goes to the smaller id.
    pub fn search(
        &self,
        topic: &Topic,
        model: &ScoringModel,
        hits: usize,
    ) -> Result<Vec<RunEntry>> {
        let terms = analyze(&mut self.analyzer.clone(), &topic.query);
        if terms.is_empty() {
            debug!("topic {} has no searchable terms", topic.id);
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let ranked = model.rank(&searcher, self.fields.contents, &terms, hits)?;

        let mut rows = Vec::with_capacity(ranked.len());
        for doc in ranked {
            rows.push((self.doc_id(&searcher, doc.address)?, doc.score));
        }
        rows.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        rows.truncate(hits);

        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(i, (doc_id, score))| RunEntry {
                topic_id: topic.id.clone(),
                doc_id,
                rank: i + 1,
                score,
            })
            .collect())
    }

    fn doc_id(&self, searcher: &Searcher, address: DocAddress) -> Result<String> {
        let doc: TantivyDocument = searcher.doc(address)?;
        doc.get_first(self.fields.id)
            .and_then(|value| value.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                PipelineError::Index(tantivy::TantivyError::InternalError(format!(
                    "document {address:?} has no stored id"
                )))
            })
    }
}

/// Search every topic on `threads` workers. Results keep topic order.
pub fn run_topics(
    searcher: &TopicSearcher,
    topics: &[Topic],
    model: &ScoringModel,
    hits: usize,
    threads: usize,
) -> Result<Vec<Vec<RunEntry>>> {
    let pool = search_pool(threads)?;
    pool.install(|| {
        topics
            .par_iter()
            .map(|topic| searcher.search(topic, model, hits))
            .collect()
    })
}

fn search_pool(threads: usize) -> Result<ThreadPool> {
    Ok(ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(|i| format!("coreir-search-{i}"))
        .build()?)
}

/// Run the retrieval stage against the index at `index_path`.
pub fn retrieve(index_path: &Path, config: &RetrievalConfig) -> Result<RetrievalReport> {
    config.validate()?;
    prepare_output(&config.output)?;

    let topics = read_topics(&config.topics, config.topic_format)?;
    let searcher = TopicSearcher::open(index_path)?;
    retrieve_with(&searcher, &topics, config)
}

/// Run the retrieval stage with an already open index and topic set.
pub fn retrieve_with(
    searcher: &TopicSearcher,
    topics: &[Topic],
    config: &RetrievalConfig,
) -> Result<RetrievalReport> {
    config.validate()?;
    prepare_output(&config.output)?;
    let start = Instant::now();

    info!(
        "searching {} topics over {} documents with {:?} ({} hits, {} thread(s))",
        topics.len(),
        searcher.num_docs(),
        config.model,
        config.hits,
        config.threads()
    );
    let results = run_topics(
        searcher,
        topics,
        &config.model,
        config.hits,
        config.threads(),
    )?;

    let file =
        File::create(&config.output).map_err(|e| PipelineError::create_file(&config.output, e))?;
    let mut writer = RunWriter::new(BufWriter::new(file), config.output_format, &config.run_tag);
    for rows in &results {
        writer.write_all(rows)?;
    }
    let rows = writer.rows();
    writer.finish()?;

    let empty_topics = results.iter().filter(|rows| rows.is_empty()).count();
    info!(
        "wrote {rows} rows for {} topics to {}",
        topics.len(),
        config.output.display()
    );
    Ok(RetrievalReport {
        output: config.output.clone(),
        model: config.model,
        topics: topics.len(),
        empty_topics,
        rows,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

fn prepare_output(output: &Path) -> Result<()> {
    if ensure_file(output)? {
        debug!("created empty run file {}", output.display());
    }
    Ok(())
}
