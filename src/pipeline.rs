//! The experiment driver.
//!
//! Runs acquisition, indexing, retrieval and evaluation in that order on the
//! calling thread. A failing stage stops the run; nothing later is attempted.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::acquisition::{AcquisitionReport, acquire};
use crate::config::{PipelineConfig, SweepGrid};
use crate::error::Result;
use crate::evaluation::{EvaluationReport, evaluate};
use crate::indexing::{IndexReport, build_index};
use crate::retrieval::{
    RetrievalReport, ScoringModel, TopicSearcher, read_topics, retrieve, retrieve_with,
};

/// Reports of a full pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    pub acquisition: AcquisitionReport,
    pub indexing: IndexReport,
    pub retrieval: RetrievalReport,
    /// Absent when evaluation is disabled.
    pub evaluation: Option<EvaluationReport>,
}

/// One point of a parameter sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepOutcome {
    pub k1: f32,
    pub b: f32,
    pub retrieval: RetrievalReport,
    pub evaluation: Option<EvaluationReport>,
}

/// Reports of a parameter sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    pub outcomes: Vec<SweepOutcome>,
}

/// Run file of one sweep point: `<stem>.k1-<k1>.b-<b>.<ext>` next to `output`.
pub fn sweep_output(output: &Path, k1: f32, b: f32) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "run".to_string());
    let name = match output.extension() {
        Some(ext) => format!("{stem}.k1-{k1}.b-{b}.{}", ext.to_string_lossy()),
        None => format!("{stem}.k1-{k1}.b-{b}"),
    };
    output.with_file_name(name)
}

/// A configured pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Validate `config` and resolve its paths against its root.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Pipeline {
            config: config.resolved(),
        })
    }

    /// The resolved configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn acquire(&self) -> Result<AcquisitionReport> {
        info!("stage 1/4: acquisition");
        acquire(&self.config.acquisition)
    }

    pub fn index(&self) -> Result<IndexReport> {
        info!("stage 2/4: indexing");
        build_index(&self.config.acquisition.collection_dir, &self.config.indexing)
    }

    pub fn retrieve(&self) -> Result<RetrievalReport> {
        info!("stage 3/4: retrieval");
        retrieve(&self.config.indexing.index_path, &self.config.retrieval)
    }

    /// Evaluate `run`, regardless of whether evaluation is enabled.
    pub fn evaluate_run(&self, run: &Path) -> Result<EvaluationReport> {
        info!("stage 4/4: evaluation");
        evaluate(&self.config.evaluation, run)
    }

    /// Run every stage in order.
    pub fn run(&self) -> Result<PipelineReport> {
        let started = Utc::now();

        let acquisition = self.acquire()?;
        let indexing = self.index()?;
        let retrieval = self.retrieve()?;
        let evaluation = if self.config.evaluation.enabled {
            Some(self.evaluate_run(&retrieval.output)?)
        } else {
            info!("evaluation disabled");
            None
        };

        let finished = Utc::now();
        info!(
            "pipeline finished in {:.1}s",
            (finished - started).num_milliseconds() as f64 / 1000.0
        );
        Ok(PipelineReport {
            started,
            finished,
            acquisition,
            indexing,
            retrieval,
            evaluation,
        })
    }

    /// Retrieve once per `(k1, b)` pair of `grid` against the existing index,
    /// evaluating each run when `evaluate` is set and evaluation is enabled.
    pub fn sweep(&self, grid: &SweepGrid, evaluate: bool) -> Result<SweepReport> {
        grid.validate()?;
        let started = Utc::now();
        let retrieval = &self.config.retrieval;

        let topics = read_topics(&retrieval.topics, retrieval.topic_format)?;
        let searcher = TopicSearcher::open(&self.config.indexing.index_path)?;

        let pairs = grid.pairs();
        let total = pairs.len();
        let mut outcomes = Vec::with_capacity(total);
        for (i, (k1, b)) in pairs.into_iter().enumerate() {
            info!("sweep {}/{total}: k1={k1} b={b}", i + 1);
            let mut config = retrieval.clone();
            config.model = ScoringModel::bm25(k1, b);
            config.output = sweep_output(&retrieval.output, k1, b);

            let report = retrieve_with(&searcher, &topics, &config)?;
            let evaluation = if evaluate && self.config.evaluation.enabled {
                Some(self.evaluate_run(&report.output)?)
            } else {
                None
            };
            outcomes.push(SweepOutcome {
                k1,
                b,
                retrieval: report,
                evaluation,
            });
        }

        Ok(SweepReport {
            started,
            finished: Utc::now(),
            outcomes,
        })
    }
}
