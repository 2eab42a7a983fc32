//! Pipeline configuration.
//!
//! A [`PipelineConfig`] carries every path and option of every stage. It is
//! usually built from a [`Preset`] and optionally overlaid with a JSON file:
//!
//! ```json
//! {
//!   "preset": "baseline",
//!   "root": "/data/experiments",
//!   "retrieval": { "hits": 100, "model": { "type": "bm25", "k1": 1.4, "b": 0.5 } }
//! }
//! ```
//!
//! Keys missing from the file keep the preset value; `preset` defaults to
//! `leaderboard`. Relative paths are resolved against `root`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::acquisition::AcquisitionConfig;
use crate::error::{PipelineError, Result};
use crate::evaluation::EvaluationConfig;
use crate::indexing::IndexingConfig;
use crate::retrieval::{RetrievalConfig, RunFormat, ScoringModel};
use crate::util::resolve;

/// Built-in configurations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// Tuned BM25 (k1 4.46, b 0.82), 100 hits, MS MARCO run format, evaluated.
    #[default]
    Leaderboard,
    /// Default BM25 (k1 0.9, b 0.4), 1000 hits, TREC run format, not evaluated.
    Baseline,
}

impl Preset {
    pub fn name(self) -> &'static str {
        match self {
            Preset::Leaderboard => "leaderboard",
            Preset::Baseline => "baseline",
        }
    }

    /// The full configuration of this preset.
    pub fn config(self) -> PipelineConfig {
        let mut config = PipelineConfig {
            root: PathBuf::from("."),
            acquisition: AcquisitionConfig::default(),
            indexing: IndexingConfig::default(),
            retrieval: RetrievalConfig::default(),
            evaluation: EvaluationConfig::default(),
            sweep: SweepGrid::default(),
        };

        match self {
            Preset::Leaderboard => {
                config.retrieval.model = ScoringModel::bm25(4.46, 0.82);
                config.retrieval.hits = 100;
                config.retrieval.output_format = RunFormat::Msmarco;
                config.retrieval.output =
                    PathBuf::from("data/runs/run.msmarco-doc.leaderboard-dev.bm25base.txt");
                config.evaluation.enabled = true;
            }
            Preset::Baseline => {
                config.retrieval.model = ScoringModel::default();
                config.retrieval.hits = 1000;
                config.retrieval.output_format = RunFormat::Trec;
                config.retrieval.output = PathBuf::from("data/runs/run.msmarco-doc.dev.bm25.txt");
                config.evaluation.enabled = false;
            }
        }
        config
    }
}

/// Grid of BM25 parameters tried by a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepGrid {
    pub k1: Vec<f32>,
    pub b: Vec<f32>,
}

impl Default for SweepGrid {
    fn default() -> Self {
        SweepGrid {
            k1: vec![0.9, 1.2, 1.4, 1.6, 2.0, 2.5, 3.0, 3.5, 4.0],
            b: vec![0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8],
        }
    }
}

impl SweepGrid {
    /// Every `(k1, b)` pair, k1-major.
    pub fn pairs(&self) -> Vec<(f32, f32)> {
        self.k1
            .iter()
            .flat_map(|&k1| self.b.iter().map(move |&b| (k1, b)))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.k1.is_empty() || self.b.is_empty() {
            return Err(PipelineError::invalid_config(
                "sweep grid needs at least one k1 and one b value",
            ));
        }
        for (k1, b) in self.pairs() {
            ScoringModel::bm25(k1, b).validate()?;
        }
        Ok(())
    }
}

/// Configuration of the whole pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory relative paths are resolved against.
    pub root: PathBuf,
    pub acquisition: AcquisitionConfig,
    pub indexing: IndexingConfig,
    pub retrieval: RetrievalConfig,
    pub evaluation: EvaluationConfig,
    pub sweep: SweepGrid,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Preset::default().config()
    }
}

impl PipelineConfig {
    /// Load a configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PipelineError::missing(path));
        }
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Parse a configuration, filling missing keys from its preset.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut overlay: Value = serde_json::from_str(json)?;
        let preset = match overlay.as_object_mut().and_then(|o| o.remove("preset")) {
            Some(value) => serde_json::from_value(value)?,
            None => Preset::default(),
        };

        let mut merged = serde_json::to_value(preset.config())?;
        merge(&mut merged, overlay);
        Ok(serde_json::from_value(merged)?)
    }

    /// Serialize to JSON.
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        Ok(if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        })
    }

    /// A copy with every relative path joined onto `root`.
    pub fn resolved(&self) -> PipelineConfig {
        let root = &self.root;
        let mut config = self.clone();

        config.acquisition.collection_dir = resolve(root, &self.acquisition.collection_dir);
        config.indexing.index_path = resolve(root, &self.indexing.index_path);
        config.retrieval.topics = self
            .retrieval
            .topics
            .iter()
            .map(|topic| resolve(root, topic))
            .collect();
        config.retrieval.output = resolve(root, &self.retrieval.output);
        config.evaluation.script = resolve(root, &self.evaluation.script);
        config.evaluation.judgments = resolve(root, &self.evaluation.judgments);
        config
    }

    /// Validate every stage.
    pub fn validate(&self) -> Result<()> {
        self.acquisition.validate()?;
        self.indexing.validate()?;
        self.retrieval.validate()?;
        self.sweep.validate()
    }
}

// Objects merge key by key, except tagged ones (`"type"`), which replace.
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) if !overlay.contains_key("type") => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
