//! # coreir
//!
//! A retrieval experiment pipeline built on tantivy.
//!
//! The pipeline runs four stages in order:
//!
//! 1. [`acquisition`] downloads the compressed document collection once.
//! 2. [`indexing`] builds an index over it unless one already exists.
//! 3. [`retrieval`] ranks the documents for every topic with BM25 and writes
//!    a run file.
//! 4. [`evaluation`] hands the run file and the relevance judgments to an
//!    external evaluation script and surfaces its output.
//!
//! ```no_run
//! use coreir::config::Preset;
//! use coreir::pipeline::Pipeline;
//!
//! let pipeline = Pipeline::new(Preset::Leaderboard.config()).unwrap();
//! let report = pipeline.run().unwrap();
//! println!("{} rows written", report.retrieval.rows);
//! ```

pub mod acquisition;
pub mod analysis;
pub mod cli;
pub mod collection;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod indexing;
pub mod pipeline;
pub mod retrieval;
pub mod util;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
