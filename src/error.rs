//! Error types for the coreir pipeline.
//!
//! Every stage returns [`Result`], whose error side is [`PipelineError`]. The
//! variants follow the stage boundaries so the driver can tell a transient
//! network hiccup from a broken configuration or a failed library call.
//!
//! # Examples
//!
//! ```
//! use coreir::error::{PipelineError, Result};
//!
//! fn check_hits(hits: usize) -> Result<()> {
//!     if hits == 0 {
//!         return Err(PipelineError::invalid_config("hits must be at least 1"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_hits(0).is_err());
//! ```

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Message used when a working directory cannot be created.
pub const CREATE_DIR_FAILED: &str = "could not create directory/directories";

/// Message used when a placeholder file cannot be created.
pub const CREATE_FILE_FAILED: &str = "could not create file";

/// The main error type for pipeline operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// I/O errors that are not tied to a setup step.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Directory or file setup failures.
    #[error("Filesystem error: {message}: {}", .path.display())]
    Filesystem {
        message: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Connection, status or transfer failures while fetching a resource.
    #[error("Network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A stage input produced by an earlier stage (or supplied externally) is absent.
    #[error("Missing artifact: {}", .0.display())]
    MissingArtifact(PathBuf),

    /// Downloaded or cached content does not match its expected size/checksum.
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Malformed collection records.
    #[error("Collection error: {0}")]
    Collection(String),

    /// Malformed topic files.
    #[error("Topic error: {0}")]
    Topics(String),

    /// Failures reported by the search library.
    #[error("Index error: {0}")]
    Index(#[from] tantivy::TantivyError),

    /// Failures while launching the evaluation process.
    #[error("Evaluation error: could not launch {program}: {source}")]
    Evaluation {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Invalid option values or combinations.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Retrieval worker pool could not be built.
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for operations that may fail with PipelineError.
pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// Create a filesystem error for a directory that could not be created.
    pub fn create_dir(path: impl AsRef<Path>, source: io::Error) -> Self {
        PipelineError::Filesystem {
            message: CREATE_DIR_FAILED.to_string(),
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a filesystem error for a file that could not be created.
    pub fn create_file(path: impl AsRef<Path>, source: io::Error) -> Self {
        PipelineError::Filesystem {
            message: CREATE_FILE_FAILED.to_string(),
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a new network error.
    pub fn network<S: Into<String>>(url: S, source: reqwest::Error) -> Self {
        PipelineError::Network {
            url: url.into(),
            source,
        }
    }

    /// Create a missing artifact error.
    pub fn missing(path: impl AsRef<Path>) -> Self {
        PipelineError::MissingArtifact(path.as_ref().to_path_buf())
    }

    /// Create a new integrity error.
    pub fn integrity<S: Into<String>>(msg: S) -> Self {
        PipelineError::Integrity(msg.into())
    }

    /// Create a new collection error.
    pub fn collection<S: Into<String>>(msg: S) -> Self {
        PipelineError::Collection(msg.into())
    }

    /// Create a new topic error.
    pub fn topics<S: Into<String>>(msg: S) -> Self {
        PipelineError::Topics(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        PipelineError::Config(msg.into())
    }

    /// Whether retrying the failed operation could succeed.
    ///
    /// Only network failures qualify; everything else is deterministic.
    pub fn is_transient(&self) -> bool {
        matches!(self, PipelineError::Network { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = PipelineError::invalid_config("hits must be at least 1");
        assert_eq!(
            error.to_string(),
            "Invalid configuration: hits must be at least 1"
        );

        let error = PipelineError::topics("line 3: missing tab");
        assert_eq!(error.to_string(), "Topic error: line 3: missing tab");

        let error = PipelineError::integrity("expected 10 bytes, got 4");
        assert_eq!(error.to_string(), "Integrity error: expected 10 bytes, got 4");
    }

    #[test]
    fn test_filesystem_errors_carry_fixed_messages() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let error = PipelineError::create_dir("/data/collections", io_error);
        assert_eq!(
            error.to_string(),
            "Filesystem error: could not create directory/directories: /data/collections"
        );

        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let error = PipelineError::create_file("/data/runs/run.txt", io_error);
        assert!(error.to_string().contains(CREATE_FILE_FAILED));

        let error = PipelineError::missing("data/indexes/msmarco");
        assert_eq!(error.to_string(), "Missing artifact: data/indexes/msmarco");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error = PipelineError::from(io_error);

        match error {
            PipelineError::Io(_) => {} // Expected
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_only_network_errors_are_transient() {
        assert!(!PipelineError::invalid_config("x").is_transient());
        assert!(!PipelineError::integrity("x").is_transient());
        assert!(!PipelineError::from(io::Error::other("x")).is_transient());
    }
}
