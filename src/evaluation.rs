//! Out-of-process evaluation.
//!
//! The evaluation script is run as
//! `<interpreter> <script> --judgments <judgments> --run <run>`. Its exit
//! status and output are reported back verbatim; nothing is parsed.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Configuration for the evaluation stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Run the stage at all.
    pub enabled: bool,

    /// Program used to run the script.
    pub interpreter: PathBuf,

    /// Evaluation script.
    pub script: PathBuf,

    /// Relevance judgments.
    pub judgments: PathBuf,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        EvaluationConfig {
            enabled: true,
            interpreter: PathBuf::from("python"),
            script: PathBuf::from("tools/scripts/msmarco/msmarco_doc_eval.py"),
            judgments: PathBuf::from("data/topics-and-qrels/qrels.msmarco-doc.dev.txt"),
        }
    }
}

/// Outcome of the evaluation stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Program and arguments as launched.
    pub command: Vec<String>,

    /// Exit code, if the process exited normally.
    pub status: Option<i32>,

    /// Whether the process reported success.
    pub success: bool,

    /// Captured standard output.
    pub stdout: String,

    /// Captured standard error.
    pub stderr: String,

    /// Time spent waiting for the process.
    pub duration_ms: u64,
}

impl EvaluationReport {
    /// Print the standard output block followed by the standard error block.
    pub fn write_streams<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(self.stdout.as_bytes())?;
        if !self.stdout.is_empty() && !self.stdout.ends_with('\n') {
            writeln!(out)?;
        }
        out.write_all(self.stderr.as_bytes())?;
        if !self.stderr.is_empty() && !self.stderr.ends_with('\n') {
            writeln!(out)?;
        }
        Ok(())
    }
}

/// Build the evaluation command for `run`.
pub fn evaluation_command(config: &EvaluationConfig, run: &Path) -> Command {
    let mut command = Command::new(&config.interpreter);
    command
        .arg(&config.script)
        .arg("--judgments")
        .arg(&config.judgments)
        .arg("--run")
        .arg(run);
    command
}

/// Run the evaluation script on `run` and wait for it to exit.
pub fn evaluate(config: &EvaluationConfig, run: &Path) -> Result<EvaluationReport> {
    if !run.is_file() {
        return Err(PipelineError::missing(run));
    }

    let mut command = evaluation_command(config, run);
    let program = config.interpreter.display().to_string();
    let mut line = vec![program.clone()];
    line.extend(command.get_args().map(|arg| arg.to_string_lossy().into_owned()));

    info!("evaluating {} with {}", run.display(), line.join(" "));
    let start = Instant::now();
    let output = command
        .output()
        .map_err(|source| PipelineError::Evaluation { program, source })?;

    let report = EvaluationReport {
        command: line,
        status: output.status.code(),
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        duration_ms: start.elapsed().as_millis() as u64,
    };
    if !report.success {
        warn!("evaluation exited with {}", output.status);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn shell_config(dir: &Path, body: &str) -> EvaluationConfig {
        let script = dir.join("eval.sh");
        fs::write(&script, body).unwrap();
        EvaluationConfig {
            enabled: true,
            interpreter: PathBuf::from("sh"),
            script,
            judgments: dir.join("qrels.txt"),
        }
    }

    #[test]
    fn test_command_arguments() {
        let config = EvaluationConfig::default();
        let command = evaluation_command(&config, Path::new("runs/run.txt"));
        let args: Vec<_> = command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(command.get_program(), "python");
        assert_eq!(
            args,
            vec![
                "tools/scripts/msmarco/msmarco_doc_eval.py",
                "--judgments",
                "data/topics-and-qrels/qrels.msmarco-doc.dev.txt",
                "--run",
                "runs/run.txt",
            ]
        );
    }

    #[test]
    fn test_streams_are_captured() {
        let dir = tempfile::tempdir().unwrap();
        let run = dir.path().join("run.txt");
        fs::write(&run, "1 Q0 D1 1 1.0 tag\n").unwrap();
        let config = shell_config(dir.path(), "echo \"args: $*\"\necho 'MRR @100: 0.5' >&2\n");

        let report = evaluate(&config, &run).unwrap();
        assert!(report.success);
        assert_eq!(report.status, Some(0));
        assert!(report.stdout.contains("--judgments"));
        assert!(report.stdout.contains(&format!("--run {}", run.display())));
        assert_eq!(report.stderr, "MRR @100: 0.5\n");

        let mut printed = Vec::new();
        report.write_streams(&mut printed).unwrap();
        let printed = String::from_utf8(printed).unwrap();
        assert!(printed.starts_with("args: "));
        assert!(printed.ends_with("MRR @100: 0.5\n"));
    }

    #[test]
    fn test_failing_script_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let run = dir.path().join("run.txt");
        fs::write(&run, "").unwrap();
        let config = shell_config(dir.path(), "echo broken >&2\nexit 3\n");

        let report = evaluate(&config, &run).unwrap();
        assert!(!report.success);
        assert_eq!(report.status, Some(3));
        assert_eq!(report.stderr, "broken\n");
    }

    #[test]
    fn test_missing_interpreter() {
        let dir = tempfile::tempdir().unwrap();
        let run = dir.path().join("run.txt");
        fs::write(&run, "").unwrap();
        let config = EvaluationConfig {
            interpreter: dir.path().join("no-such-interpreter"),
            ..EvaluationConfig::default()
        };

        let err = evaluate(&config, &run).unwrap_err();
        assert!(matches!(err, PipelineError::Evaluation { .. }));
    }

    #[test]
    fn test_missing_run_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = evaluate(&EvaluationConfig::default(), &dir.path().join("run.txt")).unwrap_err();
        assert!(matches!(err, PipelineError::MissingArtifact(_)));
    }
}
