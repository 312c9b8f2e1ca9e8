use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Process-level failures. Each one aborts the benchmarking phase.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("binary not found or not executable: {0}")]
    BinaryNotFound(PathBuf),
    #[error("failed to launch reference node: {stderr}")]
    LaunchFailed { stderr: String },
    #[error("reference node launched but did not answer within {waited:?}")]
    Unresponsive { waited: Duration },
    #[error("scratch directory error: {0}")]
    Scratch(#[source] io::Error),
}

/// Failure of a single workload. Sibling workloads still run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkloadError {
    #[error("{0}")]
    Setup(String),
    #[error("no valid measurements for {operation}")]
    EmptyMeasurement { operation: String },
}

impl WorkloadError {
    pub fn setup<T: Into<String>>(msg: T) -> Self {
        WorkloadError::Setup(msg.into())
    }
}

/// Failures loading or writing report files.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("results directory not found: {0}")]
    MissingDirectory(PathBuf),
    #[error("file not found: {0}")]
    MissingFile(PathBuf),
    #[error("no benchmark results found in {0}")]
    NoBenchmarks(PathBuf),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ReportError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ReportError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        ReportError::Json {
            path: path.into(),
            source,
        }
    }
}
