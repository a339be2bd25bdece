use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort a partition run.
#[derive(Debug, Error)]
pub enum PartitionError {
    #[error("source file not found: {0}")]
    SourceMissing(PathBuf),
    #[error("no data rows found in {0}")]
    EmptyDataset(PathBuf),
    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("failed to read workbook {path}: {source}")]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Failures while fetching metadata or a partition fragment.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("request for {resource} failed with status {status}")]
    Status { resource: String, status: u16 },
    #[error("request for {resource} failed: {source}")]
    Transport {
        resource: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("invalid JSON in {resource}: {source}")]
    Decode {
        resource: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound(_))
    }
}
