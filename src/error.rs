// ⚠️ Pipeline Errors - structural failures only
// Row-level and file-level problems are counted and logged, never raised.

use crate::columns::ColumnRole;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("could not read {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("{context}: could not resolve columns for {roles:?}")]
    UnresolvedColumns {
        context: String,
        roles: Vec<ColumnRole>,
    },

    #[error("registry has no region column; aggregation needs region data")]
    MissingRegion,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
