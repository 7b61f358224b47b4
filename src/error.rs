use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the ingestion, registry and formula layers.
///
/// Every variant is recoverable: callers get it back as a value and decide
/// how to present it.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The file extension is not one of the recognised formats.
    #[error("unsupported file extension: .{extension}")]
    UnsupportedFormat { extension: String },

    /// A structural marker of the plt format is missing.
    #[error("malformed file {path}: {reason}")]
    MalformedFile { path: PathBuf, reason: String },

    #[error("column `{column}` not found in {path}")]
    UnknownColumn { column: String, path: PathBuf },

    /// A file key that is neither a registered full path nor a short name.
    #[error("no source registered under `{0}`")]
    UnknownSource(String),

    #[error("formula references unknown curve `{0}`")]
    UnknownCurveIdentifier(String),

    /// The formula contains no curve identifier to take its length from.
    #[error("formula does not reference any saved curve")]
    EmptyFormulaAnchor,

    #[error("malformed formula at offset {offset}: {reason}")]
    MalformedFormula { offset: usize, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedFile {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Non-fatal failure while evaluating a formula at one sample index.
/// The sample is dropped from the derived curve.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize)]
pub enum PointError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("curve `{curve}` has no sample at index {index}")]
    MissingSample { curve: String, index: usize },
}

pub type Result<T> = std::result::Result<T, CoreError>;
