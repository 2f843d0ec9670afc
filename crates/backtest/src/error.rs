use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path} line {line}: {reason}")]
    BadRow { path: PathBuf, line: u64, reason: String },

    #[error("{0} contains no candles")]
    Empty(PathBuf),

    #[error("invalid parameters: {0}")]
    Parameters(&'static str),
}

impl From<BacktestError> for common::Error {
    fn from(e: BacktestError) -> Self {
        match e {
            BacktestError::Parameters(_) => common::Error::Config(e.to_string()),
            other => common::Error::Other(other.to_string()),
        }
    }
}
