use thiserror::Error;

use crate::core::job::BatchStatus;

#[derive(Error, Debug)]
/// Batch error
pub enum BatchError {
    /// The input resource could not be opened or is no longer readable.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// A row of the input resource could not be turned into an item.
    #[error("Parse error at line {line} ({content:?}): {message}")]
    Parse {
        line: u64,
        content: String,
        message: String,
    },

    #[error("ItemProcessor from: {0}")]
    ItemProcessor(String),

    #[error("ItemWriter from: {0}")]
    ItemWriter(String),

    /// Invalid chunk size, mapping or statement. Raised before anything is read.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Step failed: {0}")]
    Step(String),

    #[error("Illegal status transition from {from:?} to {to:?}")]
    IllegalStatusTransition { from: BatchStatus, to: BatchStatus },
}

impl BatchError {
    /// Whether a skip policy may tolerate this error for a single item.
    pub fn is_skippable(&self) -> bool {
        matches!(self, BatchError::Parse { .. } | BatchError::ItemProcessor(_))
    }
}
