//! Infrastructure failures that abort a run.
//!
//! Data-quality problems (missing, invalid or duplicate emails) are never
//! errors; they become CSV rows and gate the migration through
//! [`crate::orchestrator::Outcome::ValidationFailed`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("principal scan failed on page {page}")]
    Scan {
        page: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to write invalid-user report")]
    Report(#[source] anyhow::Error),

    #[error("batch write failed on chunk {chunk}")]
    Batch {
        chunk: usize,
        #[source]
        source: anyhow::Error,
    },
}

impl MigrationError {
    /// Process exit status for this failure. `1` is reserved for
    /// validation failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Scan { .. } => 3,
            Self::Report(_) => 4,
            Self::Batch { .. } => 5,
        }
    }
}
