// src/errors.rs
use std::fmt;
use thiserror::Error;

/// Which staged object a storage failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagedKind {
    Original,
    Results,
}

impl fmt::Display for StagedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StagedKind::Original => write!(f, "original upload"),
            StagedKind::Results => write!(f, "verified results"),
        }
    }
}

/// Failures a verification run can surface to the operator.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no signed-in identity; set VERIFY_USER_ID or pass --user-id")]
    NotAuthenticated,

    #[error("unsupported file type '{extension}'; use CSV, TXT or XLSX")]
    UnsupportedFormat { extension: String },

    #[error("no phone numbers found in the uploaded file")]
    NoCandidatesFound,

    #[error("batch {chunk} of {of} failed: {reason}")]
    ChunkVerificationFailed {
        chunk: usize,
        of: usize,
        reason: String,
    },

    #[error("failed to stage {object}: {reason}")]
    StagingFailed { object: StagedKind, reason: String },

    #[error("verified data exists but the download link could not be issued: {reason}")]
    FinalizeFailed { reason: String },

    #[error("no resumable run found for this identity")]
    NoResumableRun,

    #[error("resumed file does not match the file the run was started with")]
    ResumeMismatch,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PipelineError {
    /// Chunk-level failures are absorbed into the run; every other error ends its phase.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PipelineError::ChunkVerificationFailed { .. })
    }

    /// Errors after which the accumulated result rows are still worth a finalize retry.
    pub fn is_finalize_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::FinalizeFailed { .. }
                | PipelineError::StagingFailed {
                    object: StagedKind::Results,
                    ..
                }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_chunk_failures_are_absorbed() {
        let chunk = PipelineError::ChunkVerificationFailed {
            chunk: 2,
            of: 3,
            reason: "503".to_string(),
        };
        assert!(!chunk.is_fatal());
        assert!(PipelineError::NoCandidatesFound.is_fatal());
        assert!(PipelineError::NotAuthenticated.is_fatal());
        assert_eq!(chunk.to_string(), "batch 2 of 3 failed: 503");
    }

    #[test]
    fn test_finalize_retryable_errors() {
        assert!(PipelineError::FinalizeFailed {
            reason: "timeout".to_string()
        }
        .is_finalize_retryable());
        assert!(PipelineError::StagingFailed {
            object: StagedKind::Results,
            reason: "403".to_string()
        }
        .is_finalize_retryable());
        assert!(!PipelineError::StagingFailed {
            object: StagedKind::Original,
            reason: "403".to_string()
        }
        .is_finalize_retryable());
    }
}
