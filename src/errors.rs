//! Structured error types for the retrieval brain
//!
//! One variant per recoverable failure kind, with machine-readable codes.
//! Optional pipeline stages (web search, graph expansion, embedding) catch
//! and log `External` errors at the integration boundary; required stages
//! propagate only when no output can be produced at all.

use std::fmt;
use std::path::PathBuf;

/// Error kinds surfaced by the brain's public API.
#[derive(Debug)]
pub enum BrainError {
    /// Retrieval requested before `initialize` completed. Recoverable by
    /// waiting.
    NotReady,

    /// Reading or writing persisted state failed. Loads recover by
    /// continuing with in-memory state; saves return this to the caller.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A persisted snapshot failed to parse or was missing fields. The
    /// affected store is reset to empty; the warning is logged.
    CorruptSnapshot {
        path: PathBuf,
        details: String,
    },

    /// An external collaborator (vector index, embedder, web search)
    /// failed. The affected slice of the pipeline degrades; the rest of
    /// the context is still assembled.
    External {
        stage: &'static str,
        source: anyhow::Error,
    },
}

impl BrainError {
    /// Machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotReady => "NOT_READY",
            Self::Io { .. } => "IO_ERROR",
            Self::CorruptSnapshot { .. } => "CORRUPT_SNAPSHOT",
            Self::External { .. } => "EXTERNAL_FAILURE",
        }
    }

    /// Build an `Io` error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a `CorruptSnapshot` error for a store that failed to decode.
    pub fn corrupt(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        Self::CorruptSnapshot {
            path: path.into(),
            details: details.into(),
        }
    }

    /// Build an `External` error tagged with the pipeline stage.
    pub fn external(stage: &'static str, source: anyhow::Error) -> Self {
        Self::External { stage, source }
    }
}

impl fmt::Display for BrainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "brain not initialized yet"),
            Self::Io { path, source } => {
                write!(f, "I/O error on {}: {source}", path.display())
            }
            Self::CorruptSnapshot { path, details } => {
                write!(f, "corrupt snapshot at {}: {details}", path.display())
            }
            Self::External { stage, source } => {
                write!(f, "external failure in {stage}: {source}")
            }
        }
    }
}

impl std::error::Error for BrainError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::External { source, .. } => source.source(),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for BrainError {
    fn from(err: anyhow::Error) -> Self {
        Self::External {
            stage: "internal",
            source: err,
        }
    }
}

/// Type alias for results using `BrainError`.
pub type Result<T> = std::result::Result<T, BrainError>;
