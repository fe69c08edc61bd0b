//! Error types for the presence state layer.

use thiserror::Error;
use tracker_core::{Clock, Dot, ReplicaId};

/// Ways a merge payload can violate the sender's contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("element {dot} is not observed by its own header")]
    UnobservedElement { dot: Dot },

    #[error("dot {dot} lies beyond the sender's clock {bound}")]
    DotBeyondClock { dot: Dot, bound: Clock },

    #[error("delta range is inverted: ({start}, {end}]")]
    InvertedRange { start: Clock, end: Clock },

    #[error("delta header carries a causal context")]
    ContextInDelta,

    #[error("payload claims clock {remote} for replica {replica}, which is only at {local}")]
    NonMonotonicContext {
        replica: ReplicaId,
        local: Clock,
        remote: Clock,
    },
}

/// Errors that can occur in state operations.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Malformed payload from {from}: {source}")]
    MalformedPayload {
        from: ReplicaId,
        #[source]
        source: PayloadError,
    },

    #[error("Cloud union task failed: {0}")]
    UnionTask(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StateError>;
