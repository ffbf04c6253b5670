// error.rs — crate-wide error type
//
// Format errors (stream parsing) and contract errors (bad indices, bad
// wiring) share one enum. Evaluation never fails: anomalies there resolve to
// documented defaults instead of surfacing here.

use thiserror::Error;

/// Errors raised by procedure mutation, stream I/O and graph loading.
#[derive(Debug, Error)]
pub enum ProcError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported procedure format version {0}")]
    UnsupportedVersion(i16),

    #[error("unknown module type: {0}")]
    UnknownModule(String),

    #[error("invalid procedure data: {0}")]
    InvalidFormat(String),

    #[error("{what} index {index} out of bounds (len {len})")]
    IndexOutOfBounds {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("link must run from an output port to an input port")]
    PortDirection,

    #[error("port {port} does not exist on {node}")]
    InvalidPort { node: String, port: usize },

    #[error("link from module {from} to {to} would create a cycle")]
    CycleDetected { from: usize, to: String },

    #[error("output module count mismatch: expected {expected}, found {found}")]
    OutputShapeMismatch { expected: usize, found: usize },

    #[error("expression error: {0}")]
    Expression(String),

    #[error("graph description error: {0}")]
    Graph(String),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, ProcError>;
