//! Error types for omalign.

use thiserror::Error;

/// Errors that can occur while building indices or aligning molecules
#[derive(Debug, Error)]
pub enum AlignError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Invalid molecule: {0}")]
    InvalidMolecule(String),

    #[error("Unknown reference: {0}")]
    UnknownReference(String),

    #[error("Duplicate reference: {0}")]
    DuplicateReference(String),

    /// A vertex group was requested before the vertex score was computed
    #[error("Vertex ({ref_label}, {query_label}) grouped before scoring")]
    UnscoredVertex { ref_label: usize, query_label: usize },

    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

pub type AlignResult<T> = Result<T, AlignError>;
