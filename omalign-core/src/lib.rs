//! omalign core library
//!
//! Seed indexing, fuzzy segment matching, turn-based extension and graph
//! chaining for aligning optical-map molecules against reference maps.

pub mod chain;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod extend;
pub mod fuzzy;
pub mod mapper;
pub mod post;
pub mod seed;
pub mod types;

// Re-export commonly used types and functions
pub use config::{AlignMode, AlignerParams};
pub use dispatch::{align_all, align_batch, QueryOutcome, WorkerPool};
pub use error::{AlignError, AlignResult};
pub use fuzzy::Tolerance;
pub use mapper::{Mapper, MapperFactory, OpticalMapAligner};
pub use post::{OverlapResolver, PostPipeline, ResultProcessor, ScoreFilter};
pub use types::{
    AlignmentRecord, DataMolecule, EditOp, EditString, ExtensionResult, GenomicInterval,
    GenomicPos, ReferenceSet, Region, RegionSet, Strand,
};

/// Version information for the omalign core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
