//! TermGenius SDK
//!
//! Shared library providing the error taxonomy and the data model used by
//! the engine and by anything that renders its state.

/// Error types and handling
pub mod errors;

/// Student, unit and interview types
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, ErrorExt};
pub use types::{
    CriterionConfig, CriterionKey, Criteria, InterviewDetails, ReferenceFile, StudentRecord,
    StudentStatus, Unit,
};
