//! Error types and handling
//!
//! This module provides the error types used throughout the TermGenius engine.
//! All errors implement the `ErrorExt` trait which provides operator-friendly
//! hints.
//!
//! # Security
//!
//! Error messages never carry API keys. Provider error bodies are scrubbed by
//! the engine before they are wrapped into `Generation`.

use thiserror::Error;

/// Trait for engine error extensions
///
/// Provides a short hint that can be shown to the operator next to the error.
pub trait ErrorExt {
    /// Returns an operator-friendly hint for the error
    fn user_hint(&self) -> &str;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: invalid or missing configuration
/// - **Ingestion**: unreadable or malformed spreadsheet bytes
/// - **Context**: unreadable criterion reference files
/// - **Generation**: language model failures and timeouts
/// - **Students**: unknown ids and refused status transitions
/// - **Secrets**: keychain access
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, ErrorExt};
///
/// let error = EngineError::Parse("not a workbook".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(error.to_string().contains("not a workbook"));
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Ingestion errors
    #[error("Failed to parse spreadsheet: {0}")]
    Parse(String),

    // Criterion context errors
    #[error("Failed to read reference file {path}: {reason}")]
    ContextRead { path: String, reason: String },

    // Generation errors
    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("LLM call timed out")]
    LLMTimeout,

    // Student store errors
    #[error("Student not found: {0}")]
    UnknownStudent(String),

    #[error("Invalid status transition for student {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },

    // Keyring errors
    #[error("Keyring error: {0}")]
    KeyringError(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",
            Self::Parse(_) => {
                "Failed to parse the spreadsheet. Please ensure it follows the correct format"
            }
            Self::ContextRead { .. } => "A reference file could not be read. Check that it exists",
            Self::Generation(_) => "The language model is unavailable. Check your API key and network",
            Self::LLMTimeout => "The language model took too long to respond. Try again",
            Self::UnknownStudent(_) => "No student with that id is loaded",
            Self::InvalidTransition { .. } => "This student is already being generated. Wait for it to finish",
            Self::KeyringError(_) => "Failed to access secure storage. Check system keychain",
            Self::Io(_) => "File system operation failed",
        }
    }
}
