//! TermGenius Engine Library
//!
//! This library provides the core functionality of TermGenius.
//! It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Secret management module
pub mod secrets;

/// Spreadsheet ingestion and schema inference
pub mod ingest;

/// Operator-defined units and criteria
pub mod units;

/// Criterion context assembly
pub mod context;

/// LLM provider abstraction layer
pub mod llm;

/// Per-student report generation
pub mod composer;

/// Shared student record store
pub mod store;

/// Tool-calling conversation loop
pub mod orchestrator;

/// Operator session
pub mod session;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
