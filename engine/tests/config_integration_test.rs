//! Integration tests for configuration management
//!
//! These tests load real files from disk and check validation, defaults and
//! the units handed to a new session.

use std::io::Write;
use tempfile::NamedTempFile;

use sdk::errors::EngineError;
use sdk::CriterionKey;
use termgenius_engine::config::Config;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_full_config_from_file() {
    let file = config_file(
        r#"
[core]
log_level = "debug"

[llm]
timeout_secs = 30

[llm.gemini]
base_url = "http://localhost:8080/v1beta/"
model = "gemini-1.5-pro"

[[units]]
title = "Persuasive Writing"

[units.criteria.A]
notes = "Essay structure and argument"

[units.criteria.D]
enabled = false

[[units]]
title = "Poetry"
"#,
    );

    let config = Config::load_from_path(file.path()).unwrap();
    assert_eq!(config.core.log_level, "debug");
    assert_eq!(config.llm.timeout_secs, 30);
    assert_eq!(config.llm.gemini.base_url, "http://localhost:8080/v1beta");
    assert_eq!(config.llm.gemini.model, "gemini-1.5-pro");

    let units = config.initial_units();
    assert_eq!(units.len(), 2);
    assert_eq!(units[0].title, "Persuasive Writing");
    assert_eq!(units[0].criteria[CriterionKey::A].notes, "Essay structure and argument");
    assert!(!units[0].criteria[CriterionKey::D].enabled);
    assert!(units[1].criteria.iter().all(|(_, c)| c.enabled && c.notes.is_empty()));
    assert_ne!(units[0].id, units[1].id);
}

#[test]
fn test_minimal_config_uses_defaults() {
    let file = config_file("[core]\n[llm]\n");

    let config = Config::load_from_path(file.path()).unwrap();
    assert_eq!(config.core.log_level, "info");
    assert_eq!(config.llm.timeout_secs, 120);
    assert_eq!(
        config.llm.gemini.base_url,
        "https://generativelanguage.googleapis.com/v1beta"
    );
    assert_eq!(config.initial_units().len(), 1);
}

#[test]
fn test_reference_file_kind_from_extension() {
    let file = config_file(
        r#"
[core]
[llm]

[[units]]
title = "Research"

[units.criteria.A]
reference_file = "/srv/units/task.PDF"

[units.criteria.B]
reference_file = "/srv/units/rubric.md"
"#,
    );

    let units = Config::load_from_path(file.path()).unwrap().initial_units();
    let a = units[0].criteria[CriterionKey::A].reference_file.as_ref().unwrap();
    let b = units[0].criteria[CriterionKey::B].reference_file.as_ref().unwrap();
    assert!(a.is_page_document());
    assert_eq!(a.name, "task.PDF");
    assert!(!b.is_page_document());
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = Config::load_from_path(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(EngineError::Config(_))));
}

#[test]
fn test_malformed_toml_is_config_error() {
    let file = config_file("[core\nlog_level = ");
    let result = Config::load_from_path(file.path());
    assert!(matches!(result, Err(EngineError::Config(_))));
}

#[test]
fn test_empty_model_rejected() {
    let file = config_file("[core]\n[llm.gemini]\nmodel = \"  \"\n");
    let result = Config::load_from_path(file.path());
    assert!(matches!(result, Err(EngineError::Config(_))));
}
