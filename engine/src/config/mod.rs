//! Configuration management
//!
//! This module handles loading, validation, and management of the TermGenius
//! configuration. Configuration is stored in TOML format at
//! ~/.termgenius/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: log level
//! - **llm**: call timeout and Gemini provider settings
//! - **units**: operator-defined units with their A-D criteria (optional)
//!
//! # Examples
//!
//! ```toml
//! [core]
//! log_level = "info"
//!
//! [llm]
//! timeout_secs = 120
//!
//! [llm.gemini]
//! model = "gemini-2.0-flash"
//!
//! [[units]]
//! title = "Persuasive Writing"
//!
//! [units.criteria.A]
//! notes = "Essay structure"
//! reference_file = "~/units/essay-task.pdf"
//!
//! [units.criteria.D]
//! enabled = false
//! ```
//!
//! The Gemini API key is never stored here; see [`crate::secrets`].

use sdk::errors::EngineError;
use sdk::{CriterionConfig, CriterionKey, ReferenceFile, Unit};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core settings
    pub core: CoreConfig,

    /// LLM provider configuration
    pub llm: LLMConfig,

    /// Units configured ahead of a session
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub units: Vec<UnitConfig>,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Upper bound for a single model call, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Gemini provider settings
    #[serde(default)]
    pub gemini: GeminiConfig,
}

/// Gemini provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Base URL for Gemini API
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_gemini_model")]
    pub model: String,
    // Note: API key stored in OS keychain or GEMINI_API_KEY, not in config
}

/// One unit as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UnitConfig {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub criteria: CriteriaConfig,
}

/// Criteria A-D of a configured unit
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CriteriaConfig {
    #[serde(default, rename = "A")]
    pub a: CriterionSettings,
    #[serde(default, rename = "B")]
    pub b: CriterionSettings,
    #[serde(default, rename = "C")]
    pub c: CriterionSettings,
    #[serde(default, rename = "D")]
    pub d: CriterionSettings,
}

impl CriteriaConfig {
    fn get(&self, key: CriterionKey) -> &CriterionSettings {
        match key {
            CriterionKey::A => &self.a,
            CriterionKey::B => &self.b,
            CriterionKey::C => &self.c,
            CriterionKey::D => &self.d,
        }
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut CriterionSettings> {
        [&mut self.a, &mut self.b, &mut self.c, &mut self.d].into_iter()
    }
}

/// Settings of one criterion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub notes: String,

    /// Task clarification document (supports ~ expansion)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_file: Option<PathBuf>,
}

impl Default for CriterionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            notes: String::new(),
            reference_file: None,
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_gemini_base_url(),
            model: default_gemini_model(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            gemini: GeminiConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.termgenius/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&contents)
    }

    /// Parse and validate configuration text
    pub fn from_toml(contents: &str) -> Result<Self, EngineError> {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;
        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let mut config = Self::default_config();
        config.validate_and_process()?;

        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Created default config at {}", path.display());
        Ok(config)
    }

    /// Get the default configuration file path (~/.termgenius/config.toml)
    pub fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".termgenius").join("config.toml"))
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            core: CoreConfig {
                log_level: default_log_level(),
            },
            llm: LLMConfig::default(),
            units: Vec::new(),
        }
    }

    /// Units to start a session with.
    ///
    /// Without configured units, one untitled unit with every criterion
    /// enabled is provided so the operator always has somewhere to start.
    pub fn initial_units(&self) -> Vec<Unit> {
        if self.units.is_empty() {
            return vec![Unit::new()];
        }

        self.units
            .iter()
            .map(|uc| {
                let mut unit = Unit::with_title(uc.title.clone());
                for key in CriterionKey::ALL {
                    let settings = uc.criteria.get(key);
                    unit.criteria[key] = CriterionConfig {
                        enabled: settings.enabled,
                        notes: settings.notes.clone(),
                        reference_file: settings.reference_file.as_ref().map(ReferenceFile::from_path),
                    };
                }
                unit
            })
            .collect()
    }

    /// Validate values and expand ~ in reference file paths
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.llm.timeout_secs == 0 {
            return Err(EngineError::Config(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.llm.gemini.base_url.trim().is_empty() || self.llm.gemini.model.trim().is_empty() {
            return Err(EngineError::Config(
                "gemini base_url and model must not be empty".to_string(),
            ));
        }
        self.llm.gemini.base_url = self.llm.gemini.base_url.trim_end_matches('/').to_string();

        for unit in &mut self.units {
            for criterion in unit.criteria.iter_mut() {
                if let Some(path) = &criterion.reference_file {
                    criterion.reference_file = Some(expand_path(path)?);
                }
            }
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_creation() {
        let config = Config::default_config();

        assert_eq!(config.core.log_level, "info");
        assert_eq!(config.llm.timeout_secs, 120);
        assert_eq!(config.llm.gemini.model, "gemini-2.0-flash");
        assert!(config.units.is_empty());
    }

    #[test]
    fn test_default_units_fallback() {
        let units = Config::default_config().initial_units();
        assert_eq!(units.len(), 1);
        assert!(units[0].title.is_empty());
        assert!(units[0].criteria.iter().all(|(_, c)| c.enabled));
    }

    #[test]
    fn test_units_from_toml() {
        let config = Config::from_toml(
            r#"
[core]
log_level = "debug"

[llm]

[[units]]
title = "Poetry"

[units.criteria.A]
notes = "Imagery"
reference_file = "/tmp/poetry-task.pdf"

[units.criteria.C]
enabled = false
"#,
        )
        .unwrap();

        let units = config.initial_units();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].title, "Poetry");
        let a = &units[0].criteria[CriterionKey::A];
        assert_eq!(a.notes, "Imagery");
        assert!(a.reference_file.as_ref().unwrap().is_page_document());
        assert!(!units[0].criteria[CriterionKey::C].enabled);
        assert!(units[0].criteria[CriterionKey::D].enabled);
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let result = Config::from_toml("[core]\nlog_level = \"loud\"\n[llm]\n");
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = Config::from_toml("[core]\n[llm]\ntimeout_secs = 0\n");
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_reference_file_tilde_expanded() {
        let config = Config::from_toml(
            "[core]\n[llm]\n[[units]]\n[units.criteria.B]\nreference_file = \"~/rubric.txt\"\n",
        )
        .unwrap();
        let home = dirs::home_dir().unwrap();
        assert_eq!(
            config.units[0].criteria.b.reference_file,
            Some(home.join("rubric.txt"))
        );
    }

    #[test]
    fn test_expand_path_without_tilde() {
        let path = PathBuf::from("/absolute/path");
        assert_eq!(expand_path(&path).unwrap(), path);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default_config();
        let toml_string = toml::to_string(&config).unwrap();

        let deserialized: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(config.core.log_level, deserialized.core.log_level);
        assert_eq!(config.llm.gemini.base_url, deserialized.llm.gemini.base_url);
    }
}
