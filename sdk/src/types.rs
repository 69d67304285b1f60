//! Shared data model
//!
//! Student records produced by ingestion, the units and criteria an operator
//! configures, and the interview answers collected before a report is written.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::path::{Path, PathBuf};

/// Marker used for interview fields that were not supplied
pub const NOT_AVAILABLE: &str = "N/A";

/// Generation lifecycle of a single student
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    #[default]
    Idle,
    Generating,
    Completed,
    Error,
}

impl StudentStatus {
    /// Whether a generation may start from this status.
    ///
    /// `Generating` is the only status that cannot re-enter generation.
    pub fn can_begin_generation(self) -> bool {
        !matches!(self, StudentStatus::Generating)
    }
}

impl fmt::Display for StudentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StudentStatus::Idle => write!(f, "idle"),
            StudentStatus::Generating => write!(f, "generating"),
            StudentStatus::Completed => write!(f, "completed"),
            StudentStatus::Error => write!(f, "error"),
        }
    }
}

/// One student row extracted from a spreadsheet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudentRecord {
    /// Opaque unique id, generated at ingestion
    pub id: String,

    /// Trimmed, non-empty student name
    pub name: String,

    /// Rounded average of the score signals, 0 when none were found
    pub score: i64,

    /// "label: value" strings for every non-name cell, left to right
    pub raw_context: Vec<String>,

    /// Narrative report, empty until produced
    pub generated_summary: String,

    pub status: StudentStatus,
}

impl StudentRecord {
    /// Create an idle record with a fresh id and no summary
    pub fn new(name: impl Into<String>, score: i64, raw_context: Vec<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            score,
            raw_context,
            generated_summary: String::new(),
            status: StudentStatus::Idle,
        }
    }

    /// Compare every field except the id
    pub fn same_content(&self, other: &StudentRecord) -> bool {
        self.name == other.name
            && self.score == other.score
            && self.raw_context == other.raw_context
            && self.generated_summary == other.generated_summary
            && self.status == other.status
    }
}

/// One of the four fixed assessable dimensions of a unit
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CriterionKey {
    A,
    B,
    C,
    D,
}

impl CriterionKey {
    /// All keys in assessment order
    pub const ALL: [CriterionKey; 4] = [
        CriterionKey::A,
        CriterionKey::B,
        CriterionKey::C,
        CriterionKey::D,
    ];

    fn index(self) -> usize {
        match self {
            CriterionKey::A => 0,
            CriterionKey::B => 1,
            CriterionKey::C => 2,
            CriterionKey::D => 3,
        }
    }
}

impl fmt::Display for CriterionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CriterionKey::A => write!(f, "A"),
            CriterionKey::B => write!(f, "B"),
            CriterionKey::C => write!(f, "C"),
            CriterionKey::D => write!(f, "D"),
        }
    }
}

/// Content type of a PDF reference file
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// A reference document attached to a criterion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferenceFile {
    /// Location of the file on disk
    pub path: PathBuf,

    /// File name shown in placeholders
    pub name: String,

    /// Content type derived from the extension
    pub mime_type: String,
}

impl ReferenceFile {
    /// Describe a file on disk, deriving its content type from the extension
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let mime_type = match extension.as_str() {
            "pdf" => PDF_MIME_TYPE,
            "txt" | "md" | "markdown" | "text" | "csv" | "rtf" => "text/plain",
            "json" => "application/json",
            "html" | "htm" => "text/html",
            _ => "application/octet-stream",
        };

        Self {
            path: path.to_path_buf(),
            name,
            mime_type: mime_type.to_string(),
        }
    }

    /// Page-document formats are attached verbatim instead of decoded as text
    pub fn is_page_document(&self) -> bool {
        self.mime_type == PDF_MIME_TYPE
    }
}

/// Configuration of one criterion within a unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CriterionConfig {
    pub enabled: bool,
    pub reference_file: Option<ReferenceFile>,
    pub notes: String,
}

impl Default for CriterionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reference_file: None,
            notes: String::new(),
        }
    }
}

/// The four criteria of a unit, addressable by key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Criteria([CriterionConfig; 4]);

impl Criteria {
    /// Iterate criteria in A, B, C, D order
    pub fn iter(&self) -> impl Iterator<Item = (CriterionKey, &CriterionConfig)> {
        CriterionKey::ALL.into_iter().map(move |k| (k, &self[k]))
    }
}

impl Index<CriterionKey> for Criteria {
    type Output = CriterionConfig;

    fn index(&self, key: CriterionKey) -> &CriterionConfig {
        &self.0[key.index()]
    }
}

impl IndexMut<CriterionKey> for Criteria {
    fn index_mut(&mut self, key: CriterionKey) -> &mut CriterionConfig {
        &mut self.0[key.index()]
    }
}

/// A named body of coursework with up to four criteria
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Unit {
    pub id: String,

    /// Free text, may be empty
    pub title: String,

    pub criteria: Criteria,
}

impl Unit {
    /// Create an untitled unit with every criterion enabled and empty
    pub fn new() -> Self {
        Self::with_title("")
    }

    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            criteria: Criteria::default(),
        }
    }

    /// Title for display, falling back when none was entered
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "Untitled Unit"
        } else {
            &self.title
        }
    }
}

impl Default for Unit {
    fn default() -> Self {
        Self::new()
    }
}

/// Free-text observations collected from the operator before a report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct InterviewDetails {
    #[serde(default)]
    pub behavior: Option<String>,
    #[serde(default)]
    pub punctuality: Option<String>,
    #[serde(default)]
    pub attitude: Option<String>,
    #[serde(default)]
    pub progress: Option<String>,
    #[serde(default)]
    pub extra_comments: Option<String>,
}

impl InterviewDetails {
    /// The value of a field, or `N/A` when it is absent or blank
    pub fn or_na(field: &Option<String>) -> &str {
        match field.as_deref() {
            Some(value) if !value.trim().is_empty() => value,
            _ => NOT_AVAILABLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_idle() {
        let record = StudentRecord::new("Alice", 7, vec!["Crit A: 7".to_string()]);
        assert_eq!(record.status, StudentStatus::Idle);
        assert!(record.generated_summary.is_empty());
        assert!(!record.id.is_empty());
    }

    #[test]
    fn test_same_content_ignores_id() {
        let a = StudentRecord::new("Bob", 0, vec![]);
        let b = StudentRecord::new("Bob", 0, vec![]);
        assert_ne!(a.id, b.id);
        assert!(a.same_content(&b));
    }

    #[test]
    fn test_generating_cannot_restart() {
        assert!(StudentStatus::Idle.can_begin_generation());
        assert!(StudentStatus::Completed.can_begin_generation());
        assert!(StudentStatus::Error.can_begin_generation());
        assert!(!StudentStatus::Generating.can_begin_generation());
    }

    #[test]
    fn test_reference_file_mime_types() {
        assert!(ReferenceFile::from_path("tasks/essay.PDF").is_page_document());
        let notes = ReferenceFile::from_path("tasks/rubric.txt");
        assert_eq!(notes.mime_type, "text/plain");
        assert_eq!(notes.name, "rubric.txt");
        assert!(!notes.is_page_document());
    }

    #[test]
    fn test_criteria_indexing() {
        let mut unit = Unit::new();
        unit.criteria[CriterionKey::C].enabled = false;
        let enabled: Vec<_> = unit
            .criteria
            .iter()
            .filter(|(_, c)| c.enabled)
            .map(|(k, _)| k)
            .collect();
        assert_eq!(enabled, vec![CriterionKey::A, CriterionKey::B, CriterionKey::D]);
        assert_eq!(unit.display_title(), "Untitled Unit");
    }

    #[test]
    fn test_interview_defaults_to_na() {
        let details = InterviewDetails {
            behavior: Some("Focused".to_string()),
            punctuality: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(InterviewDetails::or_na(&details.behavior), "Focused");
        assert_eq!(InterviewDetails::or_na(&details.punctuality), NOT_AVAILABLE);
        assert_eq!(InterviewDetails::or_na(&details.extra_comments), NOT_AVAILABLE);
    }
}
