//! Spreadsheet Ingestion
//!
//! Turns loosely structured grade sheets into normalized student records.
//! Nothing about the sheet is known up front: the header row may be missing
//! or preceded by title rows, columns come in any order, and numeric and
//! free-text cells are mixed. The schema is inferred heuristically:
//!
//! 1. Header row: the first of the first 10 rows with a text cell mentioning
//!    "name" or "student"; row 0 otherwise.
//! 2. Name column: the first header matching "student name", "name" or
//!    "student"; column 0 otherwise.
//! 3. Every later row with a non-blank name becomes one record. All other
//!    non-blank cells are rendered as "header: value" context, and numeric
//!    cells under score-like headers (or valued 1-8) feed the average score.
//!
//! Extraction is a pure function of the cell grid, so the same bytes always
//! produce the same records apart from their generated ids.

pub mod workbook;

pub use workbook::{parse_bytes, parse_file, SourceFormat};

use regex::Regex;
use sdk::StudentRecord;
use std::fmt;
use std::sync::OnceLock;
use tracing::debug;

/// Number of leading rows scanned for a header
const HEADER_SCAN_ROWS: usize = 10;

/// Inclusive range of values that count as scores regardless of header
const SCORE_SCALE: (f64, f64) = (1.0, 8.0);

/// Exclusive lower / inclusive upper bound of values that enter the average
const AVERAGE_BAND: (f64, f64) = (0.0, 10.0);

/// One spreadsheet cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    /// Absent or empty cells carry no information and are skipped.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(text) => text.is_empty(),
            _ => false,
        }
    }

    /// Finite numeric value of the cell; booleans never count.
    ///
    /// Text is read by its leading number, so "6/8" is 6 and "7 (late)" is 7.
    pub fn as_number(&self) -> Option<f64> {
        let value = match self {
            Cell::Number(n) => *n,
            Cell::Text(text) => leading_number(text)?,
            Cell::Empty | Cell::Bool(_) => return None,
        };
        value.is_finite().then_some(value)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(text) => write!(f, "{}", text),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for Cell {
    fn from(text: &str) -> Self {
        Cell::Text(text.to_string())
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::Number(n as f64)
    }
}

/// Longest numeric prefix of `text`, after leading whitespace
fn leading_number(text: &str) -> Option<f64> {
    let prefix = numeric_prefix_pattern().find(text.trim_start())?;
    prefix.as_str().parse::<f64>().ok()
}

fn numeric_prefix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?")
            .expect("Invalid numeric prefix pattern")
    })
}

fn header_row_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)name|student").expect("Invalid header row pattern"))
}

fn name_column_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)student\s*name|name|student").expect("Invalid name column pattern")
    })
}

fn score_keyword_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"score|grade|mark|criterion|crit|total|sum").expect("Invalid score pattern")
    })
}

fn short_label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9]{1,3}$").expect("Invalid short label pattern"))
}

/// Index of the header row.
///
/// Only text cells are considered. Falls back to row 0 when nothing in the
/// scan window looks like a header, even if row 0 is real data.
pub fn detect_header_row(rows: &[Vec<Cell>]) -> usize {
    rows.iter()
        .take(HEADER_SCAN_ROWS)
        .position(|row| {
            row.iter().any(|cell| match cell {
                Cell::Text(text) => header_row_pattern().is_match(text),
                _ => false,
            })
        })
        .unwrap_or(0)
}

/// Index of the name column among the normalized headers, column 0 if none match.
pub fn detect_name_column(headers: &[String]) -> usize {
    headers
        .iter()
        .position(|h| name_column_pattern().is_match(h))
        .unwrap_or(0)
}

/// Whether a column label looks like it holds a numeric grade.
///
/// Short labels such as "A" or "Q1" count, as do grading keywords. Anything
/// mentioning a comment never does.
pub fn is_score_header(header: &str) -> bool {
    let lower = header.to_lowercase();
    if lower.contains("comment") {
        return false;
    }
    score_keyword_pattern().is_match(&lower) || short_label_pattern().is_match(&lower)
}

/// Running score average for one student
#[derive(Debug, Default)]
struct ScoreTally {
    total: f64,
    count: u32,
}

impl ScoreTally {
    fn add(&mut self, value: f64) {
        if value > AVERAGE_BAND.0 && value <= AVERAGE_BAND.1 {
            self.total += value;
            self.count += 1;
        }
    }

    fn rounded(&self) -> i64 {
        if self.count == 0 {
            0
        } else {
            (self.total / self.count as f64).round() as i64
        }
    }
}

/// Extract student records from a grid of cells.
///
/// Output keeps the row order of the sheet. An empty grid yields no records.
pub fn extract_records(rows: &[Vec<Cell>]) -> Vec<StudentRecord> {
    if rows.is_empty() {
        return Vec::new();
    }

    let header_index = detect_header_row(rows);
    let headers: Vec<String> = rows[header_index]
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();
    let name_index = detect_name_column(&headers);

    debug!(
        "Header row {} with {} columns, name column {}",
        header_index,
        headers.len(),
        name_index
    );

    let mut students = Vec::new();

    for row in rows.iter().skip(header_index + 1) {
        if row.iter().all(Cell::is_blank) {
            continue;
        }

        let name = match row.get(name_index) {
            Some(cell) if !cell.is_blank() => cell.to_string().trim().to_string(),
            _ => continue,
        };
        if name.is_empty() {
            continue;
        }

        let mut tally = ScoreTally::default();
        let mut context = Vec::new();

        for (column, cell) in row.iter().enumerate() {
            if column == name_index || cell.is_blank() {
                continue;
            }

            let header = match headers.get(column) {
                Some(h) if !h.is_empty() => h.clone(),
                _ => format!("Column {}", column),
            };

            match cell.as_number() {
                Some(value)
                    if is_score_header(&header)
                        || (SCORE_SCALE.0..=SCORE_SCALE.1).contains(&value) =>
                {
                    tally.add(value);
                    context.push(format!("{}: {}", header, value));
                }
                _ => context.push(format!("{}: {}", header, cell)),
            }
        }

        students.push(StudentRecord::new(name, tally.rounded(), context));
    }

    debug!("Extracted {} students", students.len());
    students
}
