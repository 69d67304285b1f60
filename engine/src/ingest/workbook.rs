//! Raw sheet readers
//!
//! Reads the first sheet of a workbook (xlsx, xlsm, xlsb, xls, ods) with
//! calamine, or a CSV file with the csv crate, into a grid of [`Cell`]s.

use calamine::{Data, Reader};
use sdk::errors::EngineError;
use sdk::StudentRecord;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info};

use super::{extract_records, Cell};

/// Container format of an uploaded sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Any spreadsheet format calamine detects from the bytes
    Workbook,
    /// Comma-separated text
    Csv,
}

impl SourceFormat {
    /// Pick the reader from the file extension. Anything that is not CSV is
    /// handed to the workbook reader, which sniffs the bytes itself.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .as_deref()
        {
            Some("csv") => SourceFormat::Csv,
            _ => SourceFormat::Workbook,
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::String(s) => Cell::Text(s.clone()),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => Cell::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Error(_) | Data::Empty => Cell::Empty,
        }
    }
}

/// Read the first sheet of a workbook into cells.
pub fn read_workbook(bytes: Vec<u8>) -> Result<Vec<Vec<Cell>>, EngineError> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| EngineError::Parse(e.to_string()))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => range,
        Some(Err(e)) => return Err(EngineError::Parse(e.to_string())),
        None => return Ok(Vec::new()),
    };

    Ok(range
        .rows()
        .map(|row| row.iter().map(Cell::from).collect())
        .collect())
}

/// Read CSV text into cells. Rows may have different lengths.
pub fn read_csv(bytes: &[u8]) -> Result<Vec<Vec<Cell>>, EngineError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| EngineError::Parse(e.to_string()))?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(rows)
}

/// Parse sheet bytes into student records.
///
/// Malformed bytes fail with [`EngineError::Parse`]; nothing is returned in
/// that case. An empty sheet yields an empty list.
pub fn parse_bytes(bytes: Vec<u8>, format: SourceFormat) -> Result<Vec<StudentRecord>, EngineError> {
    let rows = match format {
        SourceFormat::Workbook => read_workbook(bytes)?,
        SourceFormat::Csv => read_csv(&bytes)?,
    };
    debug!("Read {} raw rows ({:?})", rows.len(), format);
    Ok(extract_records(&rows))
}

/// Read and parse a sheet from disk. An unreadable file is a parse failure.
pub async fn parse_file(path: &Path) -> Result<Vec<StudentRecord>, EngineError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| EngineError::Parse(format!("{}: {}", path.display(), e)))?;
    info!("Parsing {} ({} bytes)", path.display(), bytes.len());
    parse_bytes(bytes, SourceFormat::from_path(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn inline(cell: &str, text: &str) -> String {
        format!(r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#, cell, text)
    }

    fn worksheet(rows: &[String]) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{}</sheetData></worksheet>"#,
            rows.concat()
        )
    }

    /// Minimal two-sheet xlsx package; only the first sheet holds grades
    fn grade_workbook() -> Vec<u8> {
        let grades = worksheet(&[
            format!(r#"<row r="1">{}</row>"#, inline("A1", "Class 9B")),
            format!(
                r#"<row r="3">{}{}{}{}</row>"#,
                inline("A3", "Name"),
                inline("B3", "Crit A"),
                inline("C3", "Notes"),
                inline("D3", "Passed")
            ),
            format!(
                r#"<row r="4">{}<c r="B4"><v>7</v></c>{}<c r="D4" t="b"><v>1</v></c></row>"#,
                inline("A4", "Alice"),
                inline("C4", "good")
            ),
            r#"<row r="5"><c r="A5" t="b"><v>1</v></c></row>"#.to_string(),
        ]);
        let other = worksheet(&[
            format!(r#"<row r="1">{}</row>"#, inline("A1", "Student")),
            format!(r#"<row r="2">{}</row>"#, inline("A2", "Nobody")),
        ]);

        let files = [
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/worksheets/sheet2.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#.to_string(),
            ),
            (
                "_rels/.rels",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#.to_string(),
            ),
            (
                "xl/workbook.xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Grades" sheetId="1" r:id="rId1"/><sheet name="Other" sheetId="2" r:id="rId2"/></sheets></workbook>"#.to_string(),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/></Relationships>"#.to_string(),
            ),
            ("xl/worksheets/sheet1.xml", grades),
            ("xl/worksheets/sheet2.xml", other),
        ];

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, contents) in files {
            zip.start_file(name, options).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_workbook_first_sheet_with_header_offset() {
        let rows = read_workbook(grade_workbook()).unwrap();
        assert_eq!(rows[0], vec![Cell::from("Class 9B"), Cell::Empty, Cell::Empty, Cell::Empty]);
        assert_eq!(rows[3][1], Cell::Number(7.0));
        assert_eq!(rows[3][3], Cell::Bool(true));

        let students = parse_bytes(grade_workbook(), SourceFormat::Workbook).unwrap();
        assert_eq!(students.len(), 2);
        assert_eq!(students[0].name, "Alice");
        assert_eq!(students[0].score, 7);
        assert_eq!(
            students[0].raw_context,
            vec!["Crit A: 7", "Notes: good", "Passed: true"]
        );
        // a boolean name cell is rendered as text, like any other value
        assert_eq!(students[1].name, "true");
        assert!(students[1].raw_context.is_empty());
        assert!(students.iter().all(|s| s.name != "Nobody"));
    }

    #[test]
    fn test_calamine_cell_mapping() {
        use calamine::{CellErrorType, ExcelDateTime, ExcelDateTimeType};

        assert_eq!(Cell::from(&Data::Int(3)), Cell::Number(3.0));
        assert_eq!(Cell::from(&Data::Float(6.5)), Cell::Number(6.5));
        assert_eq!(Cell::from(&Data::Bool(false)), Cell::Bool(false));
        assert_eq!(Cell::from(&Data::String("ok".into())), Cell::from("ok"));
        assert_eq!(
            Cell::from(&Data::DateTimeIso("2024-09-01".into())),
            Cell::from("2024-09-01")
        );
        assert_eq!(
            Cell::from(&Data::DateTime(ExcelDateTime::new(
                45536.0,
                ExcelDateTimeType::DateTime,
                false
            ))),
            Cell::Number(45536.0)
        );
        assert_eq!(Cell::from(&Data::Error(CellErrorType::Div0)), Cell::Empty);
        assert_eq!(Cell::from(&Data::Empty), Cell::Empty);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SourceFormat::from_path(Path::new("grades.CSV")), SourceFormat::Csv);
        assert_eq!(SourceFormat::from_path(Path::new("grades.xlsx")), SourceFormat::Workbook);
        assert_eq!(SourceFormat::from_path(Path::new("grades")), SourceFormat::Workbook);
    }

    #[test]
    fn test_csv_scenario() {
        let csv = "Name,Crit A,Notes\nAlice,7,good\n,5,ignored\nBob,,no score\n";
        let students = parse_bytes(csv.as_bytes().to_vec(), SourceFormat::Csv).unwrap();

        assert_eq!(students.len(), 2);
        assert_eq!(students[0].score, 7);
        assert_eq!(students[0].raw_context, vec!["Crit A: 7", "Notes: good"]);
        assert_eq!(students[1].raw_context, vec!["Notes: no score"]);
    }

    #[test]
    fn test_csv_ragged_rows() {
        let csv = "Class 9B\nStudent,A,B\nMia,6\n";
        let rows = read_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].len(), 1);

        let students = parse_bytes(csv.as_bytes().to_vec(), SourceFormat::Csv).unwrap();
        assert_eq!(students[0].raw_context, vec!["A: 6"]);
    }

    #[test]
    fn test_garbage_workbook_is_parse_failure() {
        let result = parse_bytes(b"definitely not a spreadsheet".to_vec(), SourceFormat::Workbook);
        assert!(matches!(result, Err(EngineError::Parse(_))));
    }

    #[test]
    fn test_invalid_utf8_csv_is_parse_failure() {
        let result = parse_bytes(vec![b'N', b'a', 0xff, b'\n', 0xfe], SourceFormat::Csv);
        assert!(matches!(result, Err(EngineError::Parse(_))));
    }

    #[tokio::test]
    async fn test_unreadable_file_is_parse_failure() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.xlsx");

        match parse_file(&missing).await {
            Err(EngineError::Parse(message)) => assert!(message.contains("gone.xlsx")),
            other => panic!("Expected parse failure, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_csv_has_no_students() {
        let students = parse_bytes(Vec::new(), SourceFormat::Csv).unwrap();
        assert!(students.is_empty());
    }
}
