//! Criterion context
//!
//! Turns the operator's units into the ordered content parts that precede
//! every report prompt and every chat exchange. PDF reference files travel as
//! inline attachments, anything else is decoded as text. A reference file that
//! cannot be read becomes a placeholder line; building never fails.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sdk::errors::EngineError;
use sdk::{CriterionConfig, CriterionKey, ReferenceFile, Unit};
use tracing::{debug, warn};

use crate::llm::ContentPart;

/// Characters of a text reference file kept in the prompt
pub const MAX_REFERENCE_CHARS: usize = 50_000;

/// Marker appended to text cut at [`MAX_REFERENCE_CHARS`]
pub const TRUNCATION_MARKER: &str = "...(truncated)";

/// Fragment emitted when no unit exists
pub const NO_CONTEXT: &str = "No specific Unit/Criterion context provided.";

/// Build the context parts for `units`, in unit order then A, B, C, D.
pub async fn build_unit_context(units: &[Unit]) -> Vec<ContentPart> {
    if units.is_empty() {
        return vec![ContentPart::text(NO_CONTEXT)];
    }

    let mut parts = vec![ContentPart::text(
        "ACADEMIC UNIT CONTEXT (The Course Material):",
    )];

    for unit in units {
        parts.push(ContentPart::text(format!(
            "=== Unit: {} ===",
            unit.display_title()
        )));

        for (key, criterion) in unit.criteria.iter() {
            push_criterion(&mut parts, key, criterion).await;
        }
    }

    debug!(
        "Built unit context with {} parts for {} units",
        parts.len(),
        units.len()
    );
    parts
}

async fn push_criterion(parts: &mut Vec<ContentPart>, key: CriterionKey, criterion: &CriterionConfig) {
    if !criterion.enabled {
        parts.push(ContentPart::text(format!(
            "Criterion {}: N/A (Not assessed in this unit)",
            key
        )));
        return;
    }

    let notes = if criterion.notes.trim().is_empty() {
        "None"
    } else {
        criterion.notes.as_str()
    };
    parts.push(ContentPart::text(format!(
        "Criterion {key} Configuration (Task details for {key}):\n  - Teacher Notes: {notes}"
    )));

    let Some(file) = &criterion.reference_file else {
        parts.push(ContentPart::text(
            "  - Task Clarification File Content: No file uploaded",
        ));
        return;
    };

    if file.is_page_document() {
        parts.push(ContentPart::text(format!(
            "  - Task Clarification File for Criterion {} is attached below (PDF).",
            key
        )));
        match read_reference(file).await {
            Ok(bytes) => parts.push(ContentPart::inline_data(
                file.mime_type.clone(),
                STANDARD.encode(bytes),
            )),
            Err(e) => {
                warn!("{}", e);
                parts.push(ContentPart::text(format!(
                    "  - [Error reading PDF file: {}]",
                    file.name
                )));
            }
        }
    } else {
        let content = match read_reference(file).await {
            Ok(bytes) => truncate_reference(&String::from_utf8_lossy(&bytes)),
            Err(e) => {
                warn!("{}", e);
                format!("[Attached File: {} - (Could not read content)]", file.name)
            }
        };
        parts.push(ContentPart::text(format!(
            "  - Task Clarification File Content: {}",
            content
        )));
    }
}

async fn read_reference(file: &ReferenceFile) -> Result<Vec<u8>, EngineError> {
    tokio::fs::read(&file.path)
        .await
        .map_err(|e| EngineError::ContextRead {
            path: file.path.display().to_string(),
            reason: e.to_string(),
        })
}

/// Keep the first [`MAX_REFERENCE_CHARS`] characters, marking the cut.
pub fn truncate_reference(content: &str) -> String {
    match content.char_indices().nth(MAX_REFERENCE_CHARS) {
        Some((cut, _)) => format!("{}{}", &content[..cut], TRUNCATION_MARKER),
        None => content.to_string(),
    }
}
