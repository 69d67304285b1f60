//! Tools the model may call during a conversation
//!
//! Two tools are declared: `updateStudentSummary` and `generateSingleReport`.
//! Dispatch always returns a string for the model, including on failure, so
//! a bad invocation never aborts the turn.

use serde::Deserialize;
use serde_json::json;
use sdk::errors::EngineError;
use sdk::InterviewDetails;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::composer::{ReportComposer, FAILED_SUMMARY};
use crate::llm::ToolDeclaration;
use crate::store::SharedStore;
use crate::units::SharedUnits;

pub const UPDATE_STUDENT_SUMMARY: &str = "updateStudentSummary";
pub const GENERATE_SINGLE_REPORT: &str = "generateSingleReport";

pub const SUMMARY_UPDATED: &str = "Updated student summary successfully.";
pub const STUDENT_NOT_FOUND: &str = "Student not found.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateSummaryArgs {
    student_id: String,
    new_summary: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateReportArgs {
    student_id: String,
    #[serde(flatten)]
    details: InterviewDetails,
}

/// Schemas of the two conversation tools
pub fn declarations() -> Vec<ToolDeclaration> {
    vec![
        ToolDeclaration {
            name: UPDATE_STUDENT_SUMMARY.to_string(),
            description: "Updates the generated summary for a specific student based on user request."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "studentId": {
                        "type": "string",
                        "description": "The unique ID of the student to update."
                    },
                    "newSummary": {
                        "type": "string",
                        "description": "The newly written summary text."
                    }
                },
                "required": ["studentId", "newSummary"]
            }),
        },
        ToolDeclaration {
            name: GENERATE_SINGLE_REPORT.to_string(),
            description: "Generates the term summary. Fails if interview details are missing. \
                          You MUST ask the user for these details before calling this."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "studentId": { "type": "string", "description": "The ID of the student." },
                    "behavior": { "type": "string", "description": "User input on classroom behavior." },
                    "punctuality": { "type": "string", "description": "User input on submission punctuality." },
                    "attitude": { "type": "string", "description": "User input on attitude." },
                    "progress": { "type": "string", "description": "User input on progress." },
                    "extraComments": {
                        "type": "string",
                        "description": "User input on extra personal comments (or 'None')."
                    }
                },
                "required": ["studentId", "behavior", "punctuality", "attitude", "progress", "extraComments"]
            }),
        },
    ]
}

/// Local handlers for the conversation tools
pub struct ToolRegistry {
    store: SharedStore,
    units: SharedUnits,
    composer: Arc<ReportComposer>,
}

impl ToolRegistry {
    pub fn new(store: SharedStore, units: SharedUnits, composer: Arc<ReportComposer>) -> Self {
        Self {
            store,
            units,
            composer,
        }
    }

    /// Dispatch a tool call by name, parsing arguments from JSON.
    ///
    /// Errors are returned as strings so the model can see them and respond.
    pub async fn dispatch(&self, name: &str, arguments_json: &str) -> String {
        debug!("Dispatching tool '{}' with args: {}", name, arguments_json);

        match name {
            UPDATE_STUDENT_SUMMARY => match serde_json::from_str(arguments_json) {
                Ok(args) => self.update_student_summary(args).await,
                Err(e) => format!("ERROR: Invalid arguments for {}: {}", name, e),
            },
            GENERATE_SINGLE_REPORT => match serde_json::from_str(arguments_json) {
                Ok(args) => self.generate_single_report(args).await,
                Err(e) => format!("ERROR: Invalid arguments for {}: {}", name, e),
            },
            _ => {
                warn!("Unknown tool requested: {}", name);
                format!(
                    "ERROR: Unknown tool '{}'. Available tools: {}, {}",
                    name, UPDATE_STUDENT_SUMMARY, GENERATE_SINGLE_REPORT
                )
            }
        }
    }

    async fn update_student_summary(&self, args: UpdateSummaryArgs) -> String {
        let mut store = self.store.write().await;
        match store.update_summary(&args.student_id, args.new_summary) {
            Ok(()) => SUMMARY_UPDATED.to_string(),
            Err(EngineError::UnknownStudent(id)) => {
                warn!("updateStudentSummary for unknown student {}", id);
                STUDENT_NOT_FOUND.to_string()
            }
            Err(e) => format!("ERROR: {}", e),
        }
    }

    async fn generate_single_report(&self, args: GenerateReportArgs) -> String {
        // Store lock is not held across the model call
        let record = match self.store.write().await.begin_generation(&args.student_id) {
            Ok(record) => record,
            Err(EngineError::UnknownStudent(id)) => {
                warn!("generateSingleReport for unknown student {}", id);
                return STUDENT_NOT_FOUND.to_string();
            }
            Err(e) => return format!("ERROR: {}", e),
        };

        let units = self.units.read().await.units().to_vec();
        let outcome = self.composer.try_compose(&record, &args.details, &units).await;

        let mut store = self.store.write().await;
        match outcome {
            Ok(summary) => {
                if let Err(e) = store.finish_generation(&record.id, summary.clone()) {
                    warn!("Generated summary for {} was not stored: {}", record.name, e);
                }
                format!("Generated summary for {}:\n\n{}", record.name, summary)
            }
            Err(e) => {
                error!("Report generation for {} failed: {}", record.name, e);
                if let Err(e) = store.fail_generation(&record.id) {
                    warn!("Could not mark {} as failed: {}", record.name, e);
                }
                format!("{} ({})", FAILED_SUMMARY, e)
            }
        }
    }
}
