//! Report composition
//!
//! One stateless generation call per student: a prompt built from the record
//! and the interview answers, followed by the criterion context parts.

use sdk::errors::EngineError;
use sdk::{InterviewDetails, StudentRecord, Unit};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

use crate::context::build_unit_context;
use crate::llm::{ContentPart, LLMProvider};

/// Returned when the model answers with no text
pub const EMPTY_SUMMARY: &str = "Could not generate summary.";

/// Returned by [`ReportComposer::compose`] when the call fails
pub const FAILED_SUMMARY: &str = "Error generating summary.";

const GRADING_SCALE: &str = "\
GRADING SCALE (1-8):
8: Exceptional
7: Excellent
6: Very Good
5: Good
4: Satisfactory
3: Needs Improvement
2: Poor
1: Very Poor";

/// Writes the narrative report for one student.
pub struct ReportComposer {
    provider: Arc<dyn LLMProvider>,
    timeout: Duration,
}

impl ReportComposer {
    pub fn new(provider: Arc<dyn LLMProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Generate a report, folding every failure into [`FAILED_SUMMARY`].
    pub async fn compose(
        &self,
        record: &StudentRecord,
        details: &InterviewDetails,
        units: &[Unit],
    ) -> String {
        match self.try_compose(record, details, units).await {
            Ok(summary) => summary,
            Err(_) => FAILED_SUMMARY.to_string(),
        }
    }

    /// Generate a report, surfacing failures to the caller.
    ///
    /// An empty model answer is not a failure: it yields [`EMPTY_SUMMARY`].
    pub async fn try_compose(
        &self,
        record: &StudentRecord,
        details: &InterviewDetails,
        units: &[Unit],
    ) -> Result<String, EngineError> {
        info!("Generating summary for {} ({})", record.name, record.id);

        let mut parts = vec![ContentPart::text(build_prompt(record, details))];
        parts.extend(build_unit_context(units).await);

        let result = match timeout(self.timeout, self.provider.generate(&parts)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(EngineError::from(e)),
            Err(_) => Err(EngineError::LLMTimeout),
        };

        match result {
            Ok(text) if text.trim().is_empty() => {
                info!("Model returned no text for {}", record.name);
                Ok(EMPTY_SUMMARY.to_string())
            }
            Ok(text) => {
                info!("Generated summary for {}", record.name);
                Ok(text)
            }
            Err(e) => {
                error!("Error generating summary for {}: {}", record.name, e);
                Err(e)
            }
        }
    }
}

/// Build the generation prompt for one student.
pub fn build_prompt(record: &StudentRecord, details: &InterviewDetails) -> String {
    let name = &record.name;
    format!(
        "Role: you are a teacher writing a personal end-of-term report comment for one student.

{GRADING_SCALE}

STUDENT DATA:
- Name: {name}
- Overall Score: {score}
- Assessment data taken from the spreadsheet:
{assessment}

TEACHER INTERVIEW OBSERVATIONS:
- Behaviour: {behavior}
- Punctuality: {punctuality}
- Attitude: {attitude}
- Progress: {progress}
- Extra Comments: {extra}

HOW TO USE THE DATA:
1. Look through the assessment data for per-criterion scores such as \"Criterion A: 6\" or \"Crit B: 5\".
2. Match each criterion score against that criterion's task material in the ACADEMIC UNIT CONTEXT. \
A 7 in a criterion about essay writing means the essay writing was Excellent; describe it using the task's own terms.
3. Where criterion scores are missing, rely on the overall score and the teacher notes.
4. Weave the interview observations into the narrative rather than listing them.

OUTPUT FORMAT (STRICT):
1. Speak to the student directly as \"you\".
2. Begin the text exactly with \"{name},\".
3. Write exactly two paragraphs separated by one blank line.
   Paragraph 1: a synthesized account of performance. Do not walk through the criteria one by one \
and do not quote individual scores. Draw out 2-3 strengths or patterns that run across the criteria \
and fold the behavioural observations in naturally.
   Paragraph 2: a term conclusion that makes sense on its own. Open with an overall judgement of the term, \
state the achievement level without repeating paragraph 1, give 1-2 concrete goals for next term \
and close with personal encouragement.
4. Vary vocabulary and sentence structure from one student to the next, even when their data is similar.

Tone: professional, personal, constructive and encouraging.",
        score = record.score,
        assessment = assessment_lines(record),
        behavior = InterviewDetails::or_na(&details.behavior),
        punctuality = InterviewDetails::or_na(&details.punctuality),
        attitude = InterviewDetails::or_na(&details.attitude),
        progress = InterviewDetails::or_na(&details.progress),
        extra = InterviewDetails::or_na(&details.extra_comments),
    )
}

fn assessment_lines(record: &StudentRecord) -> String {
    if record.raw_context.is_empty() {
        return "  (none)".to_string();
    }
    record
        .raw_context
        .iter()
        .map(|line| format!("  {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}
