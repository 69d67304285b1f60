//! Conversation Orchestrator
//!
//! Runs one exchange with the model per operator message:
//!
//! 1. Append the operator message as a user turn
//! 2. Send history, system instructions (with the student status list and
//!    unit context) and the tool declarations to the model
//! 3. If the model calls a tool: run the first call, send its result back
//!    and take the follow-up text as the answer
//! 4. Otherwise use the text directly
//! 5. Append the answer as an assistant turn
//!
//! Any failure in steps 2-4 appends a fixed apology turn instead. The
//! operator must wait for a turn to finish before sending the next message;
//! `handle_message` takes `&mut self`, so one exchange is in flight at a time.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::context::build_unit_context;
use crate::llm::{ChatRequest, ContentPart, LLMProvider, LLMResponse, Message, ToolCall};
use crate::store::SharedStore;
use crate::units::SharedUnits;
use sdk::errors::EngineError;

use super::tools::{declarations, ToolRegistry};
use super::transcript::{ConversationTurn, Transcript, TurnRole};

/// Assistant turn appended when an exchange fails
pub const APOLOGY: &str =
    "Sorry, I encountered an error connecting to the assistant. Please try again.";

/// Assistant turn used when the model answers a tool result without text
pub const ACTION_COMPLETED: &str = "Action completed.";

/// Where the current exchange stands
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeState {
    /// No exchange in flight
    Idle,
    /// First model call sent
    AwaitingModel,
    /// The model asked for a tool; its handler is running
    PendingToolCall(ToolCall),
    /// Tool result sent back, waiting for the final text
    AwaitingFinalAnswer,
}

/// Drives the operator conversation
pub struct Orchestrator {
    provider: Arc<dyn LLMProvider>,
    tools: ToolRegistry,
    store: SharedStore,
    units: SharedUnits,
    transcript: Transcript,
    state: ExchangeState,
    timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        tools: ToolRegistry,
        store: SharedStore,
        units: SharedUnits,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            tools,
            store,
            units,
            transcript: Transcript::new(),
            state: ExchangeState::Idle,
            timeout,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> &ExchangeState {
        &self.state
    }

    /// Append an assistant turn that did not come from the model
    pub fn announce(&mut self, text: impl Into<String>) -> &ConversationTurn {
        self.transcript.append(TurnRole::Assistant, text)
    }

    /// Forget the conversation
    pub fn clear(&mut self) {
        self.transcript.clear();
        self.state = ExchangeState::Idle;
    }

    /// Process one operator message and return the assistant turn it produced.
    pub async fn handle_message(&mut self, text: &str) -> &ConversationTurn {
        let mut messages = self.transcript.to_messages();
        self.transcript.append(TurnRole::User, text);
        messages.push(Message::user(text));

        let answer = match self.exchange(messages).await {
            Ok(answer) => answer,
            Err(e) => {
                error!("Conversation exchange failed: {}", e);
                APOLOGY.to_string()
            }
        };
        self.state = ExchangeState::Idle;

        self.transcript.append(TurnRole::Assistant, answer)
    }

    async fn exchange(&mut self, mut messages: Vec<Message>) -> Result<String> {
        let request = ChatRequest {
            system: self.system_parts().await,
            messages: messages.clone(),
            tools: declarations(),
        };

        self.state = ExchangeState::AwaitingModel;
        let response = self.call(&request).await?;

        let call = match response {
            LLMResponse::FinalAnswer(answer) => return Ok(non_empty(answer.content)),
            LLMResponse::ToolCalls { calls } => {
                let mut calls = calls.into_iter();
                let Some(call) = calls.next() else {
                    return Ok(ACTION_COMPLETED.to_string());
                };
                for ignored in calls {
                    warn!(
                        "Ignoring additional tool call '{}' ({}) in the same response",
                        ignored.name, ignored.id
                    );
                }
                call
            }
        };

        info!("Model called tool {} ({})", call.name, call.id);
        self.state = ExchangeState::PendingToolCall(call.clone());
        let result = self.tools.dispatch(&call.name, &call.arguments).await;
        debug!("Tool {} returned {} bytes", call.name, result.len());

        messages.push(Message::assistant_tool_call(call.clone()));
        messages.push(Message::tool_result(result, &call));

        // Status may have changed during the tool call
        let request = ChatRequest {
            system: self.system_parts().await,
            messages,
            tools: declarations(),
        };

        self.state = ExchangeState::AwaitingFinalAnswer;
        match self.call(&request).await? {
            LLMResponse::FinalAnswer(answer) => Ok(non_empty(answer.content)),
            LLMResponse::ToolCalls { calls } => {
                warn!(
                    "Model answered a tool result with {} more tool call(s); not executed",
                    calls.len()
                );
                Ok(ACTION_COMPLETED.to_string())
            }
        }
    }

    async fn call(&self, request: &ChatRequest) -> Result<LLMResponse> {
        match timeout(self.timeout, self.provider.chat(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(EngineError::from(e).into()),
            Err(_) => {
                error!("LLM call timed out after {}s", self.timeout.as_secs());
                Err(EngineError::LLMTimeout.into())
            }
        }
    }

    async fn system_parts(&self) -> Vec<ContentPart> {
        let (titles, units) = {
            let registry = self.units.read().await;
            (registry.title_summary(), registry.units().to_vec())
        };
        let snapshot = self.store.read().await.snapshot();
        let students = serde_json::to_string(&snapshot).unwrap_or_else(|_| "[]".to_string());

        let mut parts = vec![ContentPart::text(system_instruction(&titles, &students))];
        parts.extend(build_unit_context(&units).await);
        parts
    }
}

fn non_empty(text: String) -> String {
    if text.trim().is_empty() {
        ACTION_COMPLETED.to_string()
    } else {
        text
    }
}

/// Operating rules for the model, with the unit titles and student list
pub fn system_instruction(unit_titles: &str, students_json: &str) -> String {
    let units = if unit_titles.trim().is_empty() {
        "None defined"
    } else {
        unit_titles
    };

    format!(
        "You are a helpful assistant managing a student report card application.

CONTEXT:
The teacher has defined the following Units: {units}.
Detailed context (files/notes) is attached.

OPERATIONAL RULES:
1. Work through the students ONE AT A TIME.
2. When a file has been loaded, propose starting with the first student whose status is 'idle'.
3. MANDATORY INTERVIEW: the 'generateSingleReport' tool needs behavior, punctuality, attitude, progress and extraComments.
4. Never generate a report without them. Ask the user for these details for EVERY student.
5. Ask conversationally, for example: \"What can you tell me about [Name]'s behavior, punctuality and attitude?\"
6. As soon as the user has answered, call 'generateSingleReport'.
7. After generating, show the result and ask whether the user wants to adjust it or move on to the next student. Use 'updateStudentSummary' for adjustments.
8. When the user says \"Next\", pick the next 'idle' student and START THE INTERVIEW AGAIN for that student.

CURRENT STUDENT LIST STATUS:
{students_json}"
    )
}
