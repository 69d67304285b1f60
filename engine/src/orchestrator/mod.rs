pub mod core;
pub mod tools;
pub mod transcript;

pub use self::core::{ExchangeState, Orchestrator, ACTION_COMPLETED, APOLOGY};
pub use tools::{declarations, ToolRegistry, STUDENT_NOT_FOUND, SUMMARY_UPDATED};
pub use transcript::{ConversationTurn, Transcript, TurnRole};
