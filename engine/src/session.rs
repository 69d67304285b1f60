//! Session
//!
//! Ties the pieces together for one operator: the loaded file, the student
//! store, the unit registry and the conversation. Every operator action in
//! the CLI goes through here.

use sdk::errors::EngineError;
use sdk::{InterviewDetails, StudentRecord};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::composer::ReportComposer;
use crate::ingest;
use crate::llm::LLMProvider;
use crate::orchestrator::{ConversationTurn, Orchestrator, ToolRegistry, Transcript};
use crate::store::{SharedStore, StudentEvent, StudentStore};
use crate::units::{SharedUnits, UnitRegistry};

pub struct Session {
    store: SharedStore,
    units: SharedUnits,
    composer: Arc<ReportComposer>,
    orchestrator: Orchestrator,
    active_file: Option<String>,
}

impl Session {
    pub fn new(provider: Arc<dyn LLMProvider>, units: UnitRegistry, timeout: Duration) -> Self {
        let store = StudentStore::new().into_shared();
        let units = units.into_shared();
        let composer = Arc::new(ReportComposer::new(provider.clone(), timeout));
        let tools = ToolRegistry::new(store.clone(), units.clone(), composer.clone());
        let orchestrator = Orchestrator::new(provider, tools, store.clone(), units.clone(), timeout);

        Self {
            store,
            units,
            composer,
            orchestrator,
            active_file: None,
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn units(&self) -> &SharedUnits {
        &self.units
    }

    pub fn active_file(&self) -> Option<&str> {
        self.active_file.as_deref()
    }

    pub fn transcript(&self) -> &Transcript {
        self.orchestrator.transcript()
    }

    pub async fn subscribe(&self) -> broadcast::Receiver<StudentEvent> {
        self.store.read().await.subscribe()
    }

    /// Ingest a sheet, replacing the current records, and greet the operator.
    ///
    /// On a parse failure nothing changes.
    pub async fn load_file(&mut self, path: &Path) -> Result<usize, EngineError> {
        let records = ingest::parse_file(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let intro = introduction(&records, &file_name);
        let count = records.len();
        self.store.write().await.replace_all(records);
        self.active_file = Some(file_name);
        self.orchestrator.announce(intro);

        info!("Loaded {} students", count);
        Ok(count)
    }

    /// Drop the records, the file and the conversation. Units stay.
    pub async fn clear_file(&mut self) {
        self.store.write().await.clear();
        self.active_file = None;
        self.orchestrator.clear();
    }

    /// Regenerate one student's report without interview answers.
    pub async fn regenerate(&self, student_id: &str) -> Result<String, EngineError> {
        let record = self.store.write().await.begin_generation(student_id)?;
        let units = self.units.read().await.units().to_vec();

        let outcome = self
            .composer
            .try_compose(&record, &InterviewDetails::default(), &units)
            .await;

        let mut store = self.store.write().await;
        match outcome {
            Ok(summary) => {
                store.finish_generation(&record.id, summary.clone())?;
                Ok(summary)
            }
            Err(e) => {
                error!("Regeneration for {} failed: {}", record.name, e);
                store.fail_generation(&record.id)?;
                Err(e)
            }
        }
    }

    /// Run one conversation turn
    pub async fn send(&mut self, message: &str) -> ConversationTurn {
        self.orchestrator.handle_message(message).await.clone()
    }

    /// (completed, total)
    pub async fn progress(&self) -> (usize, usize) {
        self.store.read().await.progress()
    }
}

fn introduction(records: &[StudentRecord], file_name: &str) -> String {
    match records.first() {
        Some(first) => format!(
            "I've loaded {} students from {}. Shall we start with the first student, {}? \
             I'll need to ask you a few questions about their behaviour and progress first.",
            records.len(),
            file_name,
            first.name
        ),
        None => "I've loaded the file but found no students. Please check the format.".to_string(),
    }
}
