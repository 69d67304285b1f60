//! Student store
//!
//! The single owner of the loaded record set. Status and summary changes go
//! through the field-level operations below; each one publishes a
//! [`StudentEvent`] so a renderer can follow progress as it happens.

use serde::Serialize;
use sdk::errors::EngineError;
use sdk::{StudentRecord, StudentStatus};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

/// Channel buffer size for store events
const CHANNEL_BUFFER_SIZE: usize = 100;

/// Store shared between the session, the orchestrator and its tools
pub type SharedStore = Arc<RwLock<StudentStore>>;

/// Changes published by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudentEvent {
    /// A new file was ingested
    RecordsReplaced { count: usize },
    /// The active file was cleared
    RecordsCleared,
    StatusChanged { id: String, status: StudentStatus },
    SummaryUpdated { id: String },
}

/// Minimal view of a student sent to the model each turn
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StudentSnapshot {
    pub id: String,
    pub name: String,
    pub status: StudentStatus,
}

pub struct StudentStore {
    records: Vec<StudentRecord>,
    events: broadcast::Sender<StudentEvent>,
}

impl StudentStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(CHANNEL_BUFFER_SIZE);
        Self {
            records: Vec::new(),
            events,
        }
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }

    /// Receive every change published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<StudentEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: StudentEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Install a freshly ingested record set, discarding the previous one
    pub fn replace_all(&mut self, records: Vec<StudentRecord>) {
        debug!("Replacing {} records with {}", self.records.len(), records.len());
        self.records = records;
        self.publish(StudentEvent::RecordsReplaced {
            count: self.records.len(),
        });
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.publish(StudentEvent::RecordsCleared);
    }

    pub fn records(&self) -> &[StudentRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn get(&self, id: &str) -> Option<&StudentRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Look a student up by id, falling back to a case-insensitive name match
    pub fn find(&self, id_or_name: &str) -> Option<&StudentRecord> {
        let needle = id_or_name.trim();
        self.get(needle).or_else(|| {
            self.records
                .iter()
                .find(|r| r.name.eq_ignore_ascii_case(needle))
        })
    }

    pub fn snapshot(&self) -> Vec<StudentSnapshot> {
        self.records
            .iter()
            .map(|r| StudentSnapshot {
                id: r.id.clone(),
                name: r.name.clone(),
                status: r.status,
            })
            .collect()
    }

    /// First student that has not been processed yet
    pub fn next_idle(&self) -> Option<&StudentRecord> {
        self.records
            .iter()
            .find(|r| r.status == StudentStatus::Idle)
    }

    /// (completed, total)
    pub fn progress(&self) -> (usize, usize) {
        let completed = self
            .records
            .iter()
            .filter(|r| r.status == StudentStatus::Completed)
            .count();
        (completed, self.records.len())
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut StudentRecord, EngineError> {
        self.records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| EngineError::UnknownStudent(id.to_string()))
    }

    fn set_status(&mut self, id: &str, status: StudentStatus) -> Result<(), EngineError> {
        self.get_mut(id)?.status = status;
        self.publish(StudentEvent::StatusChanged {
            id: id.to_string(),
            status,
        });
        Ok(())
    }

    /// Mark a student as generating and return a copy of its record.
    ///
    /// Refused while the student is already generating.
    pub fn begin_generation(&mut self, id: &str) -> Result<StudentRecord, EngineError> {
        let record = self.get_mut(id)?;
        if !record.status.can_begin_generation() {
            return Err(EngineError::InvalidTransition {
                id: id.to_string(),
                from: record.status.to_string(),
                to: StudentStatus::Generating.to_string(),
            });
        }
        let snapshot = record.clone();
        self.set_status(id, StudentStatus::Generating)?;
        Ok(StudentRecord {
            status: StudentStatus::Generating,
            ..snapshot
        })
    }

    /// Store a generated summary and complete a running generation
    pub fn finish_generation(&mut self, id: &str, summary: String) -> Result<(), EngineError> {
        self.expect_generating(id, StudentStatus::Completed)?;
        self.get_mut(id)?.generated_summary = summary;
        self.publish(StudentEvent::SummaryUpdated { id: id.to_string() });
        self.set_status(id, StudentStatus::Completed)
    }

    /// Record that a running generation failed
    pub fn fail_generation(&mut self, id: &str) -> Result<(), EngineError> {
        self.expect_generating(id, StudentStatus::Error)?;
        self.set_status(id, StudentStatus::Error)
    }

    /// Overwrite a summary; the student is completed whatever its prior status
    pub fn update_summary(&mut self, id: &str, summary: String) -> Result<(), EngineError> {
        self.get_mut(id)?.generated_summary = summary;
        self.publish(StudentEvent::SummaryUpdated { id: id.to_string() });
        self.set_status(id, StudentStatus::Completed)
    }

    fn expect_generating(&mut self, id: &str, to: StudentStatus) -> Result<(), EngineError> {
        let record = self.get_mut(id)?;
        if record.status != StudentStatus::Generating {
            return Err(EngineError::InvalidTransition {
                id: id.to_string(),
                from: record.status.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }
}

impl Default for StudentStore {
    fn default() -> Self {
        Self::new()
    }
}
