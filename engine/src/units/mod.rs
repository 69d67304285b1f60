//! Unit and criterion configuration
//!
//! Units are created and edited by the operator, never inferred. The registry
//! outlives any loaded spreadsheet: clearing the active file leaves it intact.

use sdk::errors::EngineError;
use sdk::{CriterionKey, ReferenceFile, Unit};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Registry shared between the session and the report tool
pub type SharedUnits = Arc<RwLock<UnitRegistry>>;

/// Partial update of one criterion; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CriterionUpdate {
    pub enabled: Option<bool>,
    pub notes: Option<String>,
    /// `Some(None)` detaches the current file
    pub reference_file: Option<Option<PathBuf>>,
}

/// Ordered list of units
#[derive(Debug, Clone, Default)]
pub struct UnitRegistry {
    units: Vec<Unit>,
}

impl UnitRegistry {
    pub fn new(units: Vec<Unit>) -> Self {
        Self { units }
    }

    /// Registry with one untitled unit, every criterion enabled
    pub fn with_default_unit() -> Self {
        Self::new(vec![Unit::new()])
    }

    pub fn into_shared(self) -> SharedUnits {
        Arc::new(RwLock::new(self))
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn get(&self, id: &str) -> Option<&Unit> {
        self.units.iter().find(|u| u.id == id)
    }

    /// Id of the unit named by a 1-based position or by its id
    pub fn resolve(&self, reference: &str) -> Option<String> {
        let reference = reference.trim();
        if let Ok(position) = reference.parse::<usize>() {
            return position
                .checked_sub(1)
                .and_then(|i| self.units.get(i))
                .map(|u| u.id.clone());
        }
        self.get(reference).map(|u| u.id.clone())
    }

    /// Append a fresh untitled unit and return its id
    pub fn add_unit(&mut self) -> String {
        let unit = Unit::new();
        let id = unit.id.clone();
        self.units.push(unit);
        debug!("Added unit {}", id);
        id
    }

    /// Remove a unit; returns whether it existed
    pub fn remove_unit(&mut self, id: &str) -> bool {
        let before = self.units.len();
        self.units.retain(|u| u.id != id);
        self.units.len() != before
    }

    pub fn set_title(&mut self, id: &str, title: impl Into<String>) -> Result<(), EngineError> {
        let unit = self.get_mut(id)?;
        unit.title = title.into();
        Ok(())
    }

    pub fn update_criterion(
        &mut self,
        id: &str,
        key: CriterionKey,
        update: CriterionUpdate,
    ) -> Result<(), EngineError> {
        let unit = self.get_mut(id)?;
        let criterion = &mut unit.criteria[key];

        if let Some(enabled) = update.enabled {
            criterion.enabled = enabled;
        }
        if let Some(notes) = update.notes {
            criterion.notes = notes;
        }
        if let Some(file) = update.reference_file {
            criterion.reference_file = file.map(ReferenceFile::from_path);
        }
        Ok(())
    }

    /// Comma-separated unit titles, untitled units included as-is
    pub fn title_summary(&self) -> String {
        self.units
            .iter()
            .map(|u| u.title.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Unit, EngineError> {
        self.units
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| EngineError::Config(format!("Unknown unit: {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_remove() {
        let mut registry = UnitRegistry::default();
        let id = registry.add_unit();
        assert_eq!(registry.units().len(), 1);
        assert!(registry.remove_unit(&id));
        assert!(!registry.remove_unit(&id));
        assert!(registry.units().is_empty());
    }

    #[test]
    fn test_update_criterion() {
        let mut registry = UnitRegistry::with_default_unit();
        let id = registry.units()[0].id.clone();

        registry.set_title(&id, "Poetry").unwrap();
        registry
            .update_criterion(
                &id,
                CriterionKey::B,
                CriterionUpdate {
                    enabled: Some(false),
                    notes: Some("skip this term".to_string()),
                    reference_file: Some(Some(PathBuf::from("b.pdf"))),
                },
            )
            .unwrap();

        let unit = registry.get(&id).unwrap();
        assert_eq!(unit.title, "Poetry");
        let b = &unit.criteria[CriterionKey::B];
        assert!(!b.enabled);
        assert_eq!(b.notes, "skip this term");
        assert!(b.reference_file.as_ref().unwrap().is_page_document());

        registry
            .update_criterion(
                &id,
                CriterionKey::B,
                CriterionUpdate {
                    reference_file: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        let b = &registry.get(&id).unwrap().criteria[CriterionKey::B];
        assert!(b.reference_file.is_none());
        assert_eq!(b.notes, "skip this term");
    }

    #[test]
    fn test_resolve_by_position_or_id() {
        let mut registry = UnitRegistry::new(vec![Unit::with_title("Algebra"), Unit::with_title("Geometry")]);
        let second = registry.units()[1].id.clone();

        assert_eq!(registry.resolve("2").as_deref(), Some(second.as_str()));
        assert_eq!(registry.resolve(&second).as_deref(), Some(second.as_str()));
        assert_eq!(registry.resolve("0"), None);
        assert_eq!(registry.resolve("3"), None);
        assert_eq!(registry.resolve("Algebra"), None);

        let first = registry.units()[0].id.clone();
        registry.remove_unit(&first);
        assert_eq!(registry.resolve("1").as_deref(), Some(second.as_str()));
    }

    #[test]
    fn test_unknown_unit() {
        let mut registry = UnitRegistry::default();
        assert!(registry.set_title("missing", "x").is_err());
    }

    #[test]
    fn test_title_summary() {
        let mut registry = UnitRegistry::new(vec![Unit::with_title("Algebra"), Unit::with_title("Geometry")]);
        assert_eq!(registry.title_summary(), "Algebra, Geometry");
        let id = registry.units()[0].id.clone();
        registry.remove_unit(&id);
        assert_eq!(registry.title_summary(), "Geometry");
    }
}
