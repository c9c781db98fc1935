use super::path::FieldPath;
use super::value::Value;
use super::XdatEntity;
use crate::abstract_editor::{EditAction, EditActionResult};

/// History entry for one field-level change.
///
/// Stores both values so that re-applying and reverting only ever touch
/// the single field at `path`.
#[derive(Debug)]
pub struct SetFieldAction {
    path: FieldPath,
    old: Value,
    new: Value,
    description: String,
}

impl SetFieldAction {
    pub fn new(path: FieldPath, old: Value, new: Value) -> Self {
        let description = format!("Set {path}");
        Self {
            path,
            old,
            new,
            description,
        }
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }
}

impl EditAction<Box<dyn XdatEntity>> for SetFieldAction {
    fn apply(&mut self, target: &mut Box<dyn XdatEntity>) -> EditActionResult {
        target.set(&self.path, self.new.clone())?;
        Ok(())
    }

    fn revert(&mut self, target: &mut Box<dyn XdatEntity>) -> EditActionResult {
        target.set(&self.path, self.old.clone())?;
        Ok(())
    }

    fn description(&self) -> &str {
        &self.description
    }
}
