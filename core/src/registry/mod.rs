//! Version registry: maps human-readable schema version labels to the
//! factory of the root entity class that version uses.
//!
//! Populated once at startup from a version table (see [`table`]) and
//! read-only afterwards. Labels keep their registration order, which is
//! the order the user sees them in.

mod catalog;
pub mod table;

use std::fmt;
use std::path::Path;

use crate::entity::{EntityFactory, XdatEntity};
use crate::error::{RegistryError, TableError};

pub use catalog::EntityClasses;
pub use table::VersionRow;

/// One registered schema version.
#[derive(Clone)]
pub struct VersionEntry {
    label: String,
    class_name: String,
    factory: EntityFactory,
}

impl VersionEntry {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn factory(&self) -> EntityFactory {
        self.factory
    }

    /// Creates a fresh, empty root entity for this version.
    pub fn create(&self) -> Box<dyn XdatEntity> {
        (self.factory)()
    }
}

impl fmt::Debug for VersionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionEntry")
            .field("label", &self.label)
            .field("class_name", &self.class_name)
            .finish()
    }
}

/// Outcome of loading a version table.
///
/// Bad rows never abort the load; each one is kept here so the caller can
/// surface it.
#[derive(Debug, Default)]
pub struct TableReport {
    /// Number of rows that produced a registration.
    pub registered: usize,
    pub warnings: Vec<TableError>,
}

impl TableReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Ordered mapping from version label to root entity factory.
#[derive(Debug, Default)]
pub struct VersionRegistry {
    classes: EntityClasses,
    entries: Vec<VersionEntry>,
}

impl VersionRegistry {
    /// Creates a registry that resolves class identifiers against `classes`.
    pub fn new(classes: EntityClasses) -> Self {
        Self {
            classes,
            entries: Vec::new(),
        }
    }

    /// Registers `label` with the class named `class_name`.
    ///
    /// Re-registering a label replaces its factory but keeps its original
    /// position in [`labels`](Self::labels).
    pub fn register(&mut self, label: &str, class_name: &str) -> Result<(), RegistryError> {
        let factory = self
            .classes
            .get(class_name)
            .ok_or_else(|| RegistryError::UnknownClass(class_name.to_owned()))?;
        self.register_factory(label, class_name, factory);
        Ok(())
    }

    /// Registers `label` with an explicit factory, bypassing the class catalog.
    pub fn register_factory(&mut self, label: &str, class_name: &str, factory: EntityFactory) {
        let entry = VersionEntry {
            label: label.to_owned(),
            class_name: class_name.to_owned(),
            factory,
        };
        if let Some(existing) = self.entries.iter_mut().find(|e| e.label == label) {
            log::debug!(
                "Version '{label}' re-registered: {} -> {class_name}",
                existing.class_name
            );
            *existing = entry;
        } else {
            log::debug!("Registered version '{label}' -> {class_name}");
            self.entries.push(entry);
        }
    }

    /// Looks up the entry registered under `label`.
    pub fn resolve(&self, label: &str) -> Result<&VersionEntry, RegistryError> {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .ok_or_else(|| RegistryError::UnknownVersion(label.to_owned()))
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.iter().any(|e| e.label == label)
    }

    /// Entries in registration order.
    pub fn entries(&self) -> &[VersionEntry] {
        &self.entries
    }

    /// Labels in registration order.
    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|e| e.label.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registers every valid row of a version table.
    ///
    /// Malformed rows and rows naming an unknown class are skipped, logged
    /// at warn level and reported; the remaining rows still register.
    pub fn load_table(&mut self, text: &str) -> TableReport {
        let mut report = TableReport::default();

        for row in table::parse_rows(text) {
            let outcome = row.and_then(|row| {
                self.register(&row.label, &row.class_name)
                    .map_err(|_| TableError::UnknownClass {
                        line: row.line,
                        class: row.class_name,
                    })
            });
            match outcome {
                Ok(()) => report.registered += 1,
                Err(err) => {
                    log::warn!("Skipping version table row: {err}");
                    report.warnings.push(err);
                }
            }
        }

        log::info!(
            "Version table loaded: {} registered, {} skipped",
            report.registered,
            report.warnings.len()
        );
        report
    }

    /// Reads and registers a version table file.
    ///
    /// A file that cannot be read leaves the registry unchanged and is
    /// reported as a single warning.
    pub fn load_table_file(&mut self, path: impl AsRef<Path>) -> TableReport {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => self.load_table(&text),
            Err(err) => {
                log::warn!("Failed to read version table {}: {err}", path.display());
                TableReport {
                    registered: 0,
                    warnings: vec![TableError::Io(err)],
                }
            }
        }
    }
}
