//! Catalog of known entity classes.
//!
//! Stores one factory per class identifier so that the version table can
//! name classes by string without any reflective instantiation.

use std::collections::BTreeMap;
use std::fmt;

use crate::entity::EntityFactory;

/// Registry of instantiable entity classes.
///
/// Register every class the binary knows about during setup; the version
/// registry looks identifiers up here when it reads the version table.
#[derive(Default, Clone)]
pub struct EntityClasses {
    /// Ordered by identifier for consistent listing.
    factories: BTreeMap<String, EntityFactory>,
}

impl EntityClasses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class factory, replacing any previous one with the same identifier.
    pub fn register(&mut self, class_name: impl Into<String>, factory: EntityFactory) {
        let class_name = class_name.into();
        if self.factories.insert(class_name.clone(), factory).is_some() {
            log::debug!("Entity class '{class_name}' registered twice; keeping the latest");
        }
    }

    pub fn get(&self, class_name: &str) -> Option<EntityFactory> {
        self.factories.get(class_name).copied()
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.factories.contains_key(class_name)
    }

    /// Iterate over all registered class identifiers.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.factories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for EntityClasses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{FieldDef, FieldType, RecordEntity, Schema, XdatEntity};

    static EMPTY: Schema = Schema {
        class_name: "test.Empty",
        fields: &[],
    };
    static FLAG: Schema = Schema {
        class_name: "test.Flag",
        fields: &[FieldDef::new("on", FieldType::Bool)],
    };

    fn empty() -> Box<dyn XdatEntity> {
        Box::new(RecordEntity::new(&EMPTY))
    }

    fn flag() -> Box<dyn XdatEntity> {
        Box::new(RecordEntity::new(&FLAG))
    }

    #[test]
    fn register_and_get() {
        let mut classes = EntityClasses::new();
        classes.register("test.Empty", empty);

        let factory = classes.get("test.Empty").unwrap();
        assert_eq!(factory().class_name(), "test.Empty");
        assert!(classes.get("test.Missing").is_none());
        assert!(classes.contains("test.Empty"));
    }

    #[test]
    fn names_are_sorted() {
        let mut classes = EntityClasses::new();
        classes.register("b", flag);
        classes.register("a", empty);
        assert_eq!(classes.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(classes.len(), 2);
    }

    #[test]
    fn reregister_replaces() {
        let mut classes = EntityClasses::new();
        classes.register("x", empty);
        classes.register("x", flag);
        assert_eq!(classes.len(), 1);
        assert_eq!(classes.get("x").unwrap()().class_name(), "test.Flag");
    }
}
