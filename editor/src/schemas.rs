//! Built-in entity classes and the default version table.
//!
//! Both classes describe the client's interface definition file: a list of
//! UI windows. Later clients added per-window transparency, anchoring and
//! scaling, plus a shared texture list.

use std::path::Path;

use xdat_core::entity::{FieldDef, FieldType, RecordEntity, Schema, XdatEntity};
use xdat_core::registry::{EntityClasses, TableReport, VersionRegistry};

/// Version table compiled into the binary.
pub const DEFAULT_VERSION_TABLE: &str = include_str!("../assets/versions.csv");

pub const INTERLUDE_CLASS: &str = "xdat.interlude.Interface";
pub const GRACIA_CLASS: &str = "xdat.gracia.Interface";

static INTERLUDE_WINDOW: [FieldDef; 6] = [
    FieldDef::new("name", FieldType::Str),
    FieldDef::new("x", FieldType::Int),
    FieldDef::new("y", FieldType::Int),
    FieldDef::new("width", FieldType::UInt),
    FieldDef::new("height", FieldType::UInt),
    FieldDef::new("visible", FieldType::Bool),
];
static INTERLUDE_WINDOW_TYPE: FieldType = FieldType::Struct(&INTERLUDE_WINDOW);

pub static INTERLUDE: Schema = Schema {
    class_name: INTERLUDE_CLASS,
    fields: &[FieldDef::new(
        "windows",
        FieldType::Array(&INTERLUDE_WINDOW_TYPE),
    )],
};

static ANCHOR: [FieldDef; 3] = [
    FieldDef::new("parent", FieldType::Str),
    FieldDef::new("offset_x", FieldType::Int),
    FieldDef::new("offset_y", FieldType::Int),
];

static GRACIA_WINDOW: [FieldDef; 9] = [
    FieldDef::new("name", FieldType::Str),
    FieldDef::new("x", FieldType::Int),
    FieldDef::new("y", FieldType::Int),
    FieldDef::new("width", FieldType::UInt),
    FieldDef::new("height", FieldType::UInt),
    FieldDef::new("visible", FieldType::Bool),
    FieldDef::new("alpha", FieldType::UByte),
    FieldDef::new("anchor", FieldType::Struct(&ANCHOR)),
    FieldDef::new("scale", FieldType::Float),
];
static GRACIA_WINDOW_TYPE: FieldType = FieldType::Struct(&GRACIA_WINDOW);

pub static GRACIA: Schema = Schema {
    class_name: GRACIA_CLASS,
    fields: &[
        FieldDef::new("textures", FieldType::Array(&FieldType::Str)),
        FieldDef::new("windows", FieldType::Array(&GRACIA_WINDOW_TYPE)),
    ],
};

fn interlude() -> Box<dyn XdatEntity> {
    Box::new(RecordEntity::new(&INTERLUDE))
}

fn gracia() -> Box<dyn XdatEntity> {
    Box::new(RecordEntity::new(&GRACIA))
}

/// Catalog of every entity class this binary can instantiate.
pub fn builtin_classes() -> EntityClasses {
    let mut classes = EntityClasses::new();
    classes.register(INTERLUDE_CLASS, interlude);
    classes.register(GRACIA_CLASS, gracia);
    classes
}

/// Builds the version registry from the embedded table, then layers an
/// optional external table on top of it.
///
/// Rows of the external table shadow embedded rows with the same label. An
/// external table that cannot be read leaves the embedded versions in place.
pub fn build_registry(external: Option<&Path>) -> (VersionRegistry, TableReport) {
    let mut registry = VersionRegistry::new(builtin_classes());
    let mut report = registry.load_table(DEFAULT_VERSION_TABLE);

    if let Some(path) = external {
        log::info!("Loading version table {}", path.display());
        let extra = registry.load_table_file(path);
        report.registered += extra.registered;
        report.warnings.extend(extra.warnings);
    }

    (registry, report)
}
