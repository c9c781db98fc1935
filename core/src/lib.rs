//! # xdat editor core
//!
//! The pieces of the xdat editor that do not depend on any presentation layer:
//!
//! - [`registry`]: maps version labels to entity factories
//! - [`abstract_editor`]: reversible edit actions and the undo/redo history
//! - [`executor`]: single-worker task executor with a presentation-side busy flag
//! - [`entity`]: the root entity capability, field values and the schema-driven record entity

pub mod abstract_editor;
pub mod entity;
pub mod error;
pub mod executor;
pub mod registry;

pub use error::{
    DecodeError, EncodeError, ExecutorError, FieldError, RegistryError, TableError, TaskError,
};

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
