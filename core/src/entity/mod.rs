//! Root entities: the decoded object graph of one xdat file.
//!
//! Every schema version plugs in through the [`XdatEntity`] capability:
//! decode bytes into the graph, encode it back, and expose its fields as
//! [`Value`]s addressed by [`FieldPath`]s. [`RecordEntity`] implements the
//! capability generically from a static [`Schema`].

mod codec;
mod edit;
mod path;
mod schema;
mod value;

use std::fmt;

use crate::abstract_editor::Editable;
use crate::error::{DecodeError, EncodeError, FieldError};

pub use codec::{ByteReader, ByteWriter};
pub use edit::SetFieldAction;
pub use path::{FieldPath, PathSegment};
pub use schema::{FieldDef, FieldType, RecordEntity, Schema};
pub use value::{Value, ValueKind};

/// Produces an empty instance of one entity class.
pub type EntityFactory = fn() -> Box<dyn XdatEntity>;

/// Decode/encode capability of a root entity plus access to its field graph.
pub trait XdatEntity: fmt::Debug + Send + 'static {
    /// Identifier of the entity class this instance belongs to.
    fn class_name(&self) -> &str;

    /// Replaces the field graph with the one decoded from `bytes`.
    ///
    /// On error the previous graph is left unchanged.
    fn decode(&mut self, bytes: &[u8]) -> Result<(), DecodeError>;

    fn encode(&self) -> Result<Vec<u8>, EncodeError>;

    /// The whole field graph.
    fn root(&self) -> &Value;

    fn get(&self, path: &FieldPath) -> Result<&Value, FieldError> {
        path.resolve(self.root())
    }

    /// Kind of value the field at `path` accepts.
    fn kind_at(&self, path: &FieldPath) -> Result<ValueKind, FieldError> {
        Ok(self.get(path)?.kind())
    }

    /// Replaces the value at `path`, returning the previous one.
    ///
    /// Fails with [`FieldError::InvalidPath`] or [`FieldError::TypeMismatch`]
    /// without touching the graph.
    fn set(&mut self, path: &FieldPath, value: Value) -> Result<Value, FieldError>;

    /// Deep copy, used to hand a snapshot to the background worker.
    fn clone_entity(&self) -> Box<dyn XdatEntity>;
}

impl Editable for Box<dyn XdatEntity> {}
