//! Error taxonomy shared by the registry, the entity codecs and the executor.

use std::any::Any;
use std::error::Error;

/// Errors raised while decoding bytes into a root entity.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("unexpected end of data at offset {offset}: needed {needed} more bytes")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("{remaining} trailing bytes after offset {offset}")]
    TrailingBytes { offset: usize, remaining: usize },

    #[error("invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("invalid boolean byte {value:#04x} at offset {offset}")]
    InvalidBool { offset: usize, value: u8 },

    #[error("array count {count} at offset {offset} exceeds the remaining input")]
    ImplausibleCount { offset: usize, count: usize },

    #[error("{0}")]
    Custom(String),
}

/// Errors raised while encoding a root entity back into bytes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    #[error("field '{path}' expected {expected}, found {found}")]
    ShapeMismatch {
        path: String,
        expected: String,
        found: String,
    },

    #[error("field '{path}' value {value} does not fit in {target}")]
    OutOfRange {
        path: String,
        value: String,
        target: &'static str,
    },

    #[error("field '{path}' is too long to encode ({len} elements)")]
    TooLong { path: String, len: usize },
}

/// Errors raised by field access and field edits.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldError {
    #[error("invalid field path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("type mismatch for field '{path}': expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: String,
        found: String,
    },
}

/// Errors raised by the version registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown version '{0}'")]
    UnknownVersion(String),

    #[error("unknown entity class '{0}'")]
    UnknownClass(String),
}

/// Errors raised while reading the version table.
///
/// Row-level variants carry the 1-based line number of the offending row.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("line {line}: unknown entity class '{class}'")]
    UnknownClass { line: usize, class: String },

    #[error("failed to read version table: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised when submitting work to the task executor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    #[error("task executor has been shut down")]
    ShutDown,
}

/// Opaque wrapper for any failure raised inside a submitted task.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("{0}")]
    Failed(Box<dyn Error + Send + Sync>),

    #[error("task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Wraps an arbitrary error.
    pub fn new<E>(err: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        Self::Failed(err.into())
    }

    /// Returns the wrapped error as `E` if that is its concrete type.
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        match self {
            Self::Failed(err) => err.downcast_ref::<E>(),
            Self::Panicked(_) => None,
        }
    }

    /// Takes the wrapped error out as `E` if that is its concrete type.
    pub fn downcast<E>(self) -> Result<E, Self>
    where
        E: Error + Send + Sync + 'static,
    {
        match self {
            Self::Failed(err) => err.downcast::<E>().map(|e| *e).map_err(Self::Failed),
            other => Err(other),
        }
    }

    /// Builds a task error from a caught panic payload.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_owned()
        };
        Self::Panicked(message)
    }
}

impl From<DecodeError> for TaskError {
    fn from(err: DecodeError) -> Self {
        Self::new(err)
    }
}

impl From<EncodeError> for TaskError {
    fn from(err: EncodeError) -> Self {
        Self::new(err)
    }
}

impl From<std::io::Error> for TaskError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err)
    }
}
