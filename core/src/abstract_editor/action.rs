//! Editable targets and reversible editor actions.
//!
//! This module defines the core abstractions for the undo/redo history:
//!
//! - [`Editable`]: marker trait for types that can be edited
//! - [`EditAction`]: a reversible edit operation (Command pattern)
//! - [`EditActionError`] / [`EditActionResult`]: error handling for actions
//!
//! EditActions are self-contained: each implementation internally stores whatever
//! data it needs (field path, old/new values, etc.).

use std::fmt;

use crate::error::FieldError;

/// Marker trait for types that serve as editing targets.
///
/// Implement this on any type that actions can operate on. The loaded root
/// entity (`Box<dyn XdatEntity>`) is the target used by the editor session.
///
/// # Example
///
/// ```ignore
/// struct MyRecord { /* ... */ }
/// impl Editable for MyRecord {}
/// ```
pub trait Editable: 'static {}

/// Error type for action execution failures.
#[derive(Debug, Clone, PartialEq)]
pub enum EditActionError {
    /// The history cursor is at the start; there is nothing to revert.
    NothingToUndo,
    /// The history cursor is at the end; there is nothing to re-apply.
    NothingToRedo,
    /// The field targeted by the action could not be read or written.
    Field(FieldError),
    /// The target is in an invalid state for this action.
    InvalidState(String),
}

impl fmt::Display for EditActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NothingToUndo => write!(f, "nothing to undo"),
            Self::NothingToRedo => write!(f, "nothing to redo"),
            Self::Field(err) => write!(f, "{err}"),
            Self::InvalidState(msg) => write!(f, "invalid state: {msg}"),
        }
    }
}

impl std::error::Error for EditActionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Field(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FieldError> for EditActionError {
    fn from(err: FieldError) -> Self {
        Self::Field(err)
    }
}

/// Result type for action operations.
pub type EditActionResult<T = ()> = Result<T, EditActionError>;

/// A reversible editor action (Command pattern).
///
/// An action captures enough state to re-apply and revert exactly one change.
/// It must be self-contained: applying it must not depend on anything except
/// the target it is given, so that replaying a history prefix from the same
/// initial state always reproduces the same result.
///
/// # Object Safety
///
/// This trait is dyn-compatible so that different action types can be stored
/// in a single [`EditActionHistory`](super::EditActionHistory) as
/// `Box<dyn EditAction<T>>`.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug)]
/// struct SetCount {
///     old: i64,
///     new: i64,
/// }
///
/// impl EditAction<Counter> for SetCount {
///     fn apply(&mut self, target: &mut Counter) -> EditActionResult {
///         target.count = self.new;
///         Ok(())
///     }
///
///     fn revert(&mut self, target: &mut Counter) -> EditActionResult {
///         target.count = self.old;
///         Ok(())
///     }
///
///     fn description(&self) -> &str {
///         "Set count"
///     }
/// }
/// ```
pub trait EditAction<T: Editable>: fmt::Debug + Send {
    /// Applies the action to the target (forward / redo direction).
    fn apply(&mut self, target: &mut T) -> EditActionResult;

    /// Reverses the action (undo direction).
    ///
    /// Must restore the target to the state before [`apply`](Self::apply)
    /// was called.
    fn revert(&mut self, target: &mut T) -> EditActionResult;

    /// A short, human-readable description for display in the edit menu.
    fn description(&self) -> &str;
}
