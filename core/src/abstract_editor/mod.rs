//! Abstract editor framework for reversible editing operations.
//!
//! This module provides the traits and types for an undo/redo-capable
//! editor. It is decoupled from the concrete entity types so the editor
//! session can record any field-level change against any loaded schema.
//!
//! - [`Editable`]: marker trait for types that can be edited
//! - [`EditAction`]: an edit operation (Command pattern)
//! - [`EditActionHistory`]: linear undo/redo sequence with a cursor
//!
//! [`EditActionHistory::record`] stores an action whose mutation the caller
//! already performed and discards any redo tail.

mod action;
mod history;

pub use action::{EditAction, EditActionError, EditActionResult, Editable};
pub use history::EditActionHistory;
