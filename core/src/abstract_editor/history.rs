//! Undo/redo action history.
//!
//! [`EditActionHistory`] keeps a single linear sequence of [`EditAction`] trait
//! objects and a cursor into it. Entries before the cursor are applied to the
//! target; entries at or after the cursor are available to redo. Recording a
//! new action after undoing discards the redo tail (standard editor behavior).

use std::fmt;

use super::action::{EditAction, EditActionError, EditActionResult, Editable};

/// Manages an unbounded, linear undo/redo sequence of editor actions.
///
/// Invariant: `0 <= cursor <= entries.len()`.
///
/// # Example
///
/// ```ignore
/// let mut history = EditActionHistory::new();
/// let mut target = MyRecord::new();
///
/// // Mutate the target yourself, then record what you did
/// target.set(3);
/// history.record(Box::new(SetValue { old: 0, new: 3 }));
///
/// history.undo(&mut target).unwrap();
/// history.redo(&mut target).unwrap();
/// ```
pub struct EditActionHistory<T: Editable> {
    entries: Vec<Box<dyn EditAction<T>>>,
    cursor: usize,
    /// Cursor position matching the last saved (or freshly loaded) state.
    ///
    /// `None` when the saved state is no longer reachable, e.g. after the
    /// redo tail containing it was discarded.
    save_point: Option<usize>,
}

impl<T: Editable> EditActionHistory<T> {
    /// Creates a new empty history whose initial state counts as saved.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            save_point: Some(0),
        }
    }

    /// Records an action whose mutation the caller has already performed.
    ///
    /// Discards every entry after the cursor, appends `action` and advances
    /// the cursor past it. [`EditAction::apply`] is **not** called.
    pub fn record(&mut self, action: Box<dyn EditAction<T>>) {
        if self.cursor < self.entries.len() {
            log::debug!(
                "Discarding {} redo entries",
                self.entries.len() - self.cursor
            );
            self.entries.truncate(self.cursor);
            if let Some(point) = self.save_point
                && point > self.cursor
            {
                self.save_point = None;
            }
        }
        self.entries.push(action);
        self.cursor += 1;
    }

    /// Reverts the entry immediately before the cursor.
    ///
    /// Returns [`EditActionError::NothingToUndo`] at the start of the history.
    /// If the revert itself fails, the cursor does not move.
    pub fn undo(&mut self, target: &mut T) -> EditActionResult {
        if self.cursor == 0 {
            return Err(EditActionError::NothingToUndo);
        }
        self.entries[self.cursor - 1].revert(target)?;
        self.cursor -= 1;
        Ok(())
    }

    /// Re-applies the entry at the cursor.
    ///
    /// Returns [`EditActionError::NothingToRedo`] at the end of the history.
    /// If the apply itself fails, the cursor does not move.
    pub fn redo(&mut self, target: &mut T) -> EditActionResult {
        if self.cursor == self.entries.len() {
            return Err(EditActionError::NothingToRedo);
        }
        self.entries[self.cursor].apply(target)?;
        self.cursor += 1;
        Ok(())
    }

    /// Returns `true` if there are actions that can be undone.
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    /// Returns `true` if there are actions that can be redone.
    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    /// Current cursor position.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Total number of recorded entries, applied or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of entries that can be undone.
    pub fn undo_count(&self) -> usize {
        self.cursor
    }

    /// Returns the number of entries that can be redone.
    pub fn redo_count(&self) -> usize {
        self.entries.len() - self.cursor
    }

    /// Returns an iterator over undo descriptions, most recent first.
    pub fn undo_descriptions(&self) -> impl Iterator<Item = &str> {
        self.entries[..self.cursor]
            .iter()
            .rev()
            .map(|a| a.description())
    }

    /// Returns an iterator over redo descriptions, next-to-redo first.
    pub fn redo_descriptions(&self) -> impl Iterator<Item = &str> {
        self.entries[self.cursor..].iter().map(|a| a.description())
    }

    /// Records the current state as the saved state.
    pub fn mark_saved(&mut self) {
        self.save_point = Some(self.cursor);
    }

    /// Records an earlier cursor position as the saved state.
    ///
    /// Used when a save was started from a snapshot taken at `cursor` and
    /// finished after further edits. Ignored if `cursor` is out of range.
    pub fn mark_saved_at(&mut self, cursor: usize) {
        if cursor <= self.entries.len() {
            self.save_point = Some(cursor);
        }
    }

    /// Returns `true` if the current state differs from the last saved state.
    pub fn has_unsaved_changes(&self) -> bool {
        self.save_point != Some(self.cursor)
    }

    /// Drops every entry and resets the cursor to 0.
    ///
    /// The cleared state counts as saved; the editor clears the history
    /// whenever a new root entity is loaded.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
        self.save_point = Some(0);
    }
}

impl<T: Editable> Default for EditActionHistory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Editable> fmt::Debug for EditActionHistory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditActionHistory")
            .field("len", &self.entries.len())
            .field("cursor", &self.cursor)
            .field("save_point", &self.save_point)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        value: i32,
    }

    impl Editable for Counter {}

    #[derive(Debug)]
    struct Add {
        amount: i32,
    }

    impl EditAction<Counter> for Add {
        fn apply(&mut self, target: &mut Counter) -> EditActionResult {
            target.value += self.amount;
            Ok(())
        }

        fn revert(&mut self, target: &mut Counter) -> EditActionResult {
            target.value -= self.amount;
            Ok(())
        }

        fn description(&self) -> &str {
            "Add"
        }
    }

    /// Sets an absolute value; remembers which value it replaced.
    #[derive(Debug)]
    struct SetValue {
        old_value: i32,
        new_value: i32,
        label: &'static str,
    }

    impl EditAction<Counter> for SetValue {
        fn apply(&mut self, target: &mut Counter) -> EditActionResult {
            target.value = self.new_value;
            Ok(())
        }

        fn revert(&mut self, target: &mut Counter) -> EditActionResult {
            target.value = self.old_value;
            Ok(())
        }

        fn description(&self) -> &str {
            self.label
        }
    }

    #[derive(Debug)]
    struct FailingAction;

    impl EditAction<Counter> for FailingAction {
        fn apply(&mut self, _target: &mut Counter) -> EditActionResult {
            Err(EditActionError::InvalidState("always fails".into()))
        }

        fn revert(&mut self, _target: &mut Counter) -> EditActionResult {
            Err(EditActionError::InvalidState("always fails".into()))
        }

        fn description(&self) -> &str {
            "Failing"
        }
    }

    fn set(counter: &mut Counter, new_value: i32, label: &'static str) -> Box<SetValue> {
        let old_value = counter.value;
        counter.value = new_value;
        Box::new(SetValue {
            old_value,
            new_value,
            label,
        })
    }

    #[test]
    fn record_does_not_apply() {
        let mut history = EditActionHistory::new();
        let mut counter = Counter { value: 0 };

        history.record(Box::new(Add { amount: 5 }));

        assert_eq!(counter.value, 0);
        assert_eq!(history.cursor(), 1);
        assert!(history.can_undo());
        history.undo(&mut counter).unwrap();
        assert_eq!(counter.value, -5);
    }

    #[test]
    fn undo_moves_cursor_back() {
        let mut history = EditActionHistory::new();
        let mut counter = Counter { value: 0 };

        history.record(set(&mut counter, 5, "five"));
        history.undo(&mut counter).unwrap();

        assert_eq!(counter.value, 0);
        assert_eq!(history.cursor(), 0);
        assert_eq!(history.len(), 1);
        assert!(!history.can_undo());
        assert!(history.can_redo());
    }

    #[test]
    fn redo_reapplies() {
        let mut history = EditActionHistory::new();
        let mut counter = Counter { value: 0 };

        history.record(set(&mut counter, 5, "five"));
        history.undo(&mut counter).unwrap();
        history.redo(&mut counter).unwrap();

        assert_eq!(counter.value, 5);
        assert_eq!(history.cursor(), 1);
        assert!(!history.can_redo());
    }

    #[test]
    fn undo_empty_returns_nothing_to_undo() {
        let mut history = EditActionHistory::<Counter>::new();
        let mut counter = Counter { value: 0 };

        assert_eq!(
            history.undo(&mut counter),
            Err(EditActionError::NothingToUndo)
        );
    }

    #[test]
    fn redo_at_end_returns_nothing_to_redo() {
        let mut history = EditActionHistory::new();
        let mut counter = Counter { value: 0 };

        assert_eq!(
            history.redo(&mut counter),
            Err(EditActionError::NothingToRedo)
        );
        history.record(set(&mut counter, 1, "one"));
        assert_eq!(
            history.redo(&mut counter),
            Err(EditActionError::NothingToRedo)
        );
    }

    #[test]
    fn record_after_undo_discards_redo_tail() {
        let mut history = EditActionHistory::new();
        let mut counter = Counter { value: 0 };

        history.record(set(&mut counter, 1, "e1"));
        history.record(set(&mut counter, 2, "e2"));
        history.record(set(&mut counter, 3, "e3"));
        assert_eq!(history.cursor(), 3);

        history.undo(&mut counter).unwrap();
        assert_eq!(history.cursor(), 2);
        assert_eq!(counter.value, 2);

        history.record(set(&mut counter, 4, "e4"));
        assert_eq!(history.len(), 3);
        assert_eq!(history.cursor(), 3);
        assert_eq!(
            history.undo_descriptions().collect::<Vec<_>>(),
            vec!["e4", "e2", "e1"]
        );

        assert_eq!(
            history.redo(&mut counter),
            Err(EditActionError::NothingToRedo)
        );
        assert_eq!(counter.value, 4);

        // Walking back and forth never replays e3.
        for _ in 0..3 {
            history.undo(&mut counter).unwrap();
        }
        assert_eq!(counter.value, 0);
        for _ in 0..3 {
            history.redo(&mut counter).unwrap();
        }
        assert_eq!(counter.value, 4);
    }

    #[test]
    fn failed_revert_keeps_cursor() {
        let mut history = EditActionHistory::new();
        let mut counter = Counter { value: 0 };

        history.record(set(&mut counter, 1, "one"));
        history.record(Box::new(FailingAction));

        assert!(history.undo(&mut counter).is_err());
        assert_eq!(history.cursor(), 2);
        assert_eq!(counter.value, 1);
    }

    #[test]
    fn descriptions_follow_cursor() {
        let mut history = EditActionHistory::new();
        let mut counter = Counter { value: 0 };

        history.record(set(&mut counter, 1, "first"));
        history.record(set(&mut counter, 2, "second"));
        history.record(set(&mut counter, 3, "third"));
        history.undo(&mut counter).unwrap();
        history.undo(&mut counter).unwrap();

        assert_eq!(history.undo_descriptions().collect::<Vec<_>>(), vec!["first"]);
        assert_eq!(
            history.redo_descriptions().collect::<Vec<_>>(),
            vec!["second", "third"]
        );
    }

    #[test]
    fn clear_resets_everything() {
        let mut history = EditActionHistory::new();
        let mut counter = Counter { value: 0 };

        history.record(set(&mut counter, 1, "one"));
        history.record(set(&mut counter, 2, "two"));
        history.undo(&mut counter).unwrap();
        history.clear();

        assert!(history.is_empty());
        assert_eq!(history.cursor(), 0);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(!history.has_unsaved_changes());
    }

    #[test]
    fn save_point_tracks_cursor() {
        let mut history = EditActionHistory::new();
        let mut counter = Counter { value: 0 };
        assert!(!history.has_unsaved_changes());

        history.record(set(&mut counter, 1, "one"));
        assert!(history.has_unsaved_changes());

        history.mark_saved();
        assert!(!history.has_unsaved_changes());

        history.undo(&mut counter).unwrap();
        assert!(history.has_unsaved_changes());

        history.redo(&mut counter).unwrap();
        assert!(!history.has_unsaved_changes());
    }

    #[test]
    fn save_point_lost_when_redo_tail_discarded() {
        let mut history = EditActionHistory::new();
        let mut counter = Counter { value: 0 };

        history.record(set(&mut counter, 1, "one"));
        history.record(set(&mut counter, 2, "two"));
        history.mark_saved();
        history.undo(&mut counter).unwrap();
        history.record(set(&mut counter, 7, "seven"));
        assert!(history.has_unsaved_changes());

        // Same cursor as the old save point, different content.
        assert_eq!(history.cursor(), 2);
        assert!(history.has_unsaved_changes());
    }

    #[test]
    fn mark_saved_at_earlier_cursor() {
        let mut history = EditActionHistory::new();
        let mut counter = Counter { value: 0 };

        history.record(set(&mut counter, 1, "one"));
        history.record(set(&mut counter, 2, "two"));
        history.mark_saved_at(1);
        assert!(history.has_unsaved_changes());
        history.undo(&mut counter).unwrap();
        assert!(!history.has_unsaved_changes());

        history.mark_saved_at(99);
        assert!(!history.has_unsaved_changes());
    }

    #[test]
    fn debug_impl() {
        let history = EditActionHistory::<Counter>::new();
        let debug = format!("{history:?}");
        assert!(debug.contains("EditActionHistory"));
        assert!(debug.contains("cursor"));
    }
}
