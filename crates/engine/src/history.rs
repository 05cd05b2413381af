//! Undo/Redo history for sheet mutations.
//!
//! Every mutation outside a paint suspension becomes its own entry. Mutations
//! made while painting is suspended are grouped into one entry when painting
//! resumes, so a multi-cell command undoes as a unit.

use crate::cell::Cell;

#[derive(Clone, Debug, PartialEq)]
pub struct CellChange {
    pub row: usize,
    pub col: usize,
    pub before: Option<Cell>,
    pub after: Option<Cell>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    pub changes: Vec<CellChange>,
}

#[derive(Debug, Clone)]
pub struct History {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    max_entries: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_entries: 100,
        }
    }

    /// Record multiple cell changes as a single undoable operation.
    /// No-op changes (before == after) are dropped.
    pub fn record_batch(&mut self, changes: Vec<CellChange>) {
        let changes: Vec<CellChange> = changes
            .into_iter()
            .filter(|c| c.before != c.after)
            .collect();
        if changes.is_empty() {
            return;
        }

        self.undo_stack.push(HistoryEntry { changes });
        self.redo_stack.clear();

        if self.undo_stack.len() > self.max_entries {
            self.undo_stack.remove(0);
        }
    }

    pub fn undo(&mut self) -> Option<HistoryEntry> {
        let entry = self.undo_stack.pop()?;
        self.redo_stack.push(entry.clone());
        Some(entry)
    }

    pub fn redo(&mut self) -> Option<HistoryEntry> {
        let entry = self.redo_stack.pop()?;
        self.undo_stack.push(entry.clone());
        Some(entry)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_cell(s: &str) -> Cell {
        let mut cell = Cell::new();
        cell.set(s);
        cell
    }

    #[test]
    fn test_batch_is_one_entry() {
        let mut history = History::new();
        history.record_batch(vec![
            CellChange { row: 0, col: 0, before: None, after: Some(text_cell("a")) },
            CellChange { row: 0, col: 1, before: None, after: Some(text_cell("b")) },
        ]);
        assert_eq!(history.undo_len(), 1);
        let entry = history.undo().unwrap();
        assert_eq!(entry.changes.len(), 2);
        assert!(history.can_redo());
    }

    #[test]
    fn test_noop_changes_are_dropped() {
        let mut history = History::new();
        history.record_batch(vec![CellChange {
            row: 1,
            col: 1,
            before: Some(text_cell("same")),
            after: Some(text_cell("same")),
        }]);
        assert!(!history.can_undo());
    }

    #[test]
    fn test_new_entry_clears_redo() {
        let mut history = History::new();
        history.record_batch(vec![CellChange { row: 0, col: 0, before: None, after: Some(text_cell("a")) }]);
        history.undo();
        assert!(history.can_redo());
        history.record_batch(vec![CellChange { row: 0, col: 0, before: None, after: Some(text_cell("b")) }]);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_history_is_capped() {
        let mut history = History::new();
        for i in 0..150 {
            history.record_batch(vec![CellChange {
                row: i,
                col: 0,
                before: None,
                after: Some(text_cell("x")),
            }]);
        }
        assert_eq!(history.undo_len(), 100);
    }
}
