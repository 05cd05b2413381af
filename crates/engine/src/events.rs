//! Change notifications emitted by the workbook.
//!
//! Sheets publish changes only while painting is live. Anything mutated during
//! a paint suspension is held back and published as a single event on resume,
//! so an observer draining events never sees half of a multi-cell edit.

use crate::sheet::SheetId;

/// Events drained from `Workbook::drain_events`.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkbookEvent {
    /// Cells changed value or format.
    CellsChanged(CellsChangedEvent),
    /// Rows were inserted or deleted.
    RowsChanged(RowsChangedEvent),
    /// Pending change tracking was cleared (document persisted).
    PendingChangesCleared,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellsChangedEvent {
    pub sheet: SheetId,
    /// (row, col) pairs, in mutation order, deduplicated.
    pub cells: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowChangeKind {
    Inserted,
    Deleted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowsChangedEvent {
    pub sheet: SheetId,
    pub kind: RowChangeKind,
    pub at: usize,
    pub count: usize,
}

/// Internal per-sheet publication, turned into `WorkbookEvent`s by the workbook.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SheetNotice {
    Cells(Vec<(usize, usize)>),
    Rows { kind: RowChangeKind, at: usize, count: usize },
}

/// Simple event collector for tests and headless drivers.
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Vec<WorkbookEvent>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = WorkbookEvent>) {
        self.events.extend(events);
    }

    pub fn events(&self) -> &[WorkbookEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Filter to only CellsChanged events.
    pub fn cells_changed(&self) -> Vec<&CellsChangedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                WorkbookEvent::CellsChanged(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    /// Filter to only RowsChanged events.
    pub fn rows_changed(&self) -> Vec<&RowsChangedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                WorkbookEvent::RowsChanged(r) => Some(r),
                _ => None,
            })
            .collect()
    }
}
