use crate::events::{CellsChangedEvent, RowsChangedEvent, SheetNotice, WorkbookEvent};
use crate::sheet::{is_valid_sheet_name, normalize_sheet_name, Sheet, SheetId, DEFAULT_COLS, DEFAULT_ROWS};

/// A workbook containing multiple sheets
#[derive(Debug, Clone)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    active_sheet: usize,
    /// Next ID to assign to a new sheet. Monotonically increasing, never reused.
    next_sheet_id: u64,
    /// Set by `clear_pending_changes`, drained with the next batch of events.
    cleared: bool,
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

impl Workbook {
    /// Create a new workbook with one default sheet
    pub fn new() -> Self {
        let sheet = Sheet::new(SheetId(1), DEFAULT_ROWS, DEFAULT_COLS);
        Self {
            sheets: vec![sheet],
            active_sheet: 0,
            next_sheet_id: 2,
            cleared: false,
        }
    }

    /// Create a workbook from already-built sheets. Used by snapshot import,
    /// which has checked that `next_sheet_id` is above every sheet's id.
    pub(crate) fn from_sheets(sheets: Vec<Sheet>, active: usize, next_sheet_id: u64) -> Self {
        let active_sheet = active.min(sheets.len().saturating_sub(1));
        Self {
            sheets,
            active_sheet,
            next_sheet_id,
            cleared: false,
        }
    }

    fn generate_sheet_id(&mut self) -> SheetId {
        let id = SheetId(self.next_sheet_id);
        self.next_sheet_id += 1;
        id
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn active_sheet_index(&self) -> usize {
        self.active_sheet
    }

    pub fn set_active_sheet(&mut self, index: usize) -> bool {
        if index < self.sheets.len() {
            self.active_sheet = index;
            true
        } else {
            false
        }
    }

    pub fn sheet(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    pub fn sheet_mut(&mut self, index: usize) -> Option<&mut Sheet> {
        self.sheets.get_mut(index)
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Find a sheet index by name (case-insensitive)
    pub fn index_of_name(&self, name: &str) -> Option<usize> {
        let key = normalize_sheet_name(name);
        self.sheets.iter().position(|s| s.name_key() == key)
    }

    pub fn sheet_by_name(&self, name: &str) -> Option<&Sheet> {
        self.index_of_name(name).and_then(|i| self.sheets.get(i))
    }

    pub fn sheet_by_name_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        let idx = self.index_of_name(name)?;
        self.sheets.get_mut(idx)
    }

    pub fn sheet_name_exists(&self, name: &str) -> bool {
        self.index_of_name(name).is_some()
    }

    /// Add a new sheet with a specific name.
    /// Returns None if the name is invalid or already exists.
    pub fn add_sheet_named(&mut self, name: &str) -> Option<usize> {
        if !is_valid_sheet_name(name) || self.sheet_name_exists(name) {
            return None;
        }
        let id = self.generate_sheet_id();
        self.sheets.push(Sheet::new_with_name(id, DEFAULT_ROWS, DEFAULT_COLS, name));
        Some(self.sheets.len() - 1)
    }

    /// Rename a sheet by index. Fails on invalid or duplicate names.
    pub fn rename_sheet(&mut self, index: usize, new_name: &str) -> bool {
        if !is_valid_sheet_name(new_name) {
            return false;
        }
        let key = normalize_sheet_name(new_name);
        let taken = self
            .sheets
            .iter()
            .enumerate()
            .any(|(i, s)| i != index && s.name_key() == key);
        if taken {
            return false;
        }
        match self.sheets.get_mut(index) {
            Some(sheet) => {
                sheet.set_name(new_name);
                true
            }
            None => false,
        }
    }

    /// True if any sheet carries unsaved-change markers.
    pub fn has_pending_changes(&self) -> bool {
        self.sheets.iter().any(|s| s.has_pending_changes())
    }

    /// Clear unsaved-change markers on every sheet (after a confirmed save).
    pub fn clear_pending_changes(&mut self) {
        for sheet in &mut self.sheets {
            sheet.clear_pending_changes();
        }
        self.cleared = true;
    }

    /// Drain change notifications published since the last call, in sheet order.
    pub fn drain_events(&mut self) -> Vec<WorkbookEvent> {
        let mut events = Vec::new();
        for sheet in &mut self.sheets {
            let id = sheet.id;
            for notice in sheet.take_notices() {
                events.push(match notice {
                    SheetNotice::Cells(cells) => {
                        WorkbookEvent::CellsChanged(CellsChangedEvent { sheet: id, cells })
                    }
                    SheetNotice::Rows { kind, at, count } => {
                        WorkbookEvent::RowsChanged(RowsChangedEvent { sheet: id, kind, at, count })
                    }
                });
            }
        }
        if std::mem::take(&mut self.cleared) {
            events.push(WorkbookEvent::PendingChangesCleared);
        }
        events
    }
}
