use std::collections::BTreeSet;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::cell::{Cell, CellFormat, CellValue};
use crate::events::{RowChangeKind, SheetNotice};
use crate::history::{CellChange, History};

pub const DEFAULT_ROWS: usize = 65536;
pub const DEFAULT_COLS: usize = 256;

/// Stable sheet identity. Assigned by the workbook, never reused after deletion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SheetId(pub u64);

impl SheetId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Case-insensitive lookup key for a sheet name.
pub fn normalize_sheet_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Sheet names must be non-empty, at most 31 chars, and free of `[]:*?/\`.
pub fn is_valid_sheet_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty()
        && trimmed.chars().count() <= 31
        && !trimmed.contains(['[', ']', ':', '*', '?', '/', '\\'])
}

/// Unsaved-change bookkeeping for one sheet.
///
/// Cleared only by `Sheet::clear_pending_changes` (after a confirmed save) or
/// when a sheet is rebuilt from a snapshot.
#[derive(Debug, Clone, Default)]
pub struct ChangeTracker {
    dirty_cells: FxHashSet<(usize, usize)>,
    dirty_rows: FxHashSet<usize>,
    inserted_rows: BTreeSet<usize>,
    deleted_rows: BTreeSet<usize>,
}

impl ChangeTracker {
    pub fn is_empty(&self) -> bool {
        self.dirty_cells.is_empty()
            && self.dirty_rows.is_empty()
            && self.inserted_rows.is_empty()
            && self.deleted_rows.is_empty()
    }

    fn clear(&mut self) {
        self.dirty_cells.clear();
        self.dirty_rows.clear();
        self.inserted_rows.clear();
        self.deleted_rows.clear();
    }
}

#[derive(Debug, Clone)]
pub struct Sheet {
    pub id: SheetId,
    pub name: String,
    name_key: String,
    cells: FxHashMap<(usize, usize), Cell>,
    row_heights: FxHashMap<usize, f32>,
    pub rows: usize,
    pub cols: usize,
    changes: ChangeTracker,
    /// Nesting depth of paint suspension. Zero means painting is live.
    paint_suspended: u32,
    /// Changes made while painting is suspended, published on resume.
    held: Vec<CellChange>,
    notices: Vec<SheetNotice>,
    history: History,
}

impl Sheet {
    pub fn new(id: SheetId, rows: usize, cols: usize) -> Self {
        Self::new_with_name(id, rows, cols, "Sheet1")
    }

    pub fn new_with_name(id: SheetId, rows: usize, cols: usize, name: &str) -> Self {
        let name = name.trim().to_string();
        Self {
            id,
            name_key: normalize_sheet_name(&name),
            name,
            cells: FxHashMap::default(),
            row_heights: FxHashMap::default(),
            rows,
            cols,
            changes: ChangeTracker::default(),
            paint_suspended: 0,
            held: Vec::new(),
            notices: Vec::new(),
            history: History::new(),
        }
    }

    pub fn name_key(&self) -> &str {
        &self.name_key
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.trim().to_string();
        self.name_key = normalize_sheet_name(&self.name);
    }

    pub fn in_bounds(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols
    }

    // =========================================================================
    // Paint / undo suspension
    // =========================================================================

    /// Stop publishing changes and start grouping them into one undo entry.
    /// Nested calls are counted; only the outermost resume publishes.
    pub fn suspend_paint(&mut self) {
        self.paint_suspended += 1;
    }

    pub fn resume_paint(&mut self) {
        if self.paint_suspended == 0 {
            return;
        }
        self.paint_suspended -= 1;
        if self.paint_suspended == 0 {
            self.flush_held();
        }
    }

    pub fn is_paint_suspended(&self) -> bool {
        self.paint_suspended > 0
    }

    /// Run `f` with painting suspended, publishing all of its changes at once.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Sheet) -> R) -> R {
        self.suspend_paint();
        let result = f(self);
        self.resume_paint();
        result
    }

    fn flush_held(&mut self) {
        let held = std::mem::take(&mut self.held);
        let mut seen = FxHashSet::default();
        let cells: Vec<(usize, usize)> = held
            .iter()
            .filter(|c| c.before != c.after)
            .map(|c| (c.row, c.col))
            .filter(|key| seen.insert(*key))
            .collect();
        self.history.record_batch(held);
        if !cells.is_empty() {
            self.notices.push(SheetNotice::Cells(cells));
        }
    }

    pub(crate) fn take_notices(&mut self) -> Vec<SheetNotice> {
        std::mem::take(&mut self.notices)
    }

    // =========================================================================
    // Cell mutation
    // =========================================================================

    /// Single write path: every cell mutation goes through here so change
    /// tracking, undo history and notifications stay consistent.
    fn write_cell(&mut self, row: usize, col: usize, f: impl FnOnce(&mut Cell)) {
        let before = self.cells.get(&(row, col)).cloned();
        let mut cell = before.clone().unwrap_or_default();
        f(&mut cell);
        let after = if cell.is_blank() { None } else { Some(cell) };
        self.put(row, col, after.clone());

        let change = CellChange { row, col, before, after };
        if self.paint_suspended > 0 {
            self.held.push(change);
        } else if change.before != change.after {
            self.notices.push(SheetNotice::Cells(vec![(row, col)]));
            self.history.record_batch(vec![change]);
        }
    }

    fn put(&mut self, row: usize, col: usize, cell: Option<Cell>) {
        let changed = self.cells.get(&(row, col)) != cell.as_ref();
        match cell {
            Some(cell) => {
                self.cells.insert((row, col), cell);
            }
            None => {
                self.cells.remove(&(row, col));
            }
        }
        if changed {
            self.changes.dirty_cells.insert((row, col));
        }
    }

    /// Set a cell from user-style input (formulas detected by a leading `=`).
    pub fn set_value(&mut self, row: usize, col: usize, value: &str) {
        self.write_cell(row, col, |cell| cell.set(value));
    }

    /// Install a single-cell formula. A missing leading `=` is added.
    pub fn set_formula(&mut self, row: usize, col: usize, formula: &str) {
        let source = normalize_formula(formula);
        self.write_cell(row, col, |cell| {
            cell.value = CellValue::Formula(source);
            cell.array_parent = None;
        });
    }

    /// Install an array formula anchored at (start_row, start_col) covering the
    /// inclusive rectangle. Member cells keep their formats but lose content.
    pub fn set_array_formula(
        &mut self,
        start_row: usize,
        start_col: usize,
        end_row: usize,
        end_col: usize,
        formula: &str,
    ) {
        let source = normalize_formula(formula);
        let rows = end_row - start_row + 1;
        let cols = end_col - start_col + 1;
        self.batch(|sheet| {
            for row in start_row..=end_row {
                for col in start_col..=end_col {
                    if (row, col) == (start_row, start_col) {
                        let source = source.clone();
                        sheet.write_cell(row, col, move |cell| {
                            cell.value = CellValue::ArrayFormula { source, rows, cols };
                            cell.array_parent = None;
                        });
                    } else {
                        sheet.write_cell(row, col, |cell| {
                            cell.value = CellValue::Empty;
                            cell.array_parent = Some((start_row, start_col));
                        });
                    }
                }
            }
        });
    }

    /// Clear a cell completely (content and format)
    pub fn clear_cell(&mut self, row: usize, col: usize) {
        self.write_cell(row, col, |cell| *cell = Cell::new());
    }

    /// Modify a cell's format in place.
    pub fn update_format(&mut self, row: usize, col: usize, f: impl FnOnce(&mut CellFormat)) {
        self.write_cell(row, col, |cell| f(&mut cell.format));
    }

    pub fn set_format(&mut self, row: usize, col: usize, format: CellFormat) {
        self.write_cell(row, col, |cell| cell.format = format);
    }

    // =========================================================================
    // Cell access
    // =========================================================================

    pub fn get_cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    pub fn get_value(&self, row: usize, col: usize) -> CellValue {
        self.cells
            .get(&(row, col))
            .map(|c| c.value.clone())
            .unwrap_or_default()
    }

    pub fn get_raw(&self, row: usize, col: usize) -> String {
        self.cells
            .get(&(row, col))
            .map(|c| c.value.raw_display())
            .unwrap_or_default()
    }

    pub fn get_format(&self, row: usize, col: usize) -> CellFormat {
        self.cells
            .get(&(row, col))
            .map(|c| c.format.clone())
            .unwrap_or_default()
    }

    /// Iterate over all populated cells
    pub fn cells_iter(&self) -> impl Iterator<Item = (&(usize, usize), &Cell)> {
        self.cells.iter()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub(crate) fn insert_cell_unchecked(&mut self, row: usize, col: usize, cell: Cell) {
        if !cell.is_blank() {
            self.cells.insert((row, col), cell);
        }
    }

    // =========================================================================
    // Rows
    // =========================================================================

    pub fn set_row_height(&mut self, row: usize, height: f32) {
        self.row_heights.insert(row, height);
        self.changes.dirty_rows.insert(row);
    }

    pub fn row_height(&self, row: usize) -> Option<f32> {
        self.row_heights.get(&row).copied()
    }

    pub fn row_heights_iter(&self) -> impl Iterator<Item = (&usize, &f32)> {
        self.row_heights.iter()
    }

    pub(crate) fn set_row_height_unchecked(&mut self, row: usize, height: f32) {
        self.row_heights.insert(row, height);
    }

    /// Insert rows at the specified position, shifting existing rows down.
    /// Structural edits invalidate cell coordinates in the undo history, so it is cleared.
    pub fn insert_rows(&mut self, at_row: usize, count: usize) {
        if count == 0 {
            return;
        }
        let cells_to_shift: Vec<_> = self.cells
            .iter()
            .filter(|((r, _), _)| *r >= at_row)
            .map(|((r, c), cell)| ((*r, *c), cell.clone()))
            .collect();

        for ((r, c), _) in &cells_to_shift {
            self.cells.remove(&(*r, *c));
        }

        for ((r, c), cell) in cells_to_shift {
            if r + count < self.rows {
                self.cells.insert((r + count, c), cell);
            }
        }

        self.row_heights = std::mem::take(&mut self.row_heights)
            .into_iter()
            .filter_map(|(r, h)| {
                let r = if r >= at_row { r + count } else { r };
                (r < self.rows).then_some((r, h))
            })
            .collect();

        self.changes.inserted_rows.extend(at_row..at_row + count);
        self.history.clear();
        self.notices.push(SheetNotice::Rows { kind: RowChangeKind::Inserted, at: at_row, count });
    }

    /// Delete rows at the specified position, shifting remaining rows up
    pub fn delete_rows(&mut self, start_row: usize, count: usize) {
        if count == 0 {
            return;
        }
        let end = start_row + count;
        self.cells.retain(|(r, _), _| *r < start_row || *r >= end);

        let cells_to_shift: Vec<_> = self.cells
            .iter()
            .filter(|((r, _), _)| *r >= end)
            .map(|((r, c), cell)| ((*r, *c), cell.clone()))
            .collect();

        for ((r, c), _) in &cells_to_shift {
            self.cells.remove(&(*r, *c));
        }

        for ((r, c), cell) in cells_to_shift {
            self.cells.insert((r - count, c), cell);
        }

        self.row_heights = std::mem::take(&mut self.row_heights)
            .into_iter()
            .filter(|(r, _)| *r < start_row || *r >= end)
            .map(|(r, h)| if r >= end { (r - count, h) } else { (r, h) })
            .collect();

        self.changes.deleted_rows.extend(start_row..end);
        self.history.clear();
        self.notices.push(SheetNotice::Rows { kind: RowChangeKind::Deleted, at: start_row, count });
    }

    // =========================================================================
    // Change tracking
    // =========================================================================

    pub fn dirty_cells(&self) -> &FxHashSet<(usize, usize)> {
        &self.changes.dirty_cells
    }

    pub fn dirty_rows(&self) -> &FxHashSet<usize> {
        &self.changes.dirty_rows
    }

    pub fn inserted_rows(&self) -> &BTreeSet<usize> {
        &self.changes.inserted_rows
    }

    pub fn deleted_rows(&self) -> &BTreeSet<usize> {
        &self.changes.deleted_rows
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Forget unsaved-change markers. Cell content is untouched.
    pub fn clear_pending_changes(&mut self) {
        self.changes.clear();
    }

    // =========================================================================
    // Undo / Redo
    // =========================================================================

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.history.undo() else {
            return false;
        };
        let mut cells = Vec::with_capacity(entry.changes.len());
        for change in entry.changes.iter().rev() {
            self.put(change.row, change.col, change.before.clone());
            cells.push((change.row, change.col));
        }
        self.notices.push(SheetNotice::Cells(cells));
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(entry) = self.history.redo() else {
            return false;
        };
        let mut cells = Vec::with_capacity(entry.changes.len());
        for change in &entry.changes {
            self.put(change.row, change.col, change.after.clone());
            cells.push((change.row, change.col));
        }
        self.notices.push(SheetNotice::Cells(cells));
        true
    }
}

fn normalize_formula(formula: &str) -> String {
    let trimmed = formula.trim();
    if trimmed.starts_with('=') {
        trimmed.to_string()
    } else {
        format!("={}", trimmed)
    }
}
