//! JSON document snapshots.
//!
//! This is the shape exchanged with the persistence backend (`documentData`)
//! and returned by rollback. Loading a snapshot yields a workbook with no
//! pending changes and empty undo history.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cell::{Cell, CellFormat, CellValue};
use crate::sheet::{is_valid_sheet_name, normalize_sheet_name, Sheet, SheetId, DEFAULT_COLS, DEFAULT_ROWS};
use crate::workbook::Workbook;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkbookSnapshot {
    pub sheets: Vec<SheetSnapshot>,
    #[serde(default)]
    pub active_sheet: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub name: String,
    #[serde(default = "default_rows")]
    pub rows: usize,
    #[serde(default = "default_cols")]
    pub cols: usize,
    #[serde(default)]
    pub cells: Vec<CellSnapshot>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub row_heights: BTreeMap<usize, f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellSnapshot {
    pub row: usize,
    pub col: usize,
    #[serde(default)]
    pub value: CellValue,
    #[serde(default, skip_serializing_if = "CellFormat::is_default")]
    pub format: CellFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_parent: Option<(usize, usize)>,
}

fn default_rows() -> usize {
    DEFAULT_ROWS
}

fn default_cols() -> usize {
    DEFAULT_COLS
}

/// Error building a workbook from a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotError {
    /// JSON did not match the snapshot shape
    Parse(String),
    /// Snapshot contained no sheets
    NoSheets,
    /// Sheet name invalid or used twice
    BadSheetName(String),
    /// Sheet id used twice, or too large to leave room for new sheets
    BadSheetId(u64),
    /// Cell coordinates outside the sheet's grid
    OutOfBounds { sheet: String, row: usize, col: usize },
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Parse(msg) => write!(f, "Snapshot parse error: {}", msg),
            SnapshotError::NoSheets => write!(f, "Snapshot has no sheets"),
            SnapshotError::BadSheetName(name) => write!(f, "Invalid or duplicate sheet name: {:?}", name),
            SnapshotError::BadSheetId(id) => write!(f, "Invalid or duplicate sheet id: {}", id),
            SnapshotError::OutOfBounds { sheet, row, col } => {
                write!(f, "Cell ({}, {}) is outside sheet {:?}", row, col, sheet)
            }
        }
    }
}

impl std::error::Error for SnapshotError {}

impl Workbook {
    pub fn to_snapshot(&self) -> WorkbookSnapshot {
        let sheets = self
            .sheets()
            .iter()
            .map(|sheet| {
                let mut cells: Vec<CellSnapshot> = sheet
                    .cells_iter()
                    .map(|(&(row, col), cell)| CellSnapshot {
                        row,
                        col,
                        value: cell.value.clone(),
                        format: cell.format.clone(),
                        array_parent: cell.array_parent,
                    })
                    .collect();
                cells.sort_by_key(|c| (c.row, c.col));
                SheetSnapshot {
                    id: Some(sheet.id.raw()),
                    name: sheet.name.clone(),
                    rows: sheet.rows,
                    cols: sheet.cols,
                    cells,
                    row_heights: sheet.row_heights_iter().map(|(r, h)| (*r, *h)).collect(),
                }
            })
            .collect();
        WorkbookSnapshot {
            sheets,
            active_sheet: self.active_sheet_index(),
        }
    }

    pub fn from_snapshot(snapshot: &WorkbookSnapshot) -> Result<Self, SnapshotError> {
        if snapshot.sheets.is_empty() {
            return Err(SnapshotError::NoSheets);
        }

        let mut seen = Vec::with_capacity(snapshot.sheets.len());
        let mut seen_ids = Vec::with_capacity(snapshot.sheets.len());
        let max_id = snapshot.sheets.iter().filter_map(|s| s.id).max().unwrap_or(0);
        let mut next_id = max_id.checked_add(1).ok_or(SnapshotError::BadSheetId(max_id))?;

        let mut sheets = Vec::with_capacity(snapshot.sheets.len());
        for snap in &snapshot.sheets {
            let key = normalize_sheet_name(&snap.name);
            if !is_valid_sheet_name(&snap.name) || seen.contains(&key) {
                return Err(SnapshotError::BadSheetName(snap.name.clone()));
            }
            seen.push(key);

            let id = match snap.id {
                Some(id) => {
                    if seen_ids.contains(&id) {
                        return Err(SnapshotError::BadSheetId(id));
                    }
                    seen_ids.push(id);
                    SheetId(id)
                }
                None => {
                    let id = SheetId(next_id);
                    next_id = next_id.checked_add(1).ok_or(SnapshotError::BadSheetId(next_id))?;
                    id
                }
            };

            let mut sheet = Sheet::new_with_name(id, snap.rows, snap.cols, &snap.name);
            for c in &snap.cells {
                if !sheet.in_bounds(c.row, c.col) {
                    return Err(SnapshotError::OutOfBounds {
                        sheet: snap.name.clone(),
                        row: c.row,
                        col: c.col,
                    });
                }
                sheet.insert_cell_unchecked(
                    c.row,
                    c.col,
                    Cell {
                        value: c.value.clone(),
                        format: c.format.clone(),
                        array_parent: c.array_parent,
                    },
                );
            }
            for (&row, &height) in &snap.row_heights {
                sheet.set_row_height_unchecked(row, height);
            }
            sheets.push(sheet);
        }

        Ok(Workbook::from_sheets(sheets, snapshot.active_sheet, next_id))
    }

    pub fn to_json(&self) -> serde_json::Value {
        // Snapshot types contain only strings, numbers, bools and maps with
        // integer keys, which serde_json always accepts.
        serde_json::to_value(self.to_snapshot()).unwrap_or(serde_json::Value::Null)
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self, SnapshotError> {
        let snapshot: WorkbookSnapshot = serde_json::from_value(value.clone())
            .map_err(|e| SnapshotError::Parse(e.to_string()))?;
        Self::from_snapshot(&snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_preserves_content_and_format() {
        let mut wb = Workbook::new();
        wb.add_sheet_named("Data");
        let sheet = wb.sheet_mut(1).unwrap();
        sheet.set_value(2, 3, "42");
        sheet.update_format(2, 3, |f| f.bold = true);
        sheet.set_array_formula(0, 0, 1, 0, "=A5:A6");
        sheet.set_row_height(4, 18.0);

        let restored = Workbook::from_json(&wb.to_json()).unwrap();
        let sheet = restored.sheet_by_name("data").unwrap();
        assert_eq!(sheet.get_value(2, 3), CellValue::Number(42.0));
        assert!(sheet.get_format(2, 3).bold);
        assert_eq!(sheet.get_cell(1, 0).unwrap().array_parent, Some((0, 0)));
        assert_eq!(sheet.row_height(4), Some(18.0));
        assert_eq!(restored.sheet(1).unwrap().id, wb.sheet(1).unwrap().id);
    }

    #[test]
    fn test_loaded_workbook_is_clean() {
        let mut wb = Workbook::new();
        wb.sheet_mut(0).unwrap().set_value(0, 0, "x");
        let restored = Workbook::from_snapshot(&wb.to_snapshot()).unwrap();
        assert!(!restored.has_pending_changes());
        assert!(!restored.sheet(0).unwrap().can_undo());
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let value = json!({
            "sheets": [{
                "name": "Sheet1",
                "cells": [{"row": 0, "col": 1, "value": {"kind": "text", "data": "hi"}}]
            }]
        });
        let wb = Workbook::from_json(&value).unwrap();
        let sheet = wb.sheet(0).unwrap();
        assert_eq!(sheet.rows, DEFAULT_ROWS);
        assert_eq!(sheet.get_raw(0, 1), "hi");
    }

    #[test]
    fn test_rejects_bad_snapshots() {
        assert_eq!(
            Workbook::from_json(&json!({"sheets": []})).unwrap_err(),
            SnapshotError::NoSheets
        );
        let dup = json!({"sheets": [{"name": "A"}, {"name": "a"}]});
        assert!(matches!(Workbook::from_json(&dup), Err(SnapshotError::BadSheetName(_))));
        let oob = json!({"sheets": [{"name": "A", "rows": 2, "cols": 2,
            "cells": [{"row": 5, "col": 0}]}]});
        assert!(matches!(Workbook::from_json(&oob), Err(SnapshotError::OutOfBounds { .. })));
        assert!(matches!(Workbook::from_json(&json!("nope")), Err(SnapshotError::Parse(_))));
    }

    #[test]
    fn test_rejects_unusable_sheet_ids() {
        let huge = json!({"sheets": [{"id": u64::MAX, "name": "A"}, {"name": "B"}]});
        assert_eq!(Workbook::from_json(&huge).unwrap_err(), SnapshotError::BadSheetId(u64::MAX));
        let huge_alone = json!({"sheets": [{"id": u64::MAX, "name": "A"}]});
        assert!(matches!(Workbook::from_json(&huge_alone), Err(SnapshotError::BadSheetId(_))));
        let dup = json!({"sheets": [{"id": 3, "name": "A"}, {"id": 3, "name": "B"}]});
        assert_eq!(Workbook::from_json(&dup).unwrap_err(), SnapshotError::BadSheetId(3));
    }

    #[test]
    fn test_new_sheet_ids_follow_snapshot_ids() {
        let value = json!({"sheets": [{"id": 7, "name": "A"}, {"name": "B"}]});
        let mut wb = Workbook::from_json(&value).unwrap();
        assert_eq!(wb.sheet(1).unwrap().id.raw(), 8);
        let idx = wb.add_sheet_named("C").unwrap();
        assert_eq!(wb.sheet(idx).unwrap().id.raw(), 9);
    }
}
