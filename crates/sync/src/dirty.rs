//! Dirty detection.
//!
//! Derived on every call from the grid engine's own change tracking, which is
//! the only source of truth. Nothing is cached here.

use sheetpilot_engine::sheet::Sheet;
use sheetpilot_engine::workbook::Workbook;

/// True if any sheet has dirty cells, dirty rows, inserted rows or deleted rows.
/// Stops at the first sheet that does.
pub fn has_unsaved_changes(workbook: &Workbook) -> bool {
    workbook.sheets().iter().any(sheet_is_dirty)
}

pub fn sheet_is_dirty(sheet: &Sheet) -> bool {
    !sheet.dirty_cells().is_empty()
        || !sheet.dirty_rows().is_empty()
        || !sheet.inserted_rows().is_empty()
        || !sheet.deleted_rows().is_empty()
}

/// Names of sheets with unsaved changes, in workbook order.
pub fn dirty_sheet_names(workbook: &Workbook) -> Vec<&str> {
    workbook
        .sheets()
        .iter()
        .filter(|s| sheet_is_dirty(s))
        .map(|s| s.name.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_workbook() {
        let wb = Workbook::new();
        assert!(!has_unsaved_changes(&wb));
    }

    #[test]
    fn test_each_tracking_set_counts() {
        let mut wb = Workbook::new();
        wb.add_sheet_named("Two");

        wb.sheet_mut(1).unwrap().set_value(0, 0, "x");
        assert!(has_unsaved_changes(&wb));
        assert_eq!(dirty_sheet_names(&wb), vec!["Two"]);
        wb.clear_pending_changes();

        wb.sheet_mut(0).unwrap().set_row_height(3, 20.0);
        assert!(has_unsaved_changes(&wb));
        wb.clear_pending_changes();

        wb.sheet_mut(0).unwrap().insert_rows(0, 1);
        assert!(has_unsaved_changes(&wb));
        wb.clear_pending_changes();

        wb.sheet_mut(1).unwrap().delete_rows(0, 1);
        assert!(has_unsaved_changes(&wb));
        wb.clear_pending_changes();

        assert!(!has_unsaved_changes(&wb));
    }

    #[test]
    fn test_observes_changes_made_behind_its_back() {
        let mut wb = Workbook::new();
        assert!(!has_unsaved_changes(&wb));
        wb.sheet_mut(0).unwrap().set_value(5, 5, "late");
        assert!(has_unsaved_changes(&wb));
    }
}
