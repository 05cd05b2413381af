//! Command apply engine.
//!
//! Dispatches a normalized command to the grid engine. Every command runs
//! inside one paint suspension of its target sheet, so a rectangle is
//! published (and undone) as a unit. Failures are per command: a batch keeps
//! going and reports what it skipped.

use serde_json::Value;
use sheetpilot_engine::sheet::Sheet;
use sheetpilot_engine::workbook::Workbook;
use sheetpilot_protocol::{CommandType, EditCommand, SheetRef};

use crate::error::ApplyError;
use crate::normalize::normalize;
use crate::range::CellRange;
use crate::style::StylePlan;

/// What applying one command did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Cells were written.
    Applied { cells: usize },
    /// Recognized but intentionally inert (`control_sheet`, `filter_data`,
    /// `summary_edit_history`, unknown types).
    Ignored,
}

/// Per-command failure inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    /// Position in the batch as delivered.
    pub index: usize,
    pub error: ApplyError,
}

/// Result of applying one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub applied: usize,
    pub ignored: usize,
    pub failures: Vec<CommandFailure>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn total(&self) -> usize {
        self.applied + self.ignored + self.failures.len()
    }
}

/// Resolve a sheet reference. Names match case-insensitively; a name that
/// matches no sheet but parses as an integer is tried as an index.
pub fn resolve_sheet(workbook: &Workbook, sheet: &SheetRef) -> Result<usize, ApplyError> {
    let index = match sheet {
        SheetRef::Index(i) => usize::try_from(*i).ok().filter(|i| *i < workbook.sheet_count()),
        SheetRef::Name(name) => workbook.index_of_name(name).or_else(|| {
            name.trim()
                .parse::<usize>()
                .ok()
                .filter(|i| *i < workbook.sheet_count())
        }),
    };
    index.ok_or_else(|| ApplyError::UnknownSheet(sheet.clone()))
}

/// Apply one canonical command.
pub fn apply_command(workbook: &mut Workbook, cmd: &EditCommand) -> Result<ApplyOutcome, ApplyError> {
    if is_inert(cmd.command_type) {
        return Ok(ApplyOutcome::Ignored);
    }

    let index = resolve_sheet(workbook, &cmd.sheet_identifier)?;
    let range = CellRange::parse(&cmd.range)?;
    let sheet = workbook
        .sheet_mut(index)
        .ok_or_else(|| ApplyError::UnknownSheet(cmd.sheet_identifier.clone()))?;
    range.check_bounds(sheet.rows, sheet.cols)?;

    match cmd.command_type {
        CommandType::ValueChange => {
            let literal = cmd.detailed_command.as_text();
            sheet.batch(|sheet| {
                for (row, col) in range.cells() {
                    sheet.set_value(row, col, &literal);
                }
            });
        }
        // sort_data carries a formula and is installed exactly like use_formula.
        CommandType::UseFormula | CommandType::SortData => {
            let formula = cmd.detailed_command.as_text();
            if formula.trim().is_empty() {
                return Err(ApplyError::MalformedCommand(format!(
                    "{} without a formula",
                    cmd.command_type.as_str()
                )));
            }
            install_formula(sheet, &range, &formula);
        }
        CommandType::ApplyStyle => {
            let style = cmd.detailed_command.as_style().ok_or_else(|| {
                ApplyError::MalformedCommand("apply_style without a style command".into())
            })?;
            StylePlan::compile(&style).run(sheet, &range);
        }
        CommandType::ControlSheet
        | CommandType::FilterData
        | CommandType::SummaryEditHistory
        | CommandType::Unknown => return Ok(ApplyOutcome::Ignored),
    }

    Ok(ApplyOutcome::Applied { cells: range.cell_count() })
}

fn is_inert(t: CommandType) -> bool {
    matches!(
        t,
        CommandType::ControlSheet
            | CommandType::FilterData
            | CommandType::SummaryEditHistory
            | CommandType::Unknown
    )
}

fn install_formula(sheet: &mut Sheet, range: &CellRange, formula: &str) {
    match *range {
        CellRange::Single { row, col } => {
            sheet.batch(|sheet| sheet.set_formula(row, col, formula));
        }
        CellRange::Rect { start_row, start_col, end_row, end_col } => {
            sheet.set_array_formula(start_row, start_col, end_row, end_col, formula);
        }
    }
}

/// Normalize and apply one raw wire element.
pub fn apply_raw(workbook: &mut Workbook, raw: &Value) -> Result<ApplyOutcome, ApplyError> {
    let cmd = normalize(raw)?;
    apply_command(workbook, &cmd)
}

/// Apply a raw batch in array order. One bad command never stops its siblings.
pub fn apply_batch(workbook: &mut Workbook, raw: &[Value]) -> BatchReport {
    let mut report = BatchReport::default();
    for (index, element) in raw.iter().enumerate() {
        match apply_raw(workbook, element) {
            Ok(ApplyOutcome::Applied { .. }) => report.applied += 1,
            Ok(ApplyOutcome::Ignored) => report.ignored += 1,
            Err(error) => {
                log::warn!("Skipping command {} of {}: {}", index + 1, raw.len(), error);
                report.failures.push(CommandFailure { index, error });
            }
        }
    }
    report
}
