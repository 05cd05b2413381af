//! In-process grid engine: sheets, cells, styles, change tracking and snapshots.
//!
//! Formulas are stored as source text. Evaluation and rendering live elsewhere.

pub mod cell;
pub mod events;
pub mod history;
pub mod sheet;
pub mod snapshot;
pub mod workbook;
