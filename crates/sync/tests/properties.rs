// Property-based tests for the sync engine's core invariants.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::time::{Duration, Instant};

use proptest::prelude::*;
use serde_json::{json, Value};
use sheetpilot_engine::workbook::Workbook;
use sheetpilot_sync::apply::apply_raw;
use sheetpilot_sync::autosave::AutosaveScheduler;
use sheetpilot_sync::dirty::{has_unsaved_changes, sheet_is_dirty};
use sheetpilot_sync::normalize::normalize;
use sheetpilot_sync::version::VersionManager;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Literal that the grid stores as text (never a number or formula).
fn arb_literal() -> impl Strategy<Value = String> {
    r"v[a-z]{0,7}"
}

/// Inclusive rectangle inside a 30x30 corner of the sheet.
fn arb_rect() -> impl Strategy<Value = (usize, usize, usize, usize)> {
    (0usize..30, 0usize..30, 0usize..6, 0usize..6)
        .prop_map(|(r, c, h, w)| (r, c, r + h, c + w))
}

fn arb_command() -> impl Strategy<Value = Value> {
    let kind = prop_oneof![
        Just("value_change"),
        Just("use_formula"),
        Just("apply_style"),
        Just("control_sheet"),
        Just("filter_data"),
    ];
    let sheet = prop_oneof![Just(json!("Sheet1")), Just(json!(0)), Just(json!("Missing"))];
    let range = prop_oneof![
        (0i64..50, 0i64..50).prop_map(|(r, c)| json!([r, c])),
        (0i64..50, 0i64..50, 0i64..50, 0i64..50).prop_map(|(a, b, c, d)| json!([a, b, c, d])),
        Just(json!([5])),
    ];
    let detail = prop_oneof![
        arb_literal().prop_map(Value::from),
        Just(json!("=SUM(A1:A3)")),
        Just(json!({"method": "styleObject", "style": {"bold": true}})),
    ];
    (kind, sheet, range, detail).prop_map(|(kind, sheet, range, detail)| {
        json!({"sheetIdentifier": sheet, "commandType": kind, "range": range, "detailedCommand": detail})
    })
}

#[derive(Debug, Clone)]
enum Mutation {
    SetText(usize, usize, String),
    InsertRows(usize, usize),
    DeleteRows(usize, usize),
    RowHeight(usize),
}

fn arb_mutation() -> impl Strategy<Value = Mutation> {
    prop_oneof![
        3 => (0usize..40, 0usize..10, arb_literal()).prop_map(|(r, c, v)| Mutation::SetText(r, c, v)),
        1 => (0usize..40, 1usize..4).prop_map(|(at, n)| Mutation::InsertRows(at, n)),
        1 => (0usize..40, 1usize..4).prop_map(|(at, n)| Mutation::DeleteRows(at, n)),
        1 => (0usize..40).prop_map(Mutation::RowHeight),
    ]
}

fn apply_mutation(wb: &mut Workbook, sheet: usize, m: &Mutation) {
    let Some(s) = wb.sheet_mut(sheet) else { return };
    match m {
        Mutation::SetText(r, c, v) => s.set_value(*r, *c, v),
        Mutation::InsertRows(at, n) => s.insert_rows(*at, *n),
        Mutation::DeleteRows(at, n) => s.delete_rows(*at, *n),
        Mutation::RowHeight(r) => s.set_row_height(*r, 30.0),
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config())]

    /// A rectangular value_change writes the same literal to every covered cell
    /// and nothing outside the rectangle.
    #[test]
    fn value_change_fills_rectangle((sr, sc, er, ec) in arb_rect(), literal in arb_literal()) {
        let mut wb = Workbook::new();
        let cmd = json!({
            "sheetIdentifier": "Sheet1",
            "commandType": "value_change",
            "range": [sr, sc, er, ec],
            "detailedCommand": literal,
        });
        apply_raw(&mut wb, &cmd).unwrap();
        let sheet = wb.sheet(0).unwrap();
        for r in sr..=er {
            for c in sc..=ec {
                prop_assert_eq!(sheet.get_raw(r, c), literal.clone());
            }
        }
        prop_assert_eq!(sheet.cell_count(), (er - sr + 1) * (ec - sc + 1));
    }

    /// Wrapping a command in a one-element nestedCommands list changes nothing.
    #[test]
    fn nested_wrapper_is_transparent(cmd in arb_command()) {
        let wrapped = json!({"nestedCommands": [cmd.clone()]});
        prop_assert_eq!(normalize(&wrapped), normalize(&cmd));
    }

    /// The lock version never decreases across confirmed writes.
    #[test]
    fn lock_version_is_monotonic(
        start in proptest::option::of(0u64..100),
        confirmations in proptest::collection::vec(proptest::option::of(0u64..200), 1..30),
    ) {
        let mut vm = VersionManager::new();
        vm.on_loaded(None, start);
        let mut last = start;
        for lock in confirmations {
            vm.confirm_write(None, lock);
            let now = vm.expected_lock();
            prop_assert!(now.is_some());
            if let Some(prev) = last {
                prop_assert!(now >= Some(prev));
            }
            last = now;
        }
    }

    /// Dirty iff some sheet has a non-empty change set; clearing resets it.
    #[test]
    fn dirty_matches_change_sets(
        first in proptest::collection::vec(arb_mutation(), 0..12),
        second in proptest::collection::vec(arb_mutation(), 0..12),
    ) {
        let mut wb = Workbook::new();
        wb.add_sheet_named("Data");
        for m in &first {
            apply_mutation(&mut wb, 0, m);
        }
        for m in &second {
            apply_mutation(&mut wb, 1, m);
        }

        let any_set = wb.sheets().iter().any(|s| {
            !s.dirty_cells().is_empty()
                || !s.dirty_rows().is_empty()
                || !s.inserted_rows().is_empty()
                || !s.deleted_rows().is_empty()
        });
        prop_assert_eq!(has_unsaved_changes(&wb), any_set);
        prop_assert_eq!(has_unsaved_changes(&wb), !first.is_empty() || !second.is_empty());
        prop_assert_eq!(sheet_is_dirty(wb.sheet(1).unwrap()), !second.is_empty());

        wb.clear_pending_changes();
        prop_assert!(!has_unsaved_changes(&wb));
    }

    /// A burst of mutations spaced closer than the quiet period fires exactly
    /// once, at the last mutation plus the quiet period.
    #[test]
    fn burst_yields_one_save(gaps in proptest::collection::vec(0u64..200, 1..20)) {
        let quiet = Duration::from_millis(2000);
        let step = Duration::from_millis(10);
        let t0 = Instant::now();
        let mut sched = AutosaveScheduler::new(quiet);

        // Mutation times in 10ms units, each gap under the quiet period
        let mut offsets = Vec::with_capacity(gaps.len());
        let mut at = 0u64;
        for g in gaps {
            at += g;
            offsets.push(at);
        }
        let last = *offsets.last().unwrap();

        let mut fired = Vec::new();
        let mut next = offsets.iter().peekable();
        for tick in 0..=(last + 400) {
            let now = t0 + step * tick as u32;
            while next.peek().is_some_and(|o| **o == tick) {
                sched.on_mutation(now);
                next.next();
            }
            if sched.poll(now) {
                fired.push(tick);
                sched.complete(now);
            }
        }
        prop_assert_eq!(fired, vec![last + 200]);
    }
}
