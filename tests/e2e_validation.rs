// RuleCheck - tests/e2e_validation.rs
//
// End-to-end tests for the load -> run -> normalize -> export pipeline.
//
// These tests use real rule scripts from tests/fixtures, real CSV parsing,
// real xlsx workbooks written with rust_xlsxwriter and read back with
// calamine, and real temporary files. No mocks, no stubs.

use rulecheck::app::loader;
use rulecheck::app::runner::{self, RunOutcome};
use rulecheck::core::dataset::{read_csv, read_dataset, read_spreadsheet};
use rulecheck::core::export::export_workbook;
use rulecheck::core::finding;
use rulecheck::core::model::{Cell, Dataset, DatasetKind, NamedTable, NormalizedResults};
use rulecheck::core::script::EngineLimits;
use rulecheck::platform::fs::{read_dataset_file, read_script_file, write_atomic};
use rulecheck::util::constants;
use rulecheck::util::error::{LoadError, RunError};
use rust_xlsxwriter::Workbook;
use std::path::PathBuf;

// =============================================================================
// Helpers
// =============================================================================

/// Absolute path to the on-disk fixture files.
fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn script(name: &str) -> Vec<u8> {
    read_script_file(&fixture(name)).unwrap()
}

fn customers_csv() -> Dataset {
    let path = fixture("customers.csv");
    let kind = DatasetKind::from_path(&path).unwrap();
    let bytes = read_dataset_file(&path, constants::DEFAULT_MAX_DATASET_SIZE).unwrap();
    read_dataset(&bytes, kind).unwrap()
}

/// A two-sheet workbook: "Customers" with a repeated email, then "Notes".
fn customers_workbook() -> Dataset {
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Customers").unwrap();
    for (col, name) in ["id", "signup_date", "email"].iter().enumerate() {
        sheet.write_string(0, col as u16, *name).unwrap();
    }
    let rows = [
        (1.0, "2024-01-05", "alice@example.com"),
        (2.0, "2024-01-09", "bob@example.com"),
        (3.0, "2024-02-11", "alice@example.com"),
    ];
    for (r, (id, date, email)) in rows.iter().enumerate() {
        let r = (r + 1) as u32;
        sheet.write_number(r, 0, *id).unwrap();
        sheet.write_string(r, 1, *date).unwrap();
        sheet.write_string(r, 2, *email).unwrap();
    }

    let notes = workbook.add_worksheet();
    notes.set_name("Notes").unwrap();
    notes.write_string(0, 0, "note").unwrap();

    read_spreadsheet(&workbook.save_to_buffer().unwrap()).unwrap()
}

/// Cell at `row` in the column named `column`.
fn value<'a>(table: &'a NamedTable, row: usize, column: &str) -> Option<&'a Cell> {
    table.cell(row, table.column_index(column)?)
}

fn completed(outcome: RunOutcome) -> NormalizedResults {
    match outcome {
        RunOutcome::Completed(results) => results,
        other => panic!("expected a completed run, got {other:?}"),
    }
}

// =============================================================================
// Single table with a Comment column
// =============================================================================

/// 2 of 5 rows carry a comment: summary reports 5 rows, 2 findings, and the
/// export has exactly one sheet named "Validation".
#[test]
fn e2e_single_table_summary_and_export() {
    let results = completed(
        runner::validate(
            &script("comment_rules.rhai"),
            &customers_csv(),
            &EngineLimits::default(),
        )
        .unwrap(),
    );

    let summaries = results.summaries();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].name, "Validation");
    assert_eq!(summaries[0].total_rows, 5);
    assert_eq!(summaries[0].finding_count, 2);

    let table = results.entries[0].table().unwrap();
    let flagged = finding::filter_rows(table, true);
    assert_eq!(flagged, vec![1, 3]);
    assert_eq!(value(table, 1, "Comment"), Some(&Cell::from("missing signup date")));
    assert_eq!(
        value(table, 3, "Comment"),
        Some(&Cell::from("duplicate email (first seen on id 1)"))
    );

    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join(constants::DEFAULT_REPORT_FILE_NAME);
    write_atomic(&report, &export_workbook(&results).unwrap()).unwrap();

    let exported = read_spreadsheet(&std::fs::read(&report).unwrap()).unwrap();
    assert_eq!(exported.sheet_names(), vec!["Validation"]);
    let sheet = exported.sheet("Validation").unwrap();
    assert_eq!(sheet.columns(), &["id", "name", "Comment"]);
    assert_eq!(sheet.len(), 5);
    assert_eq!(finding::count_findings(sheet), 2);
}

// =============================================================================
// Mapping of named tables
// =============================================================================

/// A table without indicator columns counts zero findings; both names become
/// sheets in mapping order.
#[test]
fn e2e_mapping_of_tables_from_spreadsheet() {
    let dataset = customers_workbook();
    assert_eq!(dataset.sheet_names(), vec!["Customers", "Notes"]);

    let results = completed(
        runner::validate(
            &script("sheet_rules.rhai"),
            &dataset,
            &EngineLimits::default(),
        )
        .unwrap(),
    );

    let summaries = results.summaries();
    assert_eq!(summaries[0].name, "Dates");
    assert_eq!(summaries[0].total_rows, 3);
    assert_eq!(summaries[0].finding_count, 0);
    assert_eq!(summaries[1].name, "Duplicates");
    assert_eq!(summaries[1].total_rows, 1);
    assert_eq!(summaries[1].finding_count, 1);

    let dates = results.entries[0].table().unwrap();
    assert_eq!(value(dates, 0, "id"), Some(&Cell::Integer(1)));

    let exported = read_spreadsheet(&export_workbook(&results).unwrap()).unwrap();
    assert_eq!(exported.sheet_names(), vec!["Dates", "Duplicates"]);
}

// =============================================================================
// Failures
// =============================================================================

/// A script error inside check_rules is captured, produces no tables, and
/// leaves nothing to export.
#[test]
fn e2e_exception_in_check_rules_is_captured() {
    let outcome = runner::validate(
        &script("throwing_rules.rhai"),
        &customers_csv(),
        &EngineLimits::default(),
    )
    .unwrap();

    match outcome {
        RunOutcome::Failed(RunError::RuleExecutionFailed { diagnostic }) => {
            assert!(diagnostic.contains("date column could not be parsed"));
        }
        other => panic!("expected RuleExecutionFailed, got {other:?}"),
    }
}

/// Without check_rules the unit is flagged and never run.
#[test]
fn e2e_missing_entry_point_is_reported() {
    let unit = loader::load(&script("no_entry_point.rhai"), &EngineLimits::default()).unwrap();
    assert!(unit.entry_point_missing);
    assert_eq!(unit.function_names(), vec!["check".to_string()]);

    let outcome = runner::validate(
        &script("no_entry_point.rhai"),
        &customers_csv(),
        &EngineLimits::default(),
    )
    .unwrap();
    assert!(matches!(outcome, RunOutcome::EntryPointMissing));
}

/// A scalar result is rejected with its rendered value.
#[test]
fn e2e_scalar_result_is_unsupported() {
    let outcome = runner::validate(
        &script("scalar_rules.rhai"),
        &customers_csv(),
        &EngineLimits::default(),
    )
    .unwrap();

    match outcome {
        RunOutcome::Failed(RunError::UnsupportedResultShape { value, .. }) => {
            assert_eq!(value, "42");
        }
        other => panic!("expected UnsupportedResultShape, got {other:?}"),
    }
}

/// Syntax errors surface as load failures, before any run.
#[test]
fn e2e_syntax_error_fails_load() {
    let result = runner::validate(
        b"fn check_rules(ds) { ds.first_sheet( }",
        &customers_csv(),
        &EngineLimits::default(),
    );
    assert!(matches!(result, Err(LoadError::CompileFailed { .. })));
}

// =============================================================================
// Artifact lifecycle and isolation
// =============================================================================

/// Successful and failed loads both leave the artifact directory empty.
#[test]
fn e2e_artifacts_removed_on_every_path() {
    let dir = tempfile::tempdir().unwrap();
    let limits = EngineLimits::default();

    for name in [
        "comment_rules.rhai",
        "no_entry_point.rhai",
        "scalar_rules.rhai",
    ] {
        let unit = loader::load_in(dir.path(), &script(name), &limits).unwrap();
        assert!(!unit.artifact_path.exists(), "{name} left its artifact behind");
    }
    assert!(loader::load_in(dir.path(), b"fn (", &limits).is_err());

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

/// A top-level value reaches its own unit's check_rules but never leaks into
/// a unit loaded afterwards from a different script.
#[test]
fn e2e_units_are_isolated() {
    let limits = EngineLimits::default();
    let csv = read_csv(b"id\n1\n").unwrap();

    let first = br#"
        let marker = "first";
        fn check_rules(ds) {
            let t = table(["Comment"]);
            t.push([marker]);
            t
        }
    "#;
    let second = br#"
        fn check_rules(ds) {
            let t = table(["Comment"]);
            t.push([marker]);
            t
        }
    "#;

    let results = completed(runner::validate(first, &csv, &limits).unwrap());
    let table = results.entries[0].table().unwrap();
    assert_eq!(value(table, 0, "Comment"), Some(&Cell::from("first")));

    match runner::validate(second, &csv, &limits).unwrap() {
        RunOutcome::Failed(RunError::RuleExecutionFailed { diagnostic }) => {
            assert!(diagnostic.contains("marker"), "{diagnostic}");
        }
        other => panic!("expected RuleExecutionFailed, got {other:?}"),
    }

    // Loading the first script again still sees only its own value.
    let again = completed(runner::validate(first, &csv, &limits).unwrap());
    assert_eq!(again, results);
}
