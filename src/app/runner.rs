// RuleCheck - app/runner.rs
//
// Validation run: invoke a loaded rule unit against a dataset and normalize
// whatever it returns.
//
// The call chain is synchronous and single-threaded:
//   load -> entry point check -> invoke -> classify -> normalize.
// Every failure is returned as a value; nothing raised inside the script
// escapes as a panic.

use crate::app::loader::{self, RuleUnit};
use crate::core::model::{Dataset, NormalizedResults};
use crate::core::normalizer;
use crate::core::script::{self, EngineLimits};
use crate::util::constants::ENTRY_POINT;
use crate::util::error::{LoadError, RunError};
use rhai::{CallFnOptions, Dynamic, Scope};
use std::time::Instant;

/// Result of a complete validation run that got past loading.
#[derive(Debug)]
pub enum RunOutcome {
    /// The script loaded but has no `check_rules(dataset)`. Nothing was run.
    EntryPointMissing,
    /// The script ran but failed or returned an unsupported value.
    Failed(RunError),
    /// The script ran and its result was normalized.
    Completed(NormalizedResults),
}

/// Invoke `check_rules(dataset)` on a loaded unit and normalize the result.
///
/// Top-level statements are not re-run; they ran once at load time and
/// their variables reach `check_rules` through the unit's engine. Each run
/// starts from an empty scope so a run never changes the unit itself.
pub fn run(unit: &RuleUnit, dataset: &Dataset) -> Result<NormalizedResults, RunError> {
    let started = Instant::now();
    let mut scope = Scope::new();
    let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);

    let value = unit
        .engine
        .call_fn_with_options::<Dynamic>(
            options,
            &mut scope,
            &unit.ast,
            ENTRY_POINT,
            (dataset.clone(),),
        )
        .map_err(|e| {
            tracing::warn!(error = %e, "check_rules raised an error");
            RunError::RuleExecutionFailed {
                diagnostic: e.to_string(),
            }
        })?;

    let shape = script::classify_result(&unit.engine, value);
    let results = normalizer::normalize(shape).map_err(|e| {
        tracing::warn!(error = %e, "check_rules returned an unsupported value");
        e
    })?;

    let totals = results.aggregate();
    tracing::info!(
        entries = results.entries.len(),
        sheets = totals.total_sheets,
        rows = totals.total_rows,
        findings = totals.total_findings,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Validation run complete"
    );

    Ok(results)
}

/// Load a script and, if it exposes the entry point, run it.
///
/// Load failures are returned as `Err`; everything after a successful load
/// is reported through `RunOutcome`. The unit (and with it the script's
/// engine and globals) is dropped before this returns.
pub fn validate(
    script: &[u8],
    dataset: &Dataset,
    limits: &EngineLimits,
) -> Result<RunOutcome, LoadError> {
    let unit = loader::load(script, limits)?;

    if unit.entry_point_missing {
        tracing::warn!(
            functions = ?unit.function_names(),
            "Rule script does not define check_rules(dataset); not running"
        );
        return Ok(RunOutcome::EntryPointMissing);
    }

    Ok(match run(&unit, dataset) {
        Ok(results) => RunOutcome::Completed(results),
        Err(e) => RunOutcome::Failed(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{Cell, DatasetKind, NamedTable};

    fn dataset() -> Dataset {
        Dataset {
            kind: DatasetKind::Csv,
            sheets: vec![(
                "Sheet1".to_string(),
                NamedTable::from_rows(["id"], vec![vec![Cell::Integer(1)]]),
            )],
        }
    }

    fn outcome(script: &str) -> RunOutcome {
        validate(script.as_bytes(), &dataset(), &EngineLimits::default()).unwrap()
    }

    #[test]
    fn test_entry_point_can_call_helpers() {
        let script = r#"
            fn label(id) { `id ${id} seen` }
            fn check_rules(ds) {
                let t = table(["Comment"]);
                for r in ds.first_sheet().rows() { t.push([label(r.id)]); }
                t
            }
        "#;
        match outcome(script) {
            RunOutcome::Completed(results) => {
                let (_, table) = results.tables().next().unwrap();
                assert_eq!(table.rows()[0][0], Cell::from("id 1 seen"));
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[test]
    fn test_top_level_values_visible_in_entry_point() {
        let script = r#"
            const LABEL = "flag";
            let threshold = 0;
            fn check_rules(ds) {
                let t = table(["id", "Comment"]);
                for r in ds.first_sheet().rows() {
                    if r.id > threshold { t.push([r.id, LABEL]); }
                }
                t
            }
        "#;
        let unit = loader::load(script.as_bytes(), &EngineLimits::default()).unwrap();
        assert_eq!(unit.globals, vec!["LABEL".to_string(), "threshold".to_string()]);

        let results = run(&unit, &dataset()).unwrap();
        let table = results.entries[0].table().unwrap();
        assert_eq!(table.rows(), &[vec![Cell::Integer(1), Cell::from("flag")]]);

        // A second run sees the same values.
        let again = run(&unit, &dataset()).unwrap();
        assert_eq!(again, results);
    }

    #[test]
    fn test_parameter_shadows_top_level_value() {
        let script = r#"
            let ds = "not the dataset";
            fn check_rules(ds) { ds.first_sheet() }
        "#;
        assert!(matches!(outcome(script), RunOutcome::Completed(_)));
    }

    #[test]
    fn test_run_does_not_mutate_dataset() {
        let ds = dataset();
        let unit = loader::load(
            br#"fn check_rules(ds) { let t = ds.first_sheet(); t.set(0, "id", 99); t }"#,
            &EngineLimits::default(),
        )
        .unwrap();
        let results = run(&unit, &ds).unwrap();
        assert_eq!(results.entries[0].table().unwrap().rows()[0][0], Cell::Integer(99));
        assert_eq!(ds, dataset());
    }

    #[test]
    fn test_throw_is_rule_execution_failed() {
        match outcome(r#"fn check_rules(ds) { throw "bad rule"; }"#) {
            RunOutcome::Failed(RunError::RuleExecutionFailed { diagnostic }) => {
                assert!(diagnostic.contains("bad rule"));
            }
            other => panic!("expected RuleExecutionFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_runaway_script_is_stopped() {
        let limits = EngineLimits {
            max_operations: 50_000,
            ..Default::default()
        };
        let result = validate(b"fn check_rules(ds) { loop {} }", &dataset(), &limits).unwrap();
        assert!(matches!(
            result,
            RunOutcome::Failed(RunError::RuleExecutionFailed { .. })
        ));
    }

    #[test]
    fn test_missing_entry_point_is_not_run() {
        let script = r#"fn helper(ds) { throw "must not run"; }"#;
        assert!(matches!(outcome(script), RunOutcome::EntryPointMissing));
    }

    #[test]
    fn test_unit_result_is_unsupported() {
        match outcome("fn check_rules(ds) { }") {
            RunOutcome::Failed(RunError::UnsupportedResultShape { value, .. }) => {
                assert_eq!(value, "()");
            }
            other => panic!("expected UnsupportedResultShape, got {other:?}"),
        }
    }
}
