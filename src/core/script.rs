// RuleCheck - core/script.rs
//
// Rhai engine construction and the API rule scripts see.
//
// Every rule unit gets its own engine built here. The engine can only reach
// what is registered below: the dataset handle, the table type, and the Rhai
// standard packages. Module imports are disabled so a script cannot pull in
// other files from the host, and print/debug output goes to tracing instead
// of stdout.
//
// Conversion between script values (`Dynamic`) and the core model also lives
// here, including classification of the entry point's return value into a
// `ResultShape`.

use crate::core::finding;
use crate::core::model::{Cell, Dataset, NamedTable, ResultShape, ResultValue};
use crate::util::constants;
use rhai::module_resolvers::DummyModuleResolver;
use rhai::{Array, Dynamic, Engine, EvalAltResult, ImmutableString, Map, INT};

type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

// =============================================================================
// Engine limits
// =============================================================================

/// Resource limits applied to every rule script engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits {
    pub max_operations: u64,
    pub max_call_levels: usize,
    pub max_expr_depth: usize,
    pub max_function_expr_depth: usize,
    pub max_string_size: usize,
    pub max_array_size: usize,
    pub max_map_size: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_operations: constants::DEFAULT_MAX_OPERATIONS,
            max_call_levels: constants::DEFAULT_MAX_CALL_LEVELS,
            max_expr_depth: constants::DEFAULT_MAX_EXPR_DEPTH,
            max_function_expr_depth: constants::DEFAULT_MAX_FUNCTION_EXPR_DEPTH,
            max_string_size: constants::DEFAULT_MAX_STRING_SIZE,
            max_array_size: constants::DEFAULT_MAX_ARRAY_SIZE,
            max_map_size: constants::DEFAULT_MAX_MAP_SIZE,
        }
    }
}

/// Build an isolated engine with the rule script API registered.
pub fn build_engine(limits: &EngineLimits) -> Engine {
    let mut engine = Engine::new();

    engine.set_module_resolver(DummyModuleResolver::new());
    engine.set_max_operations(limits.max_operations);
    engine.set_max_call_levels(limits.max_call_levels);
    engine.set_max_expr_depths(limits.max_expr_depth, limits.max_function_expr_depth);
    engine.set_max_string_size(limits.max_string_size);
    engine.set_max_array_size(limits.max_array_size);
    engine.set_max_map_size(limits.max_map_size);

    engine.on_print(|text| {
        tracing::info!(target: constants::SCRIPT_LOG_TARGET, "{text}");
    });
    engine.on_debug(|text, source, pos| {
        tracing::debug!(
            target: constants::SCRIPT_LOG_TARGET,
            source = source.unwrap_or(""),
            position = %pos,
            "{text}"
        );
    });

    register_dataset_api(&mut engine);
    register_table_api(&mut engine);

    engine
}

// =============================================================================
// Script API
// =============================================================================

fn register_dataset_api(engine: &mut Engine) {
    engine
        .register_type_with_name::<Dataset>("Dataset")
        .register_get("kind", |ds: &mut Dataset| ds.kind.label().to_string())
        .register_fn("len", |ds: &mut Dataset| ds.sheets.len() as INT)
        .register_fn("sheet_names", |ds: &mut Dataset| -> Array {
            ds.sheets
                .iter()
                .map(|(name, _)| Dynamic::from(name.clone()))
                .collect()
        })
        .register_fn(
            "sheet",
            |ds: &mut Dataset, name: ImmutableString| -> ScriptResult<NamedTable> {
                ds.sheet(&name)
                    .cloned()
                    .ok_or_else(|| format!("dataset has no sheet named '{name}'").into())
            },
        )
        .register_fn("first_sheet", |ds: &mut Dataset| -> ScriptResult<NamedTable> {
            ds.first_sheet()
                .map(|(_, table)| table.clone())
                .ok_or_else(|| "dataset has no sheets".into())
        });
}

fn register_table_api(engine: &mut Engine) {
    engine
        .register_type_with_name::<NamedTable>("Table")
        .register_fn("table", NamedTable::default)
        .register_fn("table", |columns: Array| {
            NamedTable::new(columns.iter().map(column_name))
        })
        .register_get("columns", |t: &mut NamedTable| -> Array {
            t.columns()
                .iter()
                .map(|c| Dynamic::from(c.clone()))
                .collect()
        })
        .register_fn("len", |t: &mut NamedTable| t.len() as INT)
        .register_fn("is_empty", |t: &mut NamedTable| t.is_empty())
        .register_fn("rows", |t: &mut NamedTable| -> Array {
            t.rows()
                .iter()
                .map(|row| Dynamic::from_map(row_to_map(t.columns(), row)))
                .collect()
        })
        .register_fn("row", |t: &mut NamedTable, index: INT| -> ScriptResult<Map> {
            let idx = row_index(t, index)?;
            Ok(row_to_map(t.columns(), &t.rows()[idx]))
        })
        .register_indexer_get(|t: &mut NamedTable, index: INT| -> ScriptResult<Map> {
            let idx = row_index(t, index)?;
            Ok(row_to_map(t.columns(), &t.rows()[idx]))
        })
        .register_fn(
            "column",
            |t: &mut NamedTable, name: ImmutableString| -> ScriptResult<Array> {
                t.column_values(&name)
                    .map(|cells| cells.iter().map(cell_to_dynamic).collect())
                    .ok_or_else(|| format!("table has no column named '{name}'").into())
            },
        )
        .register_fn("push", |t: &mut NamedTable, record: Map| {
            t.push_record(
                record
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), cell_from_dynamic(v))),
            );
        })
        .register_fn("push", |t: &mut NamedTable, row: Array| {
            t.push_row(row.into_iter().map(cell_from_dynamic).collect());
        })
        .register_fn("add_column", |t: &mut NamedTable, name: ImmutableString| {
            t.add_column(&name);
        })
        .register_fn(
            "get",
            |t: &mut NamedTable, index: INT, column: ImmutableString| -> ScriptResult<Dynamic> {
                let row = row_index(t, index)?;
                let col = column_index(t, &column)?;
                Ok(t.cell(row, col).map(cell_to_dynamic).unwrap_or(Dynamic::UNIT))
            },
        )
        .register_fn(
            "set",
            |t: &mut NamedTable,
             index: INT,
             column: ImmutableString,
             value: Dynamic|
             -> ScriptResult<()> {
                let row = row_index(t, index)?;
                let col = t.add_column(&column);
                t.set_cell(row, col, cell_from_dynamic(value));
                Ok(())
            },
        )
        .register_fn("findings", |t: &mut NamedTable| t.filtered(true))
        .register_fn("finding_count", |t: &mut NamedTable| {
            finding::count_findings(t) as INT
        })
        .register_fn("to_string", |t: &mut NamedTable| {
            format!("Table({} columns, {} rows)", t.columns().len(), t.len())
        })
        .register_fn("to_debug", |t: &mut NamedTable| {
            format!("Table(columns: {:?}, rows: {})", t.columns(), t.len())
        });
}

fn row_index(t: &NamedTable, index: INT) -> ScriptResult<usize> {
    usize::try_from(index)
        .ok()
        .filter(|&i| i < t.len())
        .ok_or_else(|| format!("row index {index} out of range (table has {} rows)", t.len()).into())
}

fn column_index(t: &NamedTable, name: &str) -> ScriptResult<usize> {
    t.column_index(name)
        .ok_or_else(|| format!("table has no column named '{name}'").into())
}

fn column_name(value: &Dynamic) -> String {
    if value.is_string() {
        value.clone().into_string().unwrap_or_default()
    } else {
        value.to_string()
    }
}

// =============================================================================
// Value conversion
// =============================================================================

/// Convert a script value to a cell. Unit becomes `Empty`; non-scalar values
/// are stored as their rendered text.
pub fn cell_from_dynamic(value: Dynamic) -> Cell {
    if value.is_unit() {
        Cell::Empty
    } else if let Ok(b) = value.as_bool() {
        Cell::Bool(b)
    } else if let Ok(i) = value.as_int() {
        Cell::Integer(i)
    } else if let Ok(f) = value.as_float() {
        Cell::Number(f)
    } else if value.is_string() {
        Cell::Text(value.into_string().unwrap_or_default())
    } else {
        Cell::Text(value.to_string())
    }
}

pub fn cell_to_dynamic(cell: &Cell) -> Dynamic {
    match cell {
        Cell::Empty => Dynamic::UNIT,
        Cell::Text(s) => Dynamic::from(s.clone()),
        Cell::Integer(i) => Dynamic::from(*i),
        Cell::Number(f) => Dynamic::from(*f),
        Cell::Bool(b) => Dynamic::from(*b),
    }
}

fn row_to_map(columns: &[String], row: &[Cell]) -> Map {
    columns
        .iter()
        .zip(row)
        .map(|(name, cell)| (name.as_str().into(), cell_to_dynamic(cell)))
        .collect()
}

/// Rendered form of an arbitrary script value for diagnostics.
pub fn render_value(value: &Dynamic) -> String {
    if value.is_unit() {
        "()".to_string()
    } else {
        value.to_string()
    }
}

/// Classify the value returned by the entry point.
pub fn classify_result(engine: &Engine, value: Dynamic) -> ResultShape {
    if value.is::<NamedTable>() {
        return ResultShape::Single(value.cast::<NamedTable>());
    }

    if value.is_map() {
        let entries = value
            .cast::<Map>()
            .into_iter()
            .map(|(name, v)| {
                let content = if v.is::<NamedTable>() {
                    ResultValue::Table(v.cast::<NamedTable>())
                } else {
                    ResultValue::Other {
                        type_name: engine.map_type_name(v.type_name()).to_string(),
                        value: render_value(&v),
                    }
                };
                (name.to_string(), content)
            })
            .collect();
        return ResultShape::Mapping(entries);
    }

    ResultShape::Unsupported {
        type_name: engine.map_type_name(value.type_name()).to_string(),
        value: render_value(&value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::DatasetKind;

    fn dataset() -> Dataset {
        Dataset {
            kind: DatasetKind::Csv,
            sheets: vec![(
                "Sheet1".to_string(),
                NamedTable::from_rows(
                    ["id", "date"],
                    vec![
                        vec![Cell::Integer(1), Cell::from("2024-01-01")],
                        vec![Cell::Integer(2), Cell::Empty],
                    ],
                ),
            )],
        }
    }

    fn eval_with_dataset(script: &str) -> Result<Dynamic, Box<EvalAltResult>> {
        let engine = build_engine(&EngineLimits::default());
        let mut scope = rhai::Scope::new();
        scope.push("ds", dataset());
        engine.eval_with_scope::<Dynamic>(&mut scope, script)
    }

    #[test]
    fn test_script_reads_dataset() {
        let value = eval_with_dataset(
            r#"
            let t = ds.first_sheet();
            let out = table(["id", "Comment"]);
            for r in t.rows() {
                if r.date == () { out.push(#{ id: r.id, Comment: "missing date" }); }
            }
            out
            "#,
        )
        .unwrap();
        let table = value.cast::<NamedTable>();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0], vec![Cell::Integer(2), Cell::from("missing date")]);
    }

    #[test]
    fn test_missing_sheet_is_script_error() {
        let err = eval_with_dataset(r#"ds.sheet("Nope")"#).unwrap_err();
        assert!(err.to_string().contains("Nope"));
    }

    #[test]
    fn test_set_adds_column_and_findings_filter() {
        let value = eval_with_dataset(
            r#"
            let t = ds.sheet("Sheet1");
            t.set(1, "Date_Error", "blank");
            [t.finding_count(), t.findings().len(), t.columns.len()]
            "#,
        )
        .unwrap();
        let counts: Vec<INT> = value
            .cast::<Array>()
            .into_iter()
            .map(|v| v.as_int().unwrap())
            .collect();
        assert_eq!(counts, vec![1, 1, 3]);
    }

    #[test]
    fn test_imports_are_disabled() {
        let engine = build_engine(&EngineLimits::default());
        let result = engine.run(r#"import "secrets" as s;"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_operation_limit_stops_runaway_loop() {
        let limits = EngineLimits {
            max_operations: 10_000,
            ..Default::default()
        };
        let engine = build_engine(&limits);
        assert!(engine.run("loop { }").is_err());
    }

    #[test]
    fn test_classify_shapes() {
        let engine = build_engine(&EngineLimits::default());

        let single = engine.eval::<Dynamic>(r#"table(["a"])"#).unwrap();
        assert!(matches!(classify_result(&engine, single), ResultShape::Single(_)));

        let mapping = engine
            .eval::<Dynamic>(r#"#{ Dates: table(["a"]), Note: "text" }"#)
            .unwrap();
        match classify_result(&engine, mapping) {
            ResultShape::Mapping(entries) => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0].0, "Dates");
                assert!(matches!(entries[0].1, ResultValue::Table(_)));
                assert!(matches!(
                    &entries[1].1,
                    ResultValue::Other { value, .. } if value == "text"
                ));
            }
            other => panic!("expected mapping, got {other:?}"),
        }

        let scalar = engine.eval::<Dynamic>("42").unwrap();
        assert!(matches!(
            classify_result(&engine, scalar),
            ResultShape::Unsupported { value, .. } if value == "42"
        ));

        let unit = engine.eval::<Dynamic>("()").unwrap();
        assert!(matches!(
            classify_result(&engine, unit),
            ResultShape::Unsupported { value, .. } if value == "()"
        ));
    }

    #[test]
    fn test_cell_conversion() {
        assert_eq!(cell_from_dynamic(Dynamic::UNIT), Cell::Empty);
        assert_eq!(cell_from_dynamic(Dynamic::from(7_i64)), Cell::Integer(7));
        assert_eq!(cell_from_dynamic(Dynamic::from(true)), Cell::Bool(true));
        assert_eq!(cell_from_dynamic(Dynamic::from("x".to_string())), Cell::from("x"));
        assert_eq!(cell_to_dynamic(&Cell::Number(1.5)).as_float().unwrap(), 1.5);
    }
}
