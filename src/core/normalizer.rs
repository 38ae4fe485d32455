// RuleCheck - core/normalizer.rs
//
// Turns a classified rule-script result into named tables and derives the
// per-entry summaries and aggregate totals.
// Core layer: pure logic over the model types.

use crate::core::finding;
use crate::core::model::{
    Aggregate, EntryContent, NormalizedEntry, NormalizedResults, ResultShape, ResultValue, Summary,
};
use crate::util::constants::SINGLE_RESULT_NAME;
use crate::util::error::RunError;

/// Normalize a result shape.
///
/// - a single table becomes `{"Validation": table}`;
/// - a mapping is kept in order, with non-table values carried as
///   `NonTabular` entries rather than rejected;
/// - anything else is `RunError::UnsupportedResultShape`.
pub fn normalize(shape: ResultShape) -> Result<NormalizedResults, RunError> {
    let entries = match shape {
        ResultShape::Single(table) => vec![NormalizedEntry {
            name: SINGLE_RESULT_NAME.to_string(),
            content: EntryContent::Table(table),
        }],
        ResultShape::Mapping(values) => values
            .into_iter()
            .map(|(name, value)| NormalizedEntry {
                name,
                content: match value {
                    ResultValue::Table(table) => EntryContent::Table(table),
                    ResultValue::Other { type_name, value } => {
                        EntryContent::NonTabular { type_name, value }
                    }
                },
            })
            .collect(),
        ResultShape::Unsupported { type_name, value } => {
            return Err(RunError::UnsupportedResultShape { type_name, value });
        }
    };

    let non_tabular = entries.iter().filter(|e| e.is_non_tabular()).count();
    if non_tabular > 0 {
        tracing::warn!(
            entries = entries.len(),
            non_tabular,
            "Rule result contains non-tabular entries"
        );
    }

    Ok(NormalizedResults { entries })
}

impl NormalizedResults {
    /// One summary per entry, in entry order.
    pub fn summaries(&self) -> Vec<Summary> {
        self.entries.iter().map(summarize).collect()
    }

    /// Totals over the tabular entries.
    pub fn aggregate(&self) -> Aggregate {
        self.tables().fold(Aggregate::default(), |mut acc, (_, table)| {
            acc.total_sheets += 1;
            acc.total_rows += table.len();
            acc.total_findings += finding::count_findings(table);
            acc
        })
    }
}

/// Summary for a single entry.
pub fn summarize(entry: &NormalizedEntry) -> Summary {
    match &entry.content {
        EntryContent::Table(table) => Summary {
            name: entry.name.clone(),
            total_rows: table.len(),
            finding_count: finding::count_findings(table),
            non_tabular: false,
        },
        EntryContent::NonTabular { .. } => Summary {
            name: entry.name.clone(),
            total_rows: 0,
            finding_count: 0,
            non_tabular: true,
        },
    }
}

/// Order summaries by descending finding count. Stable: entries with equal
/// counts keep their original relative order.
pub fn sort_by_findings(summaries: &mut [Summary]) {
    summaries.sort_by(|a, b| b.finding_count.cmp(&a.finding_count));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{Cell, NamedTable};

    fn comment_table(comments: &[&str]) -> NamedTable {
        NamedTable::from_rows(
            ["id", "Comment"],
            comments
                .iter()
                .enumerate()
                .map(|(i, c)| vec![Cell::Integer(i as i64), Cell::infer(c)])
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_single_table_named_validation() {
        let results = normalize(ResultShape::Single(comment_table(&["x", "", "", "y", ""]))).unwrap();
        assert_eq!(results.entries.len(), 1);
        assert_eq!(results.entries[0].name, "Validation");

        let summaries = results.summaries();
        assert_eq!(summaries[0].total_rows, 5);
        assert_eq!(summaries[0].finding_count, 2);
    }

    #[test]
    fn test_mapping_keeps_non_tabular_values() {
        let shape = ResultShape::Mapping(vec![
            ("Dates".to_string(), ResultValue::Table(NamedTable::new(["date"]))),
            (
                "Note".to_string(),
                ResultValue::Other {
                    type_name: "string".to_string(),
                    value: "all good".to_string(),
                },
            ),
        ]);
        let results = normalize(shape).unwrap();
        assert_eq!(results.entries.len(), 2);
        assert!(!results.entries[0].is_non_tabular());
        assert!(results.entries[1].is_non_tabular());

        let summaries = results.summaries();
        assert!(summaries[1].non_tabular);
        assert_eq!(summaries[1].total_rows, 0);

        // Only tables count towards the aggregate.
        assert_eq!(results.aggregate().total_sheets, 1);
    }

    #[test]
    fn test_unsupported_shape_is_reported() {
        let err = normalize(ResultShape::Unsupported {
            type_name: "i64".to_string(),
            value: "42".to_string(),
        })
        .unwrap_err();
        assert_eq!(
            err,
            RunError::UnsupportedResultShape {
                type_name: "i64".to_string(),
                value: "42".to_string()
            }
        );
    }

    #[test]
    fn test_aggregate_sums_tables() {
        let results = normalize(ResultShape::Mapping(vec![
            ("A".to_string(), ResultValue::Table(comment_table(&["x", ""]))),
            ("B".to_string(), ResultValue::Table(comment_table(&["x", "y", "z"]))),
        ]))
        .unwrap();
        assert_eq!(
            results.aggregate(),
            Aggregate {
                total_sheets: 2,
                total_rows: 5,
                total_findings: 4
            }
        );
    }

    #[test]
    fn test_empty_mapping_is_valid_but_not_exportable() {
        let results = normalize(ResultShape::Mapping(Vec::new())).unwrap();
        assert!(!results.is_exportable());
        assert_eq!(results.aggregate(), Aggregate::default());
    }

    #[test]
    fn test_sort_by_findings_is_stable() {
        let mk = |name: &str, findings: usize| Summary {
            name: name.to_string(),
            total_rows: 10,
            finding_count: findings,
            non_tabular: false,
        };
        let mut summaries = vec![mk("a", 1), mk("b", 3), mk("c", 1), mk("d", 3), mk("e", 0)];
        sort_by_findings(&mut summaries);
        let names: Vec<_> = summaries.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["b", "d", "a", "c", "e"]);
    }
}
