// RuleCheck - core/finding.rs
//
// The one finding predicate. Summary counts and findings-only row filters
// both go through `is_finding`, so displayed counts and displayed rows
// cannot drift apart.
// Core layer: pure logic, no I/O or script engine dependencies.

use crate::core::model::{Cell, NamedTable};
use crate::util::constants::{COMMENT_COLUMN, INDICATOR_SUBSTRINGS, INDICATOR_SUFFIX};

/// Which columns of a table decide whether a row is a finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindingColumns {
    /// A `Comment` column exists; it alone is consulted.
    Comment(usize),
    /// Error / Duplicate / `_check` columns; any non-blank one flags the row.
    Indicators(Vec<usize>),
    /// No indicator columns: no row is ever a finding.
    None,
}

impl FindingColumns {
    /// Resolve the indicator columns for a column list.
    pub fn resolve(columns: &[String]) -> Self {
        if let Some(idx) = columns.iter().position(|c| c == COMMENT_COLUMN) {
            return FindingColumns::Comment(idx);
        }
        let indicators: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, name)| is_indicator_column(name))
            .map(|(idx, _)| idx)
            .collect();
        if indicators.is_empty() {
            FindingColumns::None
        } else {
            FindingColumns::Indicators(indicators)
        }
    }

    /// Check a single row against the resolved columns.
    pub fn is_finding(&self, row: &[Cell]) -> bool {
        let flagged = |idx: &usize| row.get(*idx).is_some_and(|c| !c.is_blank());
        match self {
            FindingColumns::Comment(idx) => flagged(idx),
            FindingColumns::Indicators(indices) => indices.iter().any(flagged),
            FindingColumns::None => false,
        }
    }
}

/// True for an Error / Duplicate / `_check` column name. `Comment` is
/// handled separately because it takes precedence over all of these.
pub fn is_indicator_column(name: &str) -> bool {
    INDICATOR_SUBSTRINGS.iter().any(|s| name.contains(s))
        || name.to_lowercase().ends_with(INDICATOR_SUFFIX)
}

/// Check whether row `row` of `table` is a finding.
///
/// Convenience for single lookups; bulk callers should resolve
/// `FindingColumns` once and reuse it.
pub fn is_finding(table: &NamedTable, row: usize) -> bool {
    table
        .rows()
        .get(row)
        .is_some_and(|r| FindingColumns::resolve(table.columns()).is_finding(r))
}

/// Number of rows in `table` that are findings.
pub fn count_findings(table: &NamedTable) -> usize {
    let cols = FindingColumns::resolve(table.columns());
    table.rows().iter().filter(|r| cols.is_finding(r)).count()
}

/// Apply the findings-only filter, returning indices of matching rows.
///
/// With `findings_only == false` every row matches. Returning indices
/// avoids copying rows when the caller only needs to page through them.
pub fn filter_rows(table: &NamedTable, findings_only: bool) -> Vec<usize> {
    if !findings_only {
        return (0..table.len()).collect();
    }
    let cols = FindingColumns::resolve(table.columns());
    table
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| cols.is_finding(row))
        .map(|(idx, _)| idx)
        .collect()
}

impl NamedTable {
    /// Copy of this table restricted by the findings-only filter.
    pub fn filtered(&self, findings_only: bool) -> NamedTable {
        self.select_rows(&filter_rows(self, findings_only))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: &[&[&str]]) -> NamedTable {
        NamedTable::from_rows(
            columns.iter().copied(),
            rows.iter()
                .map(|r| r.iter().map(|s| Cell::infer(s)).collect())
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_comment_column_counts_non_blank() {
        let t = table(
            &["id", "Comment"],
            &[&["1", "bad date"], &["2", ""], &["3", "   "], &["4", "dup"], &["5", ""]],
        );
        assert_eq!(count_findings(&t), 2);
        assert_eq!(filter_rows(&t, true), vec![0, 3]);
    }

    #[test]
    fn test_comment_takes_precedence_over_indicators() {
        let t = table(
            &["Comment", "Date_Error", "amount_check"],
            &[&["", "late", "x"], &["flagged", "", ""], &["", "", ""]],
        );
        // Indicator columns are ignored entirely when Comment exists.
        assert_eq!(count_findings(&t), 1);
        assert_eq!(filter_rows(&t, true), vec![1]);
    }

    #[test]
    fn test_indicator_columns_any_non_blank() {
        let t = table(
            &["id", "Date_Error", "Duplicate ID", "Amount_CHECK"],
            &[
                &["1", "", "", ""],
                &["2", "late", "", ""],
                &["3", "", "yes", ""],
                &["4", "", "", "over"],
                &["5", " ", "", ""],
            ],
        );
        assert_eq!(count_findings(&t), 3);
        assert_eq!(filter_rows(&t, true), vec![1, 2, 3]);
    }

    #[test]
    fn test_indicator_substrings_are_case_sensitive() {
        assert!(is_indicator_column("ParseError"));
        assert!(!is_indicator_column("parse_error"));
        assert!(is_indicator_column("Duplicates"));
        assert!(!is_indicator_column("duplicates"));
        assert!(is_indicator_column("total_Check"));
        assert!(!is_indicator_column("checked"));
    }

    #[test]
    fn test_no_indicator_columns_means_zero() {
        let t = table(&["id", "date"], &[&["1", "2024-01-01"], &["2", "x"]]);
        assert_eq!(FindingColumns::resolve(t.columns()), FindingColumns::None);
        assert_eq!(count_findings(&t), 0);
        assert!(filter_rows(&t, true).is_empty());
    }

    #[test]
    fn test_filter_without_flag_returns_all() {
        let t = table(&["Comment"], &[&[""], &["x"]]);
        assert_eq!(filter_rows(&t, false), vec![0, 1]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let t = table(
            &["id", "Error"],
            &[&["1", "e"], &["2", ""], &["3", "e"], &["4", ""]],
        );
        let once = t.filtered(true);
        let twice = once.filtered(true);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
    }

    #[test]
    fn test_filtered_count_matches_summary_count() {
        let t = table(
            &["a_check", "b"],
            &[&["x", ""], &["", "y"], &["z", "y"]],
        );
        assert_eq!(t.filtered(true).len(), count_findings(&t));
    }

    #[test]
    fn test_numeric_indicator_values_are_findings() {
        let t = NamedTable::from_rows(
            ["Error"],
            vec![vec![Cell::Integer(0)], vec![Cell::Empty]],
        );
        assert!(is_finding(&t, 0));
        assert!(!is_finding(&t, 1));
        assert!(!is_finding(&t, 5));
    }
}
