// RuleCheck - core/model.rs
//
// Core data model types. Pure data definitions with no I/O and no script
// engine dependencies.
//
// These types are the shared vocabulary across all layers: datasets flow
// into rule scripts as `NamedTable`s, results flow back out as
// `ResultShape`, and the normalizer turns those into `NormalizedResults`.

use serde::Serialize;
use std::borrow::Cow;
use std::fmt;

// =============================================================================
// Cell
// =============================================================================

/// A single table value.
///
/// Finding detection only ever looks at the textual form (`as_text`), so the
/// typed variants exist for faithful export and for scripts that compute on
/// numbers.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Integer(i64),
    Number(f64),
    Bool(bool),
}

impl Cell {
    /// Parse a raw text field, inferring integers and floats.
    /// Blank input becomes `Empty`; anything else non-numeric stays text.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Cell::Integer(i);
        }
        // "nan"/"inf" parse as floats but are almost always text in CSV data.
        if trimmed.chars().any(|c| c.is_ascii_digit()) {
            if let Ok(f) = trimmed.parse::<f64>() {
                return Cell::Number(f);
            }
        }
        Cell::Text(raw.to_string())
    }

    /// Textual form of the value. `Empty` renders as "".
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Cell::Empty => Cow::Borrowed(""),
            Cell::Text(s) => Cow::Borrowed(s.as_str()),
            Cell::Integer(i) => Cow::Owned(i.to_string()),
            Cell::Number(f) => Cow::Owned(f.to_string()),
            Cell::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
        }
    }

    /// True when the textual form is empty after trimming whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<i64> for Cell {
    fn from(i: i64) -> Self {
        Cell::Integer(i)
    }
}

impl From<f64> for Cell {
    fn from(f: f64) -> Self {
        Cell::Number(f)
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Bool(b)
    }
}

// =============================================================================
// NamedTable
// =============================================================================

/// Rows of cells under named, ordered columns.
///
/// Invariant: every row has exactly `columns.len()` cells. Constructors and
/// mutators pad short rows with `Empty` and drop surplus cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NamedTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl NamedTable {
    /// Create an empty table with the given columns.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Create a table from columns and rows, normalising row widths.
    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: impl IntoIterator<Item = Vec<Cell>>,
    ) -> Self {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first column with exactly this name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Append a row positionally.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Empty);
        self.rows.push(row);
    }

    /// Append a row given as `(column, value)` pairs. Columns not yet in the
    /// table are appended (existing rows get `Empty` there); columns missing
    /// from the record are left `Empty`.
    pub fn push_record(&mut self, record: impl IntoIterator<Item = (String, Cell)>) {
        let mut row = vec![Cell::Empty; self.columns.len()];
        for (name, value) in record {
            let idx = self.add_column(&name);
            if idx >= row.len() {
                row.resize(idx + 1, Cell::Empty);
            }
            row[idx] = value;
        }
        row.resize(self.columns.len(), Cell::Empty);
        self.rows.push(row);
    }

    /// Add a column if it is not present. Returns its index either way.
    pub fn add_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(Cell::Empty);
        }
        self.columns.len() - 1
    }

    /// Overwrite one cell. Returns false when the position is out of range.
    pub fn set_cell(&mut self, row: usize, column: usize, value: Cell) -> bool {
        match self.rows.get_mut(row).and_then(|r| r.get_mut(column)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// All values of a named column, in row order.
    pub fn column_values(&self, name: &str) -> Option<Vec<Cell>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx].clone()).collect())
    }

    /// New table containing the given rows (by index, in the given order).
    /// Out-of-range indices are skipped.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// New table with at most the first `n` rows.
    pub fn head(&self, n: usize) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }
}

// =============================================================================
// Dataset (input handle)
// =============================================================================

/// Source format of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    /// A single implicit table.
    Csv,
    /// One or more named sheets.
    Spreadsheet,
}

impl DatasetKind {
    pub fn label(&self) -> &'static str {
        match self {
            DatasetKind::Csv => "csv",
            DatasetKind::Spreadsheet => "spreadsheet",
        }
    }
}

/// Tabular input handed to a rule script. Never mutated by the core;
/// scripts receive their own clone.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub kind: DatasetKind,
    /// Sheets in container order. CSV datasets have exactly one.
    pub sheets: Vec<(String, NamedTable)>,
}

impl Dataset {
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&NamedTable> {
        self.sheets
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, table)| table)
    }

    pub fn first_sheet(&self) -> Option<(&str, &NamedTable)> {
        self.sheets
            .first()
            .map(|(name, table)| (name.as_str(), table))
    }

    /// First sheet's name and up to `rows` of its rows, for display only.
    pub fn preview(&self, rows: usize) -> Option<(&str, NamedTable)> {
        self.first_sheet()
            .map(|(name, table)| (name, table.head(rows)))
    }
}

// =============================================================================
// Result shapes (raw output of a rule script)
// =============================================================================

/// One value inside a mapping returned by a rule script.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultValue {
    Table(NamedTable),
    /// Anything that is not a table, kept as its rendered text.
    Other { type_name: String, value: String },
}

/// The raw return value of `check_rules`, already classified.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultShape {
    Single(NamedTable),
    Mapping(Vec<(String, ResultValue)>),
    Unsupported { type_name: String, value: String },
}

// =============================================================================
// Normalized results
// =============================================================================

/// Content of one normalized result entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryContent {
    Table(NamedTable),
    NonTabular { type_name: String, value: String },
}

/// A named result, ready for summary and export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedEntry {
    pub name: String,
    pub content: EntryContent,
}

impl NormalizedEntry {
    pub fn table(&self) -> Option<&NamedTable> {
        match &self.content {
            EntryContent::Table(t) => Some(t),
            EntryContent::NonTabular { .. } => None,
        }
    }

    /// True when the rule script put a non-table value under this name.
    pub fn is_non_tabular(&self) -> bool {
        matches!(self.content, EntryContent::NonTabular { .. })
    }
}

/// Named collection of result entries, in the order the script produced them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedResults {
    pub entries: Vec<NormalizedEntry>,
}

impl NormalizedResults {
    /// Iterate over the tabular entries only.
    pub fn tables(&self) -> impl Iterator<Item = (&str, &NamedTable)> {
        self.entries
            .iter()
            .filter_map(|e| e.table().map(|t| (e.name.as_str(), t)))
    }

    /// Whether there is anything worth offering as a report download.
    pub fn is_exportable(&self) -> bool {
        !self.entries.is_empty()
    }
}

// =============================================================================
// Summaries
// =============================================================================

/// Per-entry counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub name: String,
    pub total_rows: usize,
    pub finding_count: usize,
    /// Non-tabular entries always report zero rows and zero findings.
    pub non_tabular: bool,
}

/// Totals over all tabular entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Aggregate {
    pub total_sheets: usize,
    pub total_rows: usize,
    pub total_findings: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_cells() {
        assert_eq!(Cell::infer(""), Cell::Empty);
        assert_eq!(Cell::infer("   "), Cell::Empty);
        assert_eq!(Cell::infer("42"), Cell::Integer(42));
        assert_eq!(Cell::infer("-1.5"), Cell::Number(-1.5));
        assert_eq!(Cell::infer("nan"), Cell::Text("nan".to_string()));
        assert_eq!(Cell::infer("abc"), Cell::Text("abc".to_string()));
    }

    #[test]
    fn test_blank_cells() {
        assert!(Cell::Empty.is_blank());
        assert!(Cell::from(" \t ").is_blank());
        assert!(!Cell::from("x").is_blank());
        assert!(!Cell::Integer(0).is_blank());
        assert!(!Cell::Bool(false).is_blank());
    }

    #[test]
    fn test_rows_are_padded_and_truncated() {
        let table = NamedTable::from_rows(
            ["a", "b"],
            vec![vec![Cell::from("1")], vec!["1".into(), "2".into(), "3".into()]],
        );
        assert_eq!(table.rows()[0], vec![Cell::from("1"), Cell::Empty]);
        assert_eq!(table.rows()[1].len(), 2);
    }

    #[test]
    fn test_push_record_adds_new_columns() {
        let mut table = NamedTable::new(["id"]);
        table.push_row(vec![Cell::Integer(1)]);
        table.push_record(vec![
            ("id".to_string(), Cell::Integer(2)),
            ("Comment".to_string(), Cell::from("bad")),
        ]);
        assert_eq!(table.columns(), &["id".to_string(), "Comment".to_string()]);
        assert_eq!(table.rows()[0], vec![Cell::Integer(1), Cell::Empty]);
        assert_eq!(table.rows()[1], vec![Cell::Integer(2), Cell::from("bad")]);
    }

    #[test]
    fn test_set_cell_out_of_range() {
        let mut table = NamedTable::from_rows(["a"], vec![vec![Cell::Empty]]);
        assert!(table.set_cell(0, 0, Cell::from("x")));
        assert!(!table.set_cell(1, 0, Cell::from("x")));
        assert!(!table.set_cell(0, 1, Cell::from("x")));
    }

    #[test]
    fn test_dataset_preview_uses_first_sheet() {
        let rows: Vec<Vec<Cell>> = (0..20).map(|i| vec![Cell::Integer(i)]).collect();
        let dataset = Dataset {
            kind: DatasetKind::Spreadsheet,
            sheets: vec![
                ("First".to_string(), NamedTable::from_rows(["n"], rows)),
                ("Second".to_string(), NamedTable::new(["m"])),
            ],
        };
        let (name, preview) = dataset.preview(10).unwrap();
        assert_eq!(name, "First");
        assert_eq!(preview.len(), 10);
    }
}
