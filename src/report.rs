// RuleCheck - report.rs
//
// Terminal rendering of previews, summaries and result tables, plus the
// machine-readable JSON report. Binary-side only: the library never prints.

use rulecheck::core::finding;
use rulecheck::core::model::{
    Aggregate, Cell, DatasetKind, EntryContent, NamedTable, NormalizedResults, Summary,
};
use rulecheck::util::constants;
use rulecheck::util::error::Diagnostic;
use serde::Serialize;
use std::fmt::Write as _;

/// Shown in place of an empty result table.
pub const NO_ISSUES_MESSAGE: &str = "No issues found in this sheet!";

/// Render `table` restricted to the row indices in `rows`, listing at most
/// `limit` of them. Columns are padded to a common width and cells longer
/// than the display width are cut with `...`.
pub fn format_table(table: &NamedTable, rows: &[usize], limit: usize) -> String {
    let shown: Vec<&[Cell]> = rows
        .iter()
        .take(limit)
        .filter_map(|&i| table.rows().get(i).map(Vec::as_slice))
        .collect();

    let header: Vec<String> = table.columns().iter().map(|c| clip(c)).collect();
    let body: Vec<Vec<String>> = shown
        .iter()
        .map(|row| row.iter().map(|cell| clip(&cell.as_text())).collect())
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &body {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &header, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(&mut out, &rule, &widths);
    for row in &body {
        push_row(&mut out, row, &widths);
    }

    if rows.len() > shown.len() {
        let _ = writeln!(out, "... {} more row(s)", rows.len() - shown.len());
    }
    out
}

/// Render the dataset preview: the first sheet's name and leading rows.
pub fn format_preview(kind: DatasetKind, sheet: &str, table: &NamedTable, total_rows: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Dataset preview ({}, sheet '{sheet}', {} of {total_rows} rows)",
        kind.label(),
        table.len()
    );
    let all: Vec<usize> = (0..table.len()).collect();
    out.push_str(&format_table(table, &all, table.len()));
    out
}

/// Render the summary of findings. `summaries` is expected to be sorted
/// already (see `normalizer::sort_by_findings`).
pub fn format_summary(summaries: &[Summary], aggregate: &Aggregate) -> String {
    let header = vec![
        "Sheet".to_string(),
        "Total Rows".to_string(),
        "Findings".to_string(),
    ];
    let body: Vec<Vec<String>> = summaries
        .iter()
        .map(|s| {
            let name = if s.non_tabular {
                format!("{} (non-tabular)", clip(&s.name))
            } else {
                clip(&s.name)
            };
            vec![name, s.total_rows.to_string(), s.finding_count.to_string()]
        })
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &body {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::from("Summary of findings\n");
    push_row(&mut out, &header, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(&mut out, &rule, &widths);
    for row in &body {
        push_row(&mut out, row, &widths);
    }
    let _ = writeln!(
        out,
        "Total: {} sheet(s), {} row(s), {} finding(s)",
        aggregate.total_sheets, aggregate.total_rows, aggregate.total_findings
    );
    out
}

/// Render every result entry in entry order.
pub fn format_entries(results: &NormalizedResults, findings_only: bool, limit: usize) -> String {
    let mut out = String::new();
    for entry in &results.entries {
        let _ = writeln!(out, "\n== {} ==", entry.name);
        match &entry.content {
            EntryContent::Table(table) => {
                let rows = finding::filter_rows(table, findings_only);
                if rows.is_empty() {
                    let _ = writeln!(out, "{NO_ISSUES_MESSAGE}");
                } else {
                    out.push_str(&format_table(table, &rows, limit));
                }
            }
            EntryContent::NonTabular { type_name, value } => {
                let _ = writeln!(out, "({type_name}) {value}");
            }
        }
    }
    out
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, w)| format!("{cell:<w$}"))
        .collect();
    let _ = writeln!(out, "{}", line.join(" | ").trim_end());
}

fn clip(s: &str) -> String {
    let single_line = s.replace(['\r', '\n'], " ");
    if single_line.chars().count() <= constants::MAX_DISPLAY_CELL_WIDTH {
        single_line
    } else {
        let kept: String = single_line
            .chars()
            .take(constants::MAX_DISPLAY_CELL_WIDTH - 3)
            .collect();
        format!("{kept}...")
    }
}

// =============================================================================
// JSON report
// =============================================================================

/// Machine-readable report printed with `--json`.
#[derive(Debug, Default, Serialize)]
pub struct JsonReport<'a> {
    /// `completed`, `export_failed`, `entry_point_missing` or `failed`.
    pub status: &'static str,
    /// RFC 3339 UTC time the report was produced.
    pub generated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summaries: Option<Vec<Summary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<Aggregate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<&'a NormalizedResults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Diagnostic>,
}

impl JsonReport<'_> {
    pub fn new(status: &'static str) -> Self {
        Self {
            status,
            generated_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            ..Default::default()
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| {
            format!("{{\"status\":\"failed\",\"error\":{{\"kind\":\"JsonFailed\",\"message\":\"{e}\"}}}}")
        })
    }
}
