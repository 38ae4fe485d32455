// RuleCheck - core/export.rs
//
// Multi-sheet xlsx export of normalized results.
// Core layer: produces bytes or writes to any Write trait object.
//
// One worksheet per result entry, in entry order. Tables get a bold header
// row followed by their data rows; non-tabular entries get their rendered
// value in A1. Empty cells are written as blanks so the sheet's used range
// still covers rows that hold nothing. Sheet names go through
// `unique_sheet_names` so truncation collisions never reach the workbook
// writer.

use crate::core::model::{Cell, EntryContent, NamedTable, NormalizedResults};
use crate::util::constants;
use crate::util::error::ExportError;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

/// Serialize all result entries into an xlsx workbook.
///
/// An empty result set still produces a valid workbook (a single blank
/// sheet); callers decide via `NormalizedResults::is_exportable` whether to
/// offer it.
pub fn export_workbook(results: &NormalizedResults) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    let names = unique_sheet_names(results.entries.iter().map(|e| e.name.as_str()));

    for (entry, sheet_name) in results.entries.iter().zip(&names) {
        let xlsx = |source: XlsxError| ExportError::Xlsx {
            sheet: sheet_name.clone(),
            source,
        };
        let sheet = workbook.add_worksheet();
        sheet.set_name(sheet_name.as_str()).map_err(xlsx)?;

        match &entry.content {
            EntryContent::Table(table) => write_table(sheet, sheet_name, table, &header_format)?,
            EntryContent::NonTabular { value, .. } => {
                sheet
                    .write_string(0, 0, truncate_chars(value, constants::MAX_CELL_TEXT_LEN))
                    .map_err(xlsx)?;
            }
        }

        if sheet_name != &entry.name {
            tracing::debug!(
                entry = %entry.name,
                sheet = %sheet_name,
                "Result name adjusted for worksheet"
            );
        }
    }

    if results.entries.is_empty() {
        workbook.add_worksheet();
    }

    let bytes = workbook.save_to_buffer().map_err(|e| ExportError::Xlsx {
        sheet: String::new(),
        source: e,
    })?;

    tracing::info!(
        sheets = names.len(),
        bytes = bytes.len(),
        "Report workbook built"
    );

    Ok(bytes)
}

/// Export to any writer. Returns the number of bytes written.
pub fn write_workbook<W: Write>(
    results: &NormalizedResults,
    mut writer: W,
    export_path: &Path,
) -> Result<usize, ExportError> {
    let bytes = export_workbook(results)?;
    writer
        .write_all(&bytes)
        .and_then(|()| writer.flush())
        .map_err(|e| ExportError::Io {
            path: export_path.to_path_buf(),
            source: e,
        })?;
    Ok(bytes.len())
}

fn write_table(
    sheet: &mut Worksheet,
    sheet_name: &str,
    table: &NamedTable,
    header_format: &Format,
) -> Result<(), ExportError> {
    // Header row plus data rows must fit the worksheet.
    if table.len() + 1 > constants::MAX_SHEET_ROWS {
        return Err(ExportError::TooManyRows {
            sheet: sheet_name.to_string(),
            rows: table.len(),
            max: constants::MAX_SHEET_ROWS - 1,
        });
    }
    if table.columns().len() > constants::MAX_SHEET_COLUMNS {
        return Err(ExportError::TooManyColumns {
            sheet: sheet_name.to_string(),
            columns: table.columns().len(),
            max: constants::MAX_SHEET_COLUMNS,
        });
    }

    let xlsx = |source: XlsxError| ExportError::Xlsx {
        sheet: sheet_name.to_string(),
        source,
    };
    let blank_format = Format::new();

    // Bounds checked above, so the narrowing casts cannot truncate.
    for (col, name) in table.columns().iter().enumerate() {
        sheet
            .write_string_with_format(
                0,
                col as u16,
                truncate_chars(name, constants::MAX_CELL_TEXT_LEN),
                header_format,
            )
            .map_err(xlsx)?;
    }

    for (r, row) in table.rows().iter().enumerate() {
        let row_num = (r + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Empty => {
                    sheet.write_blank(row_num, col, &blank_format).map_err(xlsx)?;
                }
                Cell::Text(s) => {
                    sheet
                        .write_string(row_num, col, truncate_chars(s, constants::MAX_CELL_TEXT_LEN))
                        .map_err(xlsx)?;
                }
                // Cells hold f64; larger integers would come back rounded.
                Cell::Integer(i) if i.unsigned_abs() > constants::MAX_EXACT_CELL_INTEGER => {
                    sheet.write_string(row_num, col, i.to_string()).map_err(xlsx)?;
                }
                Cell::Integer(i) => {
                    sheet.write_number(row_num, col, *i as f64).map_err(xlsx)?;
                }
                Cell::Number(f) if f.is_finite() => {
                    sheet.write_number(row_num, col, *f).map_err(xlsx)?;
                }
                Cell::Number(f) => {
                    sheet.write_string(row_num, col, f.to_string()).map_err(xlsx)?;
                }
                Cell::Bool(b) => {
                    sheet.write_boolean(row_num, col, *b).map_err(xlsx)?;
                }
            }
        }
    }

    Ok(())
}

// =============================================================================
// Sheet names
// =============================================================================

/// Map result names to valid, unique worksheet names, preserving order.
///
/// Each name has characters Excel forbids replaced with `_`, surrounding
/// apostrophes removed, and is cut to 31 characters; an empty result becomes
/// `Sheet`. A name equal (case-insensitively) to an earlier one gets a
/// ` (n)` suffix, with the stem shortened so the whole name still fits.
pub fn unique_sheet_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    names
        .into_iter()
        .map(|name| {
            let base = sanitize_sheet_name(name);
            let mut candidate = base.clone();
            let mut n = 2usize;
            while used.contains(&candidate.to_lowercase()) {
                let suffix = format!(" ({n})");
                let stem_len = constants::MAX_SHEET_NAME_LEN - suffix.chars().count();
                let stem = truncate_chars(&base, stem_len);
                candidate = format!("{}{suffix}", stem.trim_end_matches('\''));
                n += 1;
            }
            used.insert(candidate.to_lowercase());
            candidate
        })
        .collect()
}

fn sanitize_sheet_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if constants::INVALID_SHEET_NAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = replaced.trim_matches('\'');
    let truncated = truncate_chars(trimmed, constants::MAX_SHEET_NAME_LEN);
    let truncated = truncated.trim_end_matches('\'');
    if truncated.trim().is_empty() {
        constants::FALLBACK_SHEET_NAME.to_string()
    } else {
        truncated.to_string()
    }
}

/// First `max` characters of `s` (not bytes).
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}
