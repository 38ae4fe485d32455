// RuleCheck - core/dataset.rs
//
// Dataset reading: CSV and spreadsheet bytes into a `Dataset`.
// Core layer: accepts byte slices, never touches the filesystem.
// File reading and size checks against config are done by the caller.

use crate::core::model::{Cell, Dataset, DatasetKind, NamedTable};
use crate::util::constants;
use crate::util::error::DatasetError;
use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader, Sheets};
use std::io::{Cursor, Read, Seek};
use std::path::Path;

impl DatasetKind {
    /// Determine the dataset format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self, DatasetError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        if constants::CSV_EXTENSIONS.contains(&ext.as_str()) {
            Ok(DatasetKind::Csv)
        } else if constants::SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
            Ok(DatasetKind::Spreadsheet)
        } else {
            Err(DatasetError::UnsupportedFormat { extension: ext })
        }
    }
}

/// Parse dataset bytes of a known kind.
pub fn read_dataset(bytes: &[u8], kind: DatasetKind) -> Result<Dataset, DatasetError> {
    match kind {
        DatasetKind::Csv => read_csv(bytes),
        DatasetKind::Spreadsheet => read_spreadsheet(bytes),
    }
}

/// Parse CSV bytes into a single-sheet dataset.
///
/// The first record is the header. Ragged rows are accepted and padded.
pub fn read_csv(bytes: &[u8]) -> Result<Dataset, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| DatasetError::Csv { source: e })?
        .clone();
    let columns = header_names(headers.iter());
    let mut table = NamedTable::new(columns);

    for record in reader.records() {
        let record = record.map_err(|e| DatasetError::Csv { source: e })?;
        table.push_row(record.iter().map(Cell::infer).collect());
    }

    tracing::debug!(
        columns = table.columns().len(),
        rows = table.len(),
        "CSV dataset parsed"
    );

    Ok(Dataset {
        kind: DatasetKind::Csv,
        sheets: vec![(constants::CSV_SHEET_NAME.to_string(), table)],
    })
}

/// Parse a spreadsheet container (xlsx, xls, ods, ...) into a dataset with
/// one table per sheet, in container order.
///
/// For xlsx, rows up to the sheet's declared used range are kept even when
/// they hold only blank cells, so trailing empty rows survive a round trip
/// through `export_workbook`.
pub fn read_spreadsheet(bytes: &[u8]) -> Result<Dataset, DatasetError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| DatasetError::Spreadsheet { source: e })?;

    let names = workbook.sheet_names();
    if names.is_empty() {
        return Err(DatasetError::NoSheets);
    }

    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let declared_last_row = declared_last_row(&mut workbook, &name);
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| DatasetError::Spreadsheet { source: e })?;
        let header_row = range.start().map_or(0, |(row, _)| row);

        let mut rows = range.rows();
        let columns = match rows.next() {
            Some(header) => header_names(header.iter().map(cell_from_data).map(|c| c.to_string())),
            None => Vec::new(),
        };
        let mut table = NamedTable::new(columns);
        for row in rows {
            table.push_row(row.iter().map(cell_from_data).collect());
        }

        if let Some(last_row) = declared_last_row.filter(|_| !table.columns().is_empty()) {
            let declared_rows = last_row.saturating_sub(header_row) as usize;
            while table.len() < declared_rows {
                table.push_row(Vec::new());
            }
        }

        tracing::debug!(
            sheet = %name,
            columns = table.columns().len(),
            rows = table.len(),
            "Spreadsheet sheet parsed"
        );
        sheets.push((name, table));
    }

    Ok(Dataset {
        kind: DatasetKind::Spreadsheet,
        sheets,
    })
}

/// Last row of the used range an xlsx sheet declares in its `<dimension>`
/// element. Blank cells count towards it but are absent from the cell range.
/// Other container formats report `None`.
fn declared_last_row<RS: Read + Seek>(workbook: &mut Sheets<RS>, name: &str) -> Option<u32> {
    match workbook {
        Sheets::Xlsx(xlsx) => match xlsx.worksheet_cells_reader(name) {
            Ok(reader) => Some(reader.dimensions().end.0),
            Err(e) => {
                tracing::debug!(sheet = %name, error = %e, "No declared dimension");
                None
            }
        },
        _ => None,
    }
}

/// Header cells become column names; blank ones get a positional name.
fn header_names<S: AsRef<str>>(cells: impl Iterator<Item = S>) -> Vec<String> {
    cells
        .enumerate()
        .map(|(i, s)| {
            let name = s.as_ref().trim();
            if name.is_empty() {
                format!("Unnamed: {i}")
            } else {
                name.to_string()
            }
        })
        .collect()
}

/// Convert a spreadsheet value to a cell.
///
/// Spreadsheets store all numbers as floats, so the reader cannot tell
/// `2` from `2.0`. Integral values within range come back as `Integer`:
/// ids and counts are far more common in rule data than whole-valued
/// measurements, and they should print without a trailing `.0`.
fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => {
            if s.trim().is_empty() {
                Cell::Empty
            } else {
                Cell::Text(s.clone())
            }
        }
        Data::Int(i) => Cell::Integer(*i),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() <= constants::MAX_EXACT_CELL_INTEGER as f64 {
                Cell::Integer(*f as i64)
            } else {
                Cell::Number(*f)
            }
        }
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(_) => match data.as_datetime() {
            Some(dt) => Cell::Text(dt.format(constants::DATETIME_FORMAT).to_string()),
            None => Cell::Text(data.to_string()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}
