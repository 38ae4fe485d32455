// RuleCheck - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// No string-based error propagation between layers; every error keeps its
// causal chain for diagnostic logging and converts to a `Diagnostic` for
// display at the boundary.

use serde::Serialize;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all RuleCheck operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum RuleCheckError {
    /// Rule script loading failed.
    Load(LoadError),

    /// Rule script invocation or result classification failed.
    Run(RunError),

    /// Dataset reading failed.
    Dataset(DatasetError),

    /// Report export failed.
    Export(ExportError),

    /// Configuration loading or validation failed.
    Config(ConfigError),

    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for RuleCheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load(e) => write!(f, "Rule load error: {e}"),
            Self::Run(e) => write!(f, "Rule run error: {e}"),
            Self::Dataset(e) => write!(f, "Dataset error: {e}"),
            Self::Export(e) => write!(f, "Export error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for RuleCheckError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Load(e) => Some(e),
            Self::Run(e) => Some(e),
            Self::Dataset(e) => Some(e),
            Self::Export(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Io { source, .. } => Some(source),
        }
    }
}

impl RuleCheckError {
    /// Structured form of this error for display or JSON output.
    pub fn diagnostic(&self) -> Diagnostic {
        match self {
            Self::Load(e) => e.diagnostic(),
            Self::Run(e) => e.diagnostic(),
            Self::Dataset(_) => Diagnostic::new("DatasetFailed", self.to_string()),
            Self::Export(_) => Diagnostic::new("ExportFailed", self.to_string()),
            Self::Config(_) => Diagnostic::new("ConfigFailed", self.to_string()),
            Self::Io { .. } => Diagnostic::new("IoFailed", self.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// An error reduced to what a caller needs to show the user:
/// the kind, a message, and the offending raw value where there is one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_value: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            raw_value: None,
        }
    }

    pub fn with_raw_value(mut self, value: impl Into<String>) -> Self {
        self.raw_value = Some(value.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if let Some(ref value) = self.raw_value {
            write!(f, " (value: {value})")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Load errors
// ---------------------------------------------------------------------------

/// Errors raised while turning script bytes into a `RuleUnit`.
#[derive(Debug)]
pub enum LoadError {
    /// The script could not be compiled, is not valid UTF-8, or failed while
    /// executing its top-level statements.
    CompileFailed { diagnostic: String },

    /// The temporary script artifact could not be created or written.
    StorageFailed {
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CompileFailed { diagnostic } => {
                write!(f, "Rule script failed to compile: {diagnostic}")
            }
            Self::StorageFailed { operation, source } => {
                write!(f, "Could not {operation} temporary rule script: {source}")
            }
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::StorageFailed { source, .. } => Some(source),
            Self::CompileFailed { .. } => None,
        }
    }
}

impl LoadError {
    pub fn diagnostic(&self) -> Diagnostic {
        let kind = match self {
            Self::CompileFailed { .. } => "CompileFailed",
            Self::StorageFailed { .. } => "StorageFailed",
        };
        Diagnostic::new(kind, self.to_string())
    }
}

impl From<LoadError> for RuleCheckError {
    fn from(e: LoadError) -> Self {
        Self::Load(e)
    }
}

// ---------------------------------------------------------------------------
// Run errors
// ---------------------------------------------------------------------------

/// Errors raised while invoking a rule script or classifying its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// The entry point raised an error (thrown value, type error, exceeded
    /// limit, missing function, ...).
    RuleExecutionFailed { diagnostic: String },

    /// The entry point returned something that is neither a table nor a map.
    /// Carries the rendered value so the caller can show it.
    UnsupportedResultShape { type_name: String, value: String },
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RuleExecutionFailed { diagnostic } => {
                write!(f, "check_rules failed: {diagnostic}")
            }
            Self::UnsupportedResultShape { type_name, value } => write!(
                f,
                "check_rules returned a {type_name} ('{value}'); \
                 expected a table or a map of tables"
            ),
        }
    }
}

impl std::error::Error for RunError {}

impl RunError {
    pub fn diagnostic(&self) -> Diagnostic {
        match self {
            Self::RuleExecutionFailed { .. } => {
                Diagnostic::new("RuleExecutionFailed", self.to_string())
            }
            Self::UnsupportedResultShape { value, .. } => {
                Diagnostic::new("UnsupportedResultShape", self.to_string())
                    .with_raw_value(value.clone())
            }
        }
    }
}

impl From<RunError> for RuleCheckError {
    fn from(e: RunError) -> Self {
        Self::Run(e)
    }
}

// ---------------------------------------------------------------------------
// Dataset errors
// ---------------------------------------------------------------------------

/// Errors related to reading the CSV or spreadsheet input.
#[derive(Debug)]
pub enum DatasetError {
    /// File extension is not a supported dataset format.
    UnsupportedFormat { extension: String },

    /// Dataset exceeds the configured maximum size.
    TooLarge { size: u64, max_size: u64 },

    /// CSV parsing failed.
    Csv { source: csv::Error },

    /// Spreadsheet container could not be opened or a sheet could not be read.
    Spreadsheet { source: calamine::Error },

    /// Spreadsheet contains no sheets.
    NoSheets,
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedFormat { extension } => write!(
                f,
                "Unsupported dataset format '{extension}'. Expected .csv or a spreadsheet (.xlsx, .xls, .ods)"
            ),
            Self::TooLarge { size, max_size } => write!(
                f,
                "Dataset is {size} bytes, exceeds maximum of {max_size} bytes"
            ),
            Self::Csv { source } => write!(f, "Could not read CSV: {source}"),
            Self::Spreadsheet { source } => write!(f, "Could not read spreadsheet: {source}"),
            Self::NoSheets => write!(f, "Spreadsheet contains no sheets"),
        }
    }
}

impl std::error::Error for DatasetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Csv { source } => Some(source),
            Self::Spreadsheet { source } => Some(source),
            _ => None,
        }
    }
}

impl From<DatasetError> for RuleCheckError {
    fn from(e: DatasetError) -> Self {
        Self::Dataset(e)
    }
}

// ---------------------------------------------------------------------------
// Export errors
// ---------------------------------------------------------------------------

/// Errors related to writing the report workbook.
#[derive(Debug)]
pub enum ExportError {
    /// The workbook writer rejected a sheet, cell, or the final save.
    Xlsx {
        sheet: String,
        source: rust_xlsxwriter::XlsxError,
    },

    /// I/O error writing the report file.
    Io { path: PathBuf, source: io::Error },

    /// A table has more rows than a worksheet can hold.
    TooManyRows {
        sheet: String,
        rows: usize,
        max: usize,
    },

    /// A table has more columns than a worksheet can hold.
    TooManyColumns {
        sheet: String,
        columns: usize,
        max: usize,
    },
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xlsx { sheet, source } => {
                write!(f, "Workbook error on sheet '{sheet}': {source}")
            }
            Self::Io { path, source } => {
                write!(f, "Export I/O error '{}': {source}", path.display())
            }
            Self::TooManyRows { sheet, rows, max } => write!(
                f,
                "Sheet '{sheet}' has {rows} rows, exceeds worksheet maximum of {max}. \
                 Export findings only to reduce the result set."
            ),
            Self::TooManyColumns { sheet, columns, max } => write!(
                f,
                "Sheet '{sheet}' has {columns} columns, exceeds worksheet maximum of {max}"
            ),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Xlsx { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ExportError> for RuleCheckError {
    fn from(e: ExportError) -> Self {
        Self::Export(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// I/O error reading config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Config parse error '{}': {source}", path.display())
            }
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
        }
    }
}

impl From<ConfigError> for RuleCheckError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Convenience type alias for RuleCheck results.
pub type Result<T> = std::result::Result<T, RuleCheckError>;
