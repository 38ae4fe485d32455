// RuleCheck - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "RuleCheck";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "RuleCheck";

/// Current application version (updated by release script).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Rule scripts
// =============================================================================

/// Name of the function every rule script must define.
pub const ENTRY_POINT: &str = "check_rules";

/// Number of parameters the entry point must accept (the dataset).
pub const ENTRY_POINT_ARITY: usize = 1;

/// Prefix for the temporary file a rule script is persisted to while loading.
pub const SCRIPT_TEMP_PREFIX: &str = "rulecheck-";

/// Suffix for the temporary rule script file.
pub const SCRIPT_TEMP_SUFFIX: &str = ".rhai";

/// Maximum size of an uploaded rule script in bytes.
pub const MAX_SCRIPT_SIZE: usize = 1024 * 1024; // 1 MB

/// tracing target used for script `print` / `debug` output.
pub const SCRIPT_LOG_TARGET: &str = "rulecheck::script";

// =============================================================================
// Script engine limits
// =============================================================================

/// Default maximum number of operations a single script call may perform.
/// Guards against runaway loops in user scripts.
pub const DEFAULT_MAX_OPERATIONS: u64 = 50_000_000;

/// Lower bound for the configurable operation budget.
pub const MIN_MAX_OPERATIONS: u64 = 10_000;

/// Upper bound for the configurable operation budget.
pub const ABSOLUTE_MAX_OPERATIONS: u64 = 5_000_000_000;

/// Default maximum function call nesting depth.
pub const DEFAULT_MAX_CALL_LEVELS: usize = 64;

/// Upper bound for the configurable call nesting depth.
pub const ABSOLUTE_MAX_CALL_LEVELS: usize = 512;

/// Default maximum nesting depth of expressions and statements at global
/// level. A `for` over rows with nested `if` blocks and map literals needs
/// far more than Rhai's debug-build default allows.
pub const DEFAULT_MAX_EXPR_DEPTH: usize = 128;

/// Default maximum nesting depth inside function bodies.
pub const DEFAULT_MAX_FUNCTION_EXPR_DEPTH: usize = 128;

/// Upper bound for both configurable expression depths.
pub const ABSOLUTE_MAX_EXPR_DEPTH: usize = 1024;

/// Default maximum length of a single string value in a script.
pub const DEFAULT_MAX_STRING_SIZE: usize = 1024 * 1024;

/// Default maximum number of elements in a script array.
pub const DEFAULT_MAX_ARRAY_SIZE: usize = 2_000_000;

/// Default maximum number of properties in a script object map.
pub const DEFAULT_MAX_MAP_SIZE: usize = 10_000;

// =============================================================================
// Datasets
// =============================================================================

/// Sheet name given to the single implicit table of a CSV dataset.
pub const CSV_SHEET_NAME: &str = "Sheet1";

/// Default maximum dataset file size in bytes.
pub const DEFAULT_MAX_DATASET_SIZE: u64 = 100 * 1024 * 1024; // 100 MB

/// Hard upper bound on the configurable dataset size.
pub const ABSOLUTE_MAX_DATASET_SIZE: u64 = 2 * 1024 * 1024 * 1024; // 2 GB

/// File extensions read as spreadsheet containers.
pub const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// File extensions read as CSV.
pub const CSV_EXTENSIONS: &[&str] = &["csv"];

/// Display format for spreadsheet date/time cells.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// =============================================================================
// Findings and results
// =============================================================================

/// Column whose non-blank value marks a row as a finding. When present,
/// it is the only indicator column consulted.
pub const COMMENT_COLUMN: &str = "Comment";

/// Substrings (case-sensitive) that mark a column as a finding indicator.
pub const INDICATOR_SUBSTRINGS: &[&str] = &["Error", "Duplicate"];

/// Suffix (case-insensitive) that marks a column as a finding indicator.
pub const INDICATOR_SUFFIX: &str = "_check";

/// Name given to a single table returned directly by a rule script.
pub const SINGLE_RESULT_NAME: &str = "Validation";

// =============================================================================
// Export
// =============================================================================

/// Maximum length of a worksheet name.
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Characters that may not appear in a worksheet name.
pub const INVALID_SHEET_NAME_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// Replacement for an empty worksheet name.
pub const FALLBACK_SHEET_NAME: &str = "Sheet";

/// Maximum number of rows in a worksheet, header included.
pub const MAX_SHEET_ROWS: usize = 1_048_576;

/// Maximum number of columns in a worksheet.
pub const MAX_SHEET_COLUMNS: usize = 16_384;

/// Largest integer magnitude a worksheet number (f64) holds exactly, 2^53.
/// Integers beyond it are exported as text.
pub const MAX_EXACT_CELL_INTEGER: u64 = 1 << 53;

/// Maximum number of characters in a single worksheet cell.
pub const MAX_CELL_TEXT_LEN: usize = 32_767;

/// Default report file name when `--output` is not given.
pub const DEFAULT_REPORT_FILE_NAME: &str = "validation_results.xlsx";

// =============================================================================
// Display
// =============================================================================

/// Default number of rows shown in the dataset preview.
pub const DEFAULT_PREVIEW_ROWS: usize = 10;

/// Default number of rows listed per result table.
pub const DEFAULT_MAX_DISPLAY_ROWS: usize = 200;

/// Upper bound for both display row settings.
pub const ABSOLUTE_MAX_DISPLAY_ROWS: usize = 100_000;

/// Maximum characters shown per cell in text output.
pub const MAX_DISPLAY_CELL_WIDTH: usize = 40;

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";
