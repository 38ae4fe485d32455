// RuleCheck - platform/config.rs
//
// Platform-specific configuration directory resolution and config.toml
// loading with startup validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::util::constants;
use crate::util::error::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Resolved platform paths for RuleCheck configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/rulecheck/ or %APPDATA%\RuleCheck\config\)
    pub config_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to current directory if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            tracing::debug!(config = %config_dir.display(), "Platform paths resolved");
            Self { config_dir }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            Self {
                config_dir: PathBuf::from("."),
            }
        }
    }

    /// Default location of config.toml.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(constants::CONFIG_FILE_NAME)
    }
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are silently ignored for forward compatibility -- a newer
/// config file can be used with an older binary without crashing.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// `[engine]` section.
    pub engine: EngineSection,
    /// `[dataset]` section.
    pub dataset: DatasetSection,
    /// `[display]` section.
    pub display: DisplaySection,
    /// `[logging]` section.
    pub logging: LoggingSection,
}

/// `[engine]` config section: resource limits for rule scripts.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub max_operations: Option<u64>,
    pub max_call_levels: Option<usize>,
    pub max_expr_depth: Option<usize>,
    pub max_function_expr_depth: Option<usize>,
    pub max_string_size: Option<usize>,
    pub max_array_size: Option<usize>,
    pub max_map_size: Option<usize>,
}

/// `[dataset]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct DatasetSection {
    /// Reject dataset files larger than this.
    pub max_file_size_bytes: Option<u64>,
}

/// `[display]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct DisplaySection {
    /// Rows shown in the dataset preview.
    pub preview_rows: Option<usize>,
    /// Rows listed per result table.
    pub max_display_rows: Option<usize>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
    /// Log file path (empty = stderr only).
    pub file: Option<String>,
}

/// Validated application configuration derived from `config.toml`.
///
/// All values are validated against named constants at load time.
/// Invalid values produce actionable warnings and fall back to defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    // -- Engine --
    pub max_operations: u64,
    pub max_call_levels: usize,
    pub max_expr_depth: usize,
    pub max_function_expr_depth: usize,
    pub max_string_size: usize,
    pub max_array_size: usize,
    pub max_map_size: usize,

    // -- Dataset --
    pub max_dataset_size: u64,

    // -- Display --
    pub preview_rows: usize,
    pub max_display_rows: usize,

    // -- Logging --
    /// Logging level string (for init before tracing is available).
    pub log_level: Option<String>,
    /// Log file path.
    pub log_file: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_operations: constants::DEFAULT_MAX_OPERATIONS,
            max_call_levels: constants::DEFAULT_MAX_CALL_LEVELS,
            max_expr_depth: constants::DEFAULT_MAX_EXPR_DEPTH,
            max_function_expr_depth: constants::DEFAULT_MAX_FUNCTION_EXPR_DEPTH,
            max_string_size: constants::DEFAULT_MAX_STRING_SIZE,
            max_array_size: constants::DEFAULT_MAX_ARRAY_SIZE,
            max_map_size: constants::DEFAULT_MAX_MAP_SIZE,
            max_dataset_size: constants::DEFAULT_MAX_DATASET_SIZE,
            preview_rows: constants::DEFAULT_PREVIEW_ROWS,
            max_display_rows: constants::DEFAULT_MAX_DISPLAY_ROWS,
            log_level: None,
            log_file: None,
        }
    }
}

/// Load and validate a config file.
///
/// Returns `AppConfig` with validated values and a list of non-fatal warnings.
/// If the file does not exist, returns defaults with no warnings (first run).
/// If the file is unreadable or unparseable, returns defaults with a warning;
/// the run still proceeds but the user is informed.
///
/// Runs before logging is initialised (the log level lives in this file), so
/// problems are reported through the returned warnings only.
pub fn load_config(config_path: &Path) -> (AppConfig, Vec<String>) {
    if !config_path.exists() {
        return (AppConfig::default(), Vec::new());
    }

    match std::fs::read_to_string(config_path) {
        Ok(content) => parse_config(&content, config_path),
        Err(e) => (
            AppConfig::default(),
            vec![format!(
                "Could not read config file '{}': {e}. Using defaults.",
                config_path.display()
            )],
        ),
    }
}

/// Load a config file the user named explicitly (`--config`).
///
/// Unlike `load_config`, a missing or unparseable file is an error: the user
/// asked for this file, so silently running on defaults would hide a typo.
/// Out-of-range values are still warnings.
pub fn load_config_strict(config_path: &Path) -> Result<(AppConfig, Vec<String>), ConfigError> {
    let content = std::fs::read_to_string(config_path).map_err(|e| ConfigError::Io {
        path: config_path.to_path_buf(),
        source: e,
    })?;
    let raw: RawConfig = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
        path: config_path.to_path_buf(),
        source: e,
    })?;
    Ok(validate(raw))
}

/// Parse and validate config.toml content. `config_path` is used in
/// messages only.
pub fn parse_config(content: &str, config_path: &Path) -> (AppConfig, Vec<String>) {
    match toml::from_str::<RawConfig>(content) {
        Ok(raw) => validate(raw),
        Err(e) => (
            AppConfig::default(),
            vec![format!(
                "Failed to parse config file '{}': {e}. Using defaults.",
                config_path.display()
            )],
        ),
    }
}

/// Validate each raw field against named constants, accumulating all problems.
fn validate(raw: RawConfig) -> (AppConfig, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();
    let mut config = AppConfig::default();

    // -- Engine --
    if let Some(ops) = raw.engine.max_operations {
        if (constants::MIN_MAX_OPERATIONS..=constants::ABSOLUTE_MAX_OPERATIONS).contains(&ops) {
            config.max_operations = ops;
        } else {
            warnings.push(format!(
                "[engine] max_operations = {ops} is out of range ({}-{}). Using default ({}).",
                constants::MIN_MAX_OPERATIONS,
                constants::ABSOLUTE_MAX_OPERATIONS,
                constants::DEFAULT_MAX_OPERATIONS,
            ));
        }
    }

    if let Some(levels) = raw.engine.max_call_levels {
        if (1..=constants::ABSOLUTE_MAX_CALL_LEVELS).contains(&levels) {
            config.max_call_levels = levels;
        } else {
            warnings.push(format!(
                "[engine] max_call_levels = {levels} is out of range (1-{}). Using default ({}).",
                constants::ABSOLUTE_MAX_CALL_LEVELS,
                constants::DEFAULT_MAX_CALL_LEVELS,
            ));
        }
    }

    for (field, value, slot) in [
        (
            "max_expr_depth",
            raw.engine.max_expr_depth,
            &mut config.max_expr_depth,
        ),
        (
            "max_function_expr_depth",
            raw.engine.max_function_expr_depth,
            &mut config.max_function_expr_depth,
        ),
    ] {
        if let Some(depth) = value {
            if (1..=constants::ABSOLUTE_MAX_EXPR_DEPTH).contains(&depth) {
                *slot = depth;
            } else {
                warnings.push(format!(
                    "[engine] {field} = {depth} is out of range (1-{}). Using default ({}).",
                    constants::ABSOLUTE_MAX_EXPR_DEPTH,
                    *slot
                ));
            }
        }
    }

    // Size limits: zero would disable the limit in the engine, so require >= 1.
    for (field, value, slot) in [
        (
            "max_string_size",
            raw.engine.max_string_size,
            &mut config.max_string_size,
        ),
        (
            "max_array_size",
            raw.engine.max_array_size,
            &mut config.max_array_size,
        ),
        (
            "max_map_size",
            raw.engine.max_map_size,
            &mut config.max_map_size,
        ),
    ] {
        match value {
            Some(0) => warnings.push(format!(
                "[engine] {field} = 0 is out of range (must be at least 1). Using default ({}).",
                *slot
            )),
            Some(v) => *slot = v,
            None => {}
        }
    }

    // -- Dataset --
    if let Some(size) = raw.dataset.max_file_size_bytes {
        if (1..=constants::ABSOLUTE_MAX_DATASET_SIZE).contains(&size) {
            config.max_dataset_size = size;
        } else {
            warnings.push(format!(
                "[dataset] max_file_size_bytes = {size} is out of range (1-{}). Using default ({}).",
                constants::ABSOLUTE_MAX_DATASET_SIZE,
                constants::DEFAULT_MAX_DATASET_SIZE,
            ));
        }
    }

    // -- Display --
    if let Some(rows) = raw.display.preview_rows {
        if rows <= constants::ABSOLUTE_MAX_DISPLAY_ROWS {
            config.preview_rows = rows;
        } else {
            warnings.push(format!(
                "[display] preview_rows = {rows} is out of range (0-{}). Using default ({}).",
                constants::ABSOLUTE_MAX_DISPLAY_ROWS,
                constants::DEFAULT_PREVIEW_ROWS,
            ));
        }
    }

    if let Some(rows) = raw.display.max_display_rows {
        if rows <= constants::ABSOLUTE_MAX_DISPLAY_ROWS {
            config.max_display_rows = rows;
        } else {
            warnings.push(format!(
                "[display] max_display_rows = {rows} is out of range (0-{}). Using default ({}).",
                constants::ABSOLUTE_MAX_DISPLAY_ROWS,
                constants::DEFAULT_MAX_DISPLAY_ROWS,
            ));
        }
    }

    // -- Logging: level --
    if let Some(ref level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.to_lowercase());
        } else {
            warnings.push(format!(
                "[logging] level = \"{level}\" is not recognised. \
                 Valid values: error, warn, info, debug, trace. Using default (info).",
            ));
        }
    }

    // -- Logging: file --
    if let Some(ref file) = raw.logging.file {
        if !file.is_empty() {
            config.log_file = Some(file.clone());
        }
    }

    (config, warnings)
}
