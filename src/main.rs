// RuleCheck - main.rs
//
// Application entry point. Handles:
// 1. CLI argument parsing
// 2. Config loading and logging initialisation (debug mode support)
// 3. Reading the rule script and dataset
// 4. The validation run, terminal/JSON output, and report export

mod report;

use clap::Parser;
use report::JsonReport;
use rulecheck::app::runner::{self, RunOutcome};
use rulecheck::core::dataset;
use rulecheck::core::export;
use rulecheck::core::model::{DatasetKind, NormalizedResults};
use rulecheck::core::normalizer;
use rulecheck::core::script::EngineLimits;
use rulecheck::platform::config::{self, AppConfig, PlatformPaths};
use rulecheck::platform::fs;
use rulecheck::util::{self, constants, error::RuleCheckError};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit code when the rule script has no `check_rules(dataset)`.
const EXIT_ENTRY_POINT_MISSING: u8 = 2;

/// RuleCheck - run user-supplied validation rules against a dataset.
///
/// Loads a Rhai rule script, calls its `check_rules(dataset)` function with
/// the given CSV or spreadsheet, prints a summary of findings, and writes a
/// multi-sheet xlsx report.
#[derive(Parser, Debug)]
#[command(name = "rulecheck", version, about)]
struct Cli {
    /// Rule script (.rhai) defining `fn check_rules(dataset)`.
    #[arg(short = 'r', long = "rules")]
    rules: PathBuf,

    /// Dataset to validate (.csv, .xlsx, .xlsm, .xlsb, .xls, .ods).
    #[arg(short = 'i', long = "data")]
    data: PathBuf,

    /// Report file to write.
    #[arg(short = 'o', long = "output", default_value = constants::DEFAULT_REPORT_FILE_NAME)]
    output: PathBuf,

    /// Do not write the xlsx report.
    #[arg(long = "no-export")]
    no_export: bool,

    /// List only rows that carry a finding.
    #[arg(short = 'f', long = "findings-only")]
    findings_only: bool,

    /// Maximum rows listed per result table (default from config).
    #[arg(short = 'n', long = "rows")]
    rows: Option<usize>,

    /// Print a JSON report to stdout instead of text.
    #[arg(long = "json")]
    json: bool,

    /// Config file to use instead of the platform default.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Config first: it carries the log level and log file.
    let (app_config, config_warnings) = match &cli.config {
        Some(path) => match config::load_config_strict(path) {
            Ok(loaded) => loaded,
            Err(e) => {
                util::logging::init(cli.debug, None, None);
                return fail(&cli, &RuleCheckError::from(e));
            }
        },
        None => config::load_config(&PlatformPaths::resolve().config_file()),
    };

    util::logging::init(
        cli.debug,
        app_config.log_level.as_deref(),
        app_config.log_file.as_deref(),
    );

    for warning in &config_warnings {
        tracing::warn!(warning = %warning, "Config warning");
    }

    tracing::info!(
        version = constants::APP_VERSION,
        debug = cli.debug,
        rules = %cli.rules.display(),
        data = %cli.data.display(),
        "RuleCheck starting"
    );

    match execute(&cli, &app_config) {
        Ok(code) => code,
        Err(e) => fail(&cli, &e),
    }
}

/// Run the full chain: read inputs, validate, print, export.
fn execute(cli: &Cli, app_config: &AppConfig) -> util::error::Result<ExitCode> {
    let script = fs::read_script_file(&cli.rules)?;

    let kind = DatasetKind::from_path(&cli.data)?;
    let bytes = fs::read_dataset_file(&cli.data, app_config.max_dataset_size)?;
    let data = dataset::read_dataset(&bytes, kind)?;
    tracing::info!(
        kind = kind.label(),
        sheets = data.sheets.len(),
        "Dataset loaded"
    );

    if !cli.json {
        if let Some((sheet, preview)) = data.preview(app_config.preview_rows) {
            let total = data.first_sheet().map_or(0, |(_, t)| t.len());
            println!("{}", report::format_preview(kind, sheet, &preview, total));
        }
    }

    let limits = engine_limits(app_config);
    match runner::validate(&script, &data, &limits)? {
        RunOutcome::EntryPointMissing => {
            let message = format!(
                "Rule script loaded but `{}(dataset)` was not found; nothing was run.",
                constants::ENTRY_POINT
            );
            if cli.json {
                let json = JsonReport::new("entry_point_missing");
                println!("{}", json.to_json());
            } else {
                eprintln!("{message}");
            }
            Ok(ExitCode::from(EXIT_ENTRY_POINT_MISSING))
        }
        RunOutcome::Failed(e) => Err(e.into()),
        RunOutcome::Completed(results) => {
            let mut stdout = std::io::stdout().lock();
            Ok(match report_results(cli, app_config, &results, &mut stdout) {
                Ok(_) => ExitCode::SUCCESS,
                Err(_) => ExitCode::FAILURE,
            })
        }
    }
}

/// Show the results on `out`, then export them.
///
/// Results are written before the report so an export failure never hides
/// them. An export error has already been reported when it is returned.
fn report_results<W: Write>(
    cli: &Cli,
    app_config: &AppConfig,
    results: &NormalizedResults,
    out: &mut W,
) -> util::error::Result<Option<PathBuf>> {
    let mut summaries = results.summaries();
    normalizer::sort_by_findings(&mut summaries);
    let aggregate = results.aggregate();

    if !cli.json {
        let limit = cli
            .rows
            .unwrap_or(app_config.max_display_rows)
            .min(constants::ABSOLUTE_MAX_DISPLAY_ROWS);
        let _ = writeln!(out, "{}", report::format_summary(&summaries, &aggregate));
        let _ = write!(out, "{}", report::format_entries(results, cli.findings_only, limit));
        let _ = out.flush();
    }

    let export = export_report(cli, results);

    if cli.json {
        let (status, report_path, error) = match &export {
            Ok(path) => ("completed", path.as_ref().map(|p| p.display().to_string()), None),
            Err(e) => ("export_failed", None, Some(e.diagnostic())),
        };
        let json = JsonReport {
            summaries: Some(summaries),
            aggregate: Some(aggregate),
            results: Some(results),
            report_path,
            error,
            ..JsonReport::new(status)
        };
        let _ = writeln!(out, "{}", json.to_json());
    }

    match &export {
        Ok(Some(path)) if !cli.json => {
            let _ = writeln!(out, "\nReport written to {}", path.display());
        }
        Ok(None) if !cli.json && !results.is_exportable() => {
            let _ = writeln!(out, "\nNo results to export.");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!(error = %e, output = %cli.output.display(), "Report export failed");
            if !cli.json {
                eprintln!("\nError: {}", e.diagnostic());
            }
        }
    }

    export
}

/// Write the xlsx report when there is anything to export.
fn export_report(cli: &Cli, results: &NormalizedResults) -> util::error::Result<Option<PathBuf>> {
    if cli.no_export {
        return Ok(None);
    }
    if !results.is_exportable() {
        tracing::info!("No result entries; report not written");
        return Ok(None);
    }
    let bytes = export::export_workbook(results)?;
    fs::write_atomic(&cli.output, &bytes)?;
    Ok(Some(cli.output.clone()))
}

fn engine_limits(app_config: &AppConfig) -> EngineLimits {
    EngineLimits {
        max_operations: app_config.max_operations,
        max_call_levels: app_config.max_call_levels,
        max_expr_depth: app_config.max_expr_depth,
        max_function_expr_depth: app_config.max_function_expr_depth,
        max_string_size: app_config.max_string_size,
        max_array_size: app_config.max_array_size,
        max_map_size: app_config.max_map_size,
    }
}

/// Report an error and pick the exit code.
fn fail(cli: &Cli, error: &RuleCheckError) -> ExitCode {
    tracing::error!(error = %error, "Validation failed");
    let diagnostic = error.diagnostic();
    if cli.json {
        let json = JsonReport {
            error: Some(diagnostic),
            ..JsonReport::new("failed")
        };
        println!("{}", json.to_json());
    } else {
        eprintln!("Error: {diagnostic}");
    }
    ExitCode::FAILURE
}
