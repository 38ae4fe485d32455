// RuleCheck - app/loader.rs
//
// Rule loader: script bytes -> RuleUnit.
//
// Lifecycle of the temporary script artifact:
//   1. created with a unique name (tempfile), never a fixed shared path,
//   2. written and compiled,
//   3. released before `load` returns, on every path. Success closes it
//      explicitly so a failed delete is logged; every early return drops
//      the guard, which deletes the file.
//
// The compiled unit keeps its own engine and AST. Variables and constants
// declared by the script's top-level statements are captured once at load
// time and served read-only, by plain name, to every function the unit
// runs. Nothing from the host is visible to the script beyond the
// registered API, and the only thing the host takes back out is the
// `check_rules` entry point.

use crate::core::script::{self, EngineLimits};
use crate::util::constants;
use crate::util::error::LoadError;
use rhai::{Dynamic, Engine, Scope, AST};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A compiled rule script, ready for one validation run.
pub struct RuleUnit {
    pub(crate) engine: Engine,
    pub(crate) ast: AST,
    /// Names of the top-level variables captured at load time.
    pub globals: Vec<String>,

    /// True when the script does not define `check_rules(dataset)`.
    /// The unit is still returned so the caller can report this distinctly.
    pub entry_point_missing: bool,

    /// Where the script was persisted while loading. The file no longer
    /// exists once `load` has returned.
    pub artifact_path: PathBuf,
}

impl fmt::Debug for RuleUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleUnit")
            .field("functions", &self.function_names())
            .field("globals", &self.globals)
            .field("entry_point_missing", &self.entry_point_missing)
            .field("artifact_path", &self.artifact_path)
            .finish_non_exhaustive()
    }
}

impl RuleUnit {
    /// Names of all script-defined functions, in definition order.
    pub fn function_names(&self) -> Vec<String> {
        self.ast
            .iter_functions()
            .map(|f| f.name.to_string())
            .collect()
    }
}

/// Load a rule script, persisting it under the system temp directory.
pub fn load(script: &[u8], limits: &EngineLimits) -> Result<RuleUnit, LoadError> {
    load_in(&std::env::temp_dir(), script, limits)
}

/// Load a rule script, persisting it under `dir`.
pub fn load_in(dir: &Path, script: &[u8], limits: &EngineLimits) -> Result<RuleUnit, LoadError> {
    if script.len() > constants::MAX_SCRIPT_SIZE {
        return Err(LoadError::CompileFailed {
            diagnostic: format!(
                "script is {} bytes, exceeds maximum of {} bytes",
                script.len(),
                constants::MAX_SCRIPT_SIZE
            ),
        });
    }

    let mut artifact = tempfile::Builder::new()
        .prefix(constants::SCRIPT_TEMP_PREFIX)
        .suffix(constants::SCRIPT_TEMP_SUFFIX)
        .tempfile_in(dir)
        .map_err(|e| LoadError::StorageFailed {
            operation: "create",
            source: e,
        })?;

    artifact
        .write_all(script)
        .and_then(|()| artifact.flush())
        .map_err(|e| LoadError::StorageFailed {
            operation: "write",
            source: e,
        })?;

    let path = artifact.path().to_path_buf();
    tracing::debug!(
        path = %path.display(),
        bytes = script.len(),
        "Rule script persisted"
    );

    let result = compile(&path, limits);
    release(artifact);

    match result {
        Ok(unit) => {
            tracing::info!(
                functions = ?unit.function_names(),
                globals = ?unit.globals,
                entry_point_missing = unit.entry_point_missing,
                "Rule script loaded"
            );
            Ok(unit)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Rule script failed to load");
            Err(e)
        }
    }
}

/// Compile the persisted script and run its top-level statements once.
fn compile(path: &Path, limits: &EngineLimits) -> Result<RuleUnit, LoadError> {
    let mut engine = script::build_engine(limits);

    let ast = engine
        .compile_file(path.to_path_buf())
        .map_err(|e| LoadError::CompileFailed {
            diagnostic: e.to_string(),
        })?;

    let mut scope = Scope::new();
    engine
        .run_ast_with_scope(&mut scope, &ast)
        .map_err(|e| LoadError::CompileFailed {
            diagnostic: e.to_string(),
        })?;

    let entry_point_missing = !ast.iter_functions().any(|f| {
        f.name == constants::ENTRY_POINT && f.params.len() == constants::ENTRY_POINT_ARITY
    });

    let globals = scope.iter().map(|(name, _, _)| name.to_string()).collect();
    expose_globals(&mut engine, &scope);

    Ok(RuleUnit {
        engine,
        ast,
        globals,
        entry_point_missing,
        artifact_path: path.to_path_buf(),
    })
}

/// Serve the top-level variables left in `scope` to script functions.
///
/// Rhai functions cannot see the caller's scope, so the values are resolved
/// through the engine's variable callback instead. Locals and parameters of
/// the same name still win. Later declarations shadow earlier ones.
#[allow(deprecated)]
fn expose_globals(engine: &mut Engine, scope: &Scope) {
    let values: HashMap<String, Dynamic> = scope
        .iter()
        .map(|(name, _, value)| (name.to_string(), value))
        .collect();
    if values.is_empty() {
        return;
    }

    engine.on_var(move |name, index, context| {
        if index > 0 || context.scope().contains(name) {
            return Ok(None);
        }
        Ok(values.get(name).cloned())
    });
}

/// Delete the temporary artifact, logging rather than failing if the OS
/// refuses. The AST is already in memory, so a leftover file cannot affect
/// the run.
fn release(artifact: NamedTempFile) {
    let path = artifact.path().to_path_buf();
    match artifact.close() {
        Ok(()) => tracing::debug!(path = %path.display(), "Rule script artifact removed"),
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Failed to remove rule script artifact"
        ),
    }
}
