// RuleCheck - app/mod.rs
//
// Application layer: rule-script loading and validation runs.
// Dependencies: core layer.
// Must NOT depend on: platform specifics or the binary.

pub mod loader;
pub mod runner;
