// RuleCheck - platform/mod.rs
//
// Platform layer: configuration directories and file access.
// Depends on util only; never on core or app.

pub mod config;
pub mod fs;
