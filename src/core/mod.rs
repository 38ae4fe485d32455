// RuleCheck - core/mod.rs
//
// Core business logic layer: data model, dataset reading, the rule-script
// API, result normalization, finding detection, and xlsx export.
// Must NOT depend on: platform, app, or the binary.

pub mod dataset;
pub mod export;
pub mod finding;
pub mod model;
pub mod normalizer;
pub mod script;
