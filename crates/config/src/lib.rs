//! Configuration loading, validation, and env substitution.
//!
//! Config files: `aggregator.toml`, `aggregator.yaml`, or `aggregator.json`
//! Searched in `./` then `~/.config/aggregator/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{apply_env_overrides, config_dir, data_dir, discover_and_load, load_config},
    schema::{AggregatorConfig, MediaConfig, MetricsConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
