//! Shared identifiers, error definitions, and utilities used across the aggregator crates.

pub mod error;
pub mod types;

pub use {
    error::{Error, FromMessage, Result},
    types::{MediaId, PostId},
};
