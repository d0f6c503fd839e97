//! Errors raised by transform construction and frame lookups.

use thiserror::Error;

/// Failure to build a transform or to resolve one from the frame tree.
///
/// None of these are fatal to the estimator: callers hold the last good
/// value and log the error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TfError {
    #[error("Unknown frame: {0}")]
    UnknownFrame(String),

    #[error("Transform {parent} -> {child} is stale ({age_ms} ms old, limit {max_age_ms} ms)")]
    Stale {
        parent: String,
        child: String,
        age_ms: i64,
        max_age_ms: i64,
    },

    #[error("Rotation cannot be normalised (|q| = {norm})")]
    InvalidRotation { norm: f64 },

    #[error("Non-finite value in {0}")]
    NonFinite(&'static str),
}
