//! Error taxonomy for `planet-core`.
//!
//! Most degraded conditions (clamped parameters, a missing exemplar) are not
//! errors — they apply a documented fallback and surface an [`EngineWarning`]
//! instead. `EngineError` is reserved for conditions the caller must react to.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to load exemplar '{id}': {source}")]
    ExemplarLoad { id: String, source: std::io::Error },

    #[error("topology surgery rejected: {reason}")]
    TopologySurgery { reason: String },

    #[error("snapshot mismatch: expected step {expected}, found {actual}")]
    SnapshotMismatch { expected: u64, actual: u64 },

    #[error("no snapshot available to restore")]
    NoSnapshot,
}

pub type EngineResult<T> = Result<T, EngineError>;

/// A non-fatal condition reported back to the caller instead of failing.
/// Mirrors the "clamp with a warning; do not refuse" rule for parameters and
/// the "one warning per exemplar, throttled" rule for exemplar loading.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineWarning {
    ParameterClamped { field: &'static str, requested: f64, clamped: f64 },
    ExemplarFallback { id: String, reason: String },
    TopologySurgerySkipped { reason: String },
}

impl std::fmt::Display for EngineWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineWarning::ParameterClamped { field, requested, clamped } => {
                write!(f, "parameter '{field}' clamped: requested {requested}, using {clamped}")
            }
            EngineWarning::ExemplarFallback { id, reason } => {
                write!(f, "exemplar '{id}' unavailable ({reason}), falling back to baseline")
            }
            EngineWarning::TopologySurgerySkipped { reason } => {
                write!(f, "topology surgery skipped: {reason}")
            }
        }
    }
}
