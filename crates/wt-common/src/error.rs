//! Error types for Whisker Triage.
//!
//! The core is pure computation, so no error here is transient and no retry
//! is meaningful. Each variant carries enough context to report which
//! feature, state, or value caused the failure:
//!
//! ```text
//! feature 'Follicle y position (px)' value 812.4 outside fitted range [3.1, 477.9]
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for Whisker Triage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// A feature function could not evaluate a segment.
    Feature,
    /// Training data is insufficient for estimation.
    Training,
    /// A fitted model was queried with an out-of-range observation.
    Evaluation,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Feature => write!(f, "feature"),
            ErrorCategory::Training => write!(f, "training"),
            ErrorCategory::Evaluation => write!(f, "evaluation"),
        }
    }
}

/// Unified error type for Whisker Triage.
#[derive(Error, Debug)]
pub enum Error {
    /// A feature function cannot evaluate a malformed segment.
    #[error("feature '{feature}' cannot be computed: {reason}")]
    FeatureComputation { feature: String, reason: String },

    /// Training data is empty, unlabeled, or produces a zero-count
    /// normalization row.
    #[error("degenerate training data: {reason}")]
    DegenerateTrainingData { reason: String },

    /// An evaluated feature falls outside the fitted histogram range and the
    /// configured policy rejects rather than clamps.
    #[error("feature '{feature}' value {value} outside fitted range [{min}, {max}]")]
    FeatureOutOfRange {
        feature: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A state name or index was requested that the fitted model does not
    /// contain.
    #[error("unknown state '{state}'")]
    UnknownState { state: String },

    /// No state path through the fitted topology explains an observed
    /// segment sequence during decoding.
    #[error("frame {frame}: no state path explains the observed segment sequence")]
    InfeasibleSequence { frame: String },
}

impl Error {
    /// Category for grouping and reporting.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::FeatureComputation { .. } => ErrorCategory::Feature,
            Error::DegenerateTrainingData { .. } => ErrorCategory::Training,
            Error::FeatureOutOfRange { .. }
            | Error::UnknownState { .. }
            | Error::InfeasibleSequence { .. } => ErrorCategory::Evaluation,
        }
    }
}
