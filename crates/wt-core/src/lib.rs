//! Whisker Triage core inference engine.
//!
//! Classifies per-frame tracked whisker segments into a temporal label
//! sequence: junk segments vs. trajectory members, and in the multi-state
//! variant the ordinal slot each member occupies within its frame. The
//! model is a left-right HMM whose emission densities are estimated
//! non-parametrically from labeled training data.
//!
//! Training starts from segment tables plus trajectory labels. State-space
//! classifiers assign per-segment labels, histogram emission tables are
//! fitted per (feature, state) pair, and the left-right model combines
//! them with a time-independent transition estimate. Viterbi decoding then
//! labels unlabeled per-frame segment sets.
//!
//! All probabilities are carried in log base 2; nothing converts back to
//! linear space internally.

pub mod classify;
pub mod emission;
pub mod features;
pub mod model;
pub mod viterbi;

pub use classify::{Classifier, Label, MultiStateClassifier, TwoStateClassifier};
pub use emission::{
    EmissionConfig, EmissionEstimator, EmissionTables, FeatureBins, OutOfRangePolicy,
};
pub use features::FeatureSet;
pub use model::{FlatState, LeftRightModel};
pub use viterbi::DecodedLabel;
