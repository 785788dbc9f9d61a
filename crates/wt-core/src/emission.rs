//! Non-parametric emission density estimation.
//!
//! For every (feature, state) pair the estimator builds a uniform 1-D
//! histogram over the labeled training rows, Laplace-smoothes it (+1 per
//! bin, so no bin has zero probability), normalizes, and stores log2 bin
//! probabilities. Evaluating a segment against a state discretizes each
//! feature to its bin and sums the stored log-probabilities, a naive-Bayes
//! emission model with features independent given the state.
//!
//! Bin ranges are computed over the same row set used for the histograms:
//! unlabeled rows are filtered out before per-feature extrema are taken.

use crate::classify::Classifier;
use crate::features::FeatureSet;
use serde::{Deserialize, Serialize};
use tracing::debug;
use wt_common::{Error, Result, Segment, TrainingSet};
use wt_math::normalize_counts_log2;

/// What `evaluate` does with a feature value outside the fitted bin range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfRangePolicy {
    /// Discretize to the nearest edge bin. The default: an out-of-range
    /// observation still receives the (small, smoothed) edge-bin
    /// probability instead of aborting evaluation.
    Clamp,
    /// Fail with `Error::FeatureOutOfRange`.
    Reject,
}

/// Estimator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmissionConfig {
    /// Number of uniform bins per feature histogram.
    pub n_bins: usize,
    /// Out-of-range discretization policy for evaluation.
    pub out_of_range: OutOfRangePolicy,
}

impl Default for EmissionConfig {
    fn default() -> Self {
        EmissionConfig {
            n_bins: 64,
            out_of_range: OutOfRangePolicy::Clamp,
        }
    }
}

/// Fitted uniform binning for one feature.
///
/// Bin `i` covers `[min + i*width, min + (i+1)*width)`; the top edge of the
/// last bin is closed so the training maximum lands in bin `n_bins - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureBins {
    pub min: f64,
    pub width: f64,
    pub n_bins: usize,
}

impl FeatureBins {
    /// Fit a binning over observed values.
    ///
    /// A zero-width range (all values equal) degenerates to a single bin of
    /// width 1.0 centered on the constant, rather than dividing by zero.
    fn fit(min: f64, max: f64, n_bins: usize) -> Self {
        if max > min {
            FeatureBins {
                min,
                width: (max - min) / n_bins as f64,
                n_bins,
            }
        } else {
            FeatureBins {
                min,
                width: 1.0,
                n_bins: 1,
            }
        }
    }

    /// Upper edge of the fitted range.
    pub fn max(&self) -> f64 {
        self.min + self.width * self.n_bins as f64
    }

    /// In-range bin index via `floor((value - min) / width)`, or `None`
    /// when the value falls outside `[min, max]`.
    pub fn index(&self, value: f64) -> Option<usize> {
        if !value.is_finite() || value < self.min || value > self.max() {
            return None;
        }
        let i = ((value - self.min) / self.width).floor() as usize;
        Some(i.min(self.n_bins - 1))
    }
}

/// Builds emission tables from labeled training data.
#[derive(Debug, Clone)]
pub struct EmissionEstimator {
    features: FeatureSet,
    config: EmissionConfig,
}

impl EmissionEstimator {
    pub fn new(features: FeatureSet, config: EmissionConfig) -> Self {
        EmissionEstimator { features, config }
    }

    /// Estimate per-(feature, state) histograms from the training set.
    ///
    /// Rows whose classifier output is `Unlabeled` are excluded before the
    /// per-feature extrema and the histograms are computed. Returns an
    /// immutable fitted value; retraining builds a new one.
    pub fn estimate(
        &self,
        training: &TrainingSet,
        classifier: &dyn Classifier,
    ) -> Result<EmissionTables> {
        let states: Vec<String> = classifier.states().to_vec();
        if states.is_empty() {
            return Err(Error::DegenerateTrainingData {
                reason: "classifier has an empty state space".to_string(),
            });
        }
        let n_feat = self.features.len();

        // Labeled rows only: (state index, feature vector).
        let mut rows: Vec<(usize, Vec<f64>)> = Vec::new();
        for (fid, segments) in training {
            for seg in segments.values() {
                if let Some(state) = classifier.classify(*fid, seg.id).state() {
                    rows.push((state, self.features.feature_vector(seg)?));
                }
            }
        }
        if rows.is_empty() {
            return Err(Error::DegenerateTrainingData {
                reason: "no labeled training rows".to_string(),
            });
        }
        debug!(
            n_rows = rows.len(),
            n_states = states.len(),
            n_feat,
            "estimating emission histograms"
        );

        // Per-feature extrema over the filtered row set.
        let mut bins = Vec::with_capacity(n_feat);
        for f in 0..n_feat {
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            for (_, fv) in &rows {
                min = min.min(fv[f]);
                max = max.max(fv[f]);
            }
            bins.push(FeatureBins::fit(min, max, self.config.n_bins));
        }

        // Histogram, +1 smoothing, normalize, log2.
        let mut log_probs = Vec::with_capacity(states.len());
        for state in 0..states.len() {
            let mut per_feature = Vec::with_capacity(n_feat);
            for f in 0..n_feat {
                let fb = &bins[f];
                let mut counts = vec![1.0; fb.n_bins];
                for (s, fv) in &rows {
                    if *s == state {
                        // In range by construction; the extrema came from
                        // this row set.
                        if let Some(i) = fb.index(fv[f]) {
                            counts[i] += 1.0;
                        }
                    }
                }
                let log_p = normalize_counts_log2(&counts).ok_or_else(|| {
                    Error::DegenerateTrainingData {
                        reason: format!(
                            "histogram for state '{}', feature '{}' has zero total count",
                            states[state],
                            self.features.name(f)
                        ),
                    }
                })?;
                per_feature.push(log_p);
            }
            log_probs.push(per_feature);
        }

        Ok(EmissionTables {
            features: self.features.clone(),
            config: self.config,
            states,
            bins,
            log_probs,
        })
    }
}

/// Fitted emission tables: log2 P(segment | state) via per-feature
/// histograms. Immutable once built.
#[derive(Debug, Clone)]
pub struct EmissionTables {
    features: FeatureSet,
    config: EmissionConfig,
    states: Vec<String>,
    bins: Vec<FeatureBins>,
    /// Indexed `[state][feature][bin]`, values are log2 probabilities.
    log_probs: Vec<Vec<Vec<f64>>>,
}

impl EmissionTables {
    pub fn states(&self) -> &[String] {
        &self.states
    }

    pub fn state_index(&self, name: &str) -> Option<usize> {
        self.states.iter().position(|s| s == name)
    }

    pub fn feature_set(&self) -> &FeatureSet {
        &self.features
    }

    /// Fitted binning for each feature, in feature order.
    pub fn bins(&self) -> &[FeatureBins] {
        &self.bins
    }

    /// Stored log2 bin probabilities for one (state, feature) histogram.
    pub fn histogram(&self, state: usize, feature: usize) -> &[f64] {
        &self.log_probs[state][feature]
    }

    /// log2 P(segment | state): sum of per-feature log2 bin probabilities.
    ///
    /// Out-of-range feature values follow the configured policy: clamp to
    /// the nearest edge bin, or fail naming the feature, value, and range.
    /// A non-finite value has no nearest bin and fails under either policy.
    pub fn evaluate(&self, segment: &Segment, state: usize) -> Result<f64> {
        if state >= self.states.len() {
            return Err(Error::UnknownState {
                state: format!("#{state}"),
            });
        }
        let fv = self.features.feature_vector(segment)?;
        let mut log_p = 0.0;
        for (f, &value) in fv.iter().enumerate() {
            let fb = &self.bins[f];
            let i = match fb.index(value) {
                Some(i) => i,
                None if !value.is_finite() => {
                    return Err(Error::FeatureOutOfRange {
                        feature: self.features.name(f).to_string(),
                        value,
                        min: fb.min,
                        max: fb.max(),
                    });
                }
                None => match self.config.out_of_range {
                    OutOfRangePolicy::Clamp => {
                        if value < fb.min {
                            0
                        } else {
                            fb.n_bins - 1
                        }
                    }
                    OutOfRangePolicy::Reject => {
                        return Err(Error::FeatureOutOfRange {
                            feature: self.features.name(f).to_string(),
                            value,
                            min: fb.min,
                            max: fb.max(),
                        });
                    }
                },
            };
            log_p += self.log_probs[state][f][i];
        }
        Ok(log_p)
    }

    /// `evaluate` addressed by state name.
    pub fn evaluate_named(&self, segment: &Segment, state: &str) -> Result<f64> {
        let ix = self.state_index(state).ok_or_else(|| Error::UnknownState {
            state: state.to_string(),
        })?;
        self.evaluate(segment, ix)
    }
}
