//! Feature extraction: project a tracked segment to a fixed-length real
//! vector.
//!
//! Each feature is an opaque scalar mapping from a segment to a real
//! number. The ordered feature list is fixed at construction and never
//! mutated afterward; histogram tables index features by this order.

use wt_common::{Error, Result, Segment};

/// A scalar feature function.
pub type FeatureFn = fn(&Segment) -> Result<f64>;

/// An ordered, named list of feature functions.
#[derive(Clone)]
pub struct FeatureSet {
    features: Vec<(&'static str, FeatureFn)>,
}

impl std::fmt::Debug for FeatureSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureSet")
            .field("names", &self.names())
            .finish()
    }
}

impl FeatureSet {
    /// The reference six-feature set.
    pub fn standard() -> Self {
        FeatureSet {
            features: vec![
                ("Length(px)", path_length as FeatureFn),
                ("Median score", median_score),
                ("Angle at follicle (deg)", root_angle_deg),
                ("Mean curvature (1/px)", mean_curvature),
                ("Follicle x position (px)", follicle_x),
                ("Follicle y position (px)", follicle_y),
            ],
        }
    }

    /// Build a custom feature set. Order is significant.
    pub fn new(features: Vec<(&'static str, FeatureFn)>) -> Self {
        FeatureSet { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.features.iter().map(|(n, _)| *n).collect()
    }

    /// Name of the feature at `index`.
    pub fn name(&self, index: usize) -> &'static str {
        self.features[index].0
    }

    /// Evaluate every feature on `segment`, in registration order.
    ///
    /// Deterministic and side-effect free. Errors from a feature function
    /// propagate as `Error::FeatureComputation`.
    pub fn feature_vector(&self, segment: &Segment) -> Result<Vec<f64>> {
        self.features.iter().map(|(_, f)| f(segment)).collect()
    }
}

fn malformed(feature: &str, reason: &str) -> Error {
    Error::FeatureComputation {
        feature: feature.to_string(),
        reason: reason.to_string(),
    }
}

/// Integrated polyline path length in pixels.
pub fn path_length(seg: &Segment) -> Result<f64> {
    if seg.trace.len() < 2 {
        return Err(malformed("Length(px)", "trace has fewer than 2 points"));
    }
    let mut total = 0.0;
    for pair in seg.trace.windows(2) {
        total += (pair[1].x - pair[0].x).hypot(pair[1].y - pair[0].y);
    }
    Ok(total)
}

/// Median of the per-point tracing scores.
pub fn median_score(seg: &Segment) -> Result<f64> {
    if seg.scores.is_empty() {
        return Err(malformed("Median score", "segment has no scores"));
    }
    let mut sorted = seg.scores.clone();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Ok(sorted[mid])
    } else {
        Ok(0.5 * (sorted[mid - 1] + sorted[mid]))
    }
}

/// Angle of the trace at the follicle, in degrees.
pub fn root_angle_deg(seg: &Segment) -> Result<f64> {
    if seg.trace.len() < 2 {
        return Err(malformed(
            "Angle at follicle (deg)",
            "trace has fewer than 2 points",
        ));
    }
    let dx = seg.trace[1].x - seg.trace[0].x;
    let dy = seg.trace[1].y - seg.trace[0].y;
    Ok(dy.atan2(dx).to_degrees())
}

/// Mean unsigned curvature along the trace, in 1/px.
///
/// Approximated as total turning angle divided by path length.
pub fn mean_curvature(seg: &Segment) -> Result<f64> {
    if seg.trace.len() < 3 {
        return Err(malformed(
            "Mean curvature (1/px)",
            "trace has fewer than 3 points",
        ));
    }
    let length = path_length(seg)?;
    if length <= 0.0 {
        return Err(malformed("Mean curvature (1/px)", "trace has zero length"));
    }
    let mut turning = 0.0;
    for triple in seg.trace.windows(3) {
        let a = (
            triple[1].x - triple[0].x,
            triple[1].y - triple[0].y,
        );
        let b = (
            triple[2].x - triple[1].x,
            triple[2].y - triple[1].y,
        );
        let cross = a.0 * b.1 - a.1 * b.0;
        let dot = a.0 * b.0 + a.1 * b.1;
        turning += cross.atan2(dot).abs();
    }
    Ok(turning / length)
}

/// Follicle (root) x position in pixels.
pub fn follicle_x(seg: &Segment) -> Result<f64> {
    seg.root()
        .map(|p| p.x)
        .ok_or_else(|| malformed("Follicle x position (px)", "trace is empty"))
}

/// Follicle (root) y position in pixels.
pub fn follicle_y(seg: &Segment) -> Result<f64> {
    seg.root()
        .map(|p| p.y)
        .ok_or_else(|| malformed("Follicle y position (px)", "trace is empty"))
}
