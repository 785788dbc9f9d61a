//! Left-right model assembly.
//!
//! Combines a time-independent two-state (junk/whisker) transition
//! estimate with the ordinal classifier's discovered state space. The same
//! 2x2 transition scalars are replicated onto every ordinal position; the
//! emission statistics, retrained on the ordinal state space, differ per
//! position.
//!
//! Slot wiring follows the ordinal counter: a junk segment leaves the
//! counter unchanged, a whisker advances it. So `junk{t}` transitions stay
//! at slot `t` while `whisker{t}` transitions land at slot `t+1`.

use crate::classify::{
    ordinal_order, Classifier, Label, MultiStateClassifier, TwoStateClassifier,
};
use crate::emission::{EmissionConfig, EmissionEstimator, EmissionTables};
use crate::features::FeatureSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};
use wt_common::{Error, LabelSet, Result, Segment, TrainingSet};
use wt_math::normalize_counts_log2;

/// The two time-independent state families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlatState {
    Junk,
    Whisker,
}

impl FlatState {
    /// Number of flat states.
    pub const NUM_STATES: usize = 2;

    /// Both families in index order.
    pub const ALL: [FlatState; 2] = [FlatState::Junk, FlatState::Whisker];

    /// Index of this family (for the 2x2 count tables).
    pub fn index(&self) -> usize {
        match self {
            FlatState::Junk => 0,
            FlatState::Whisker => 1,
        }
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(FlatState::Junk),
            1 => Some(FlatState::Whisker),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FlatState::Junk => "junk",
            FlatState::Whisker => "whisker",
        }
    }

    /// Ordinal state name at slot `t`, e.g. `whisker2`.
    pub fn slot_name(&self, t: usize) -> String {
        format!("{}{}", self.name(), t)
    }

    /// Family of an ordinal state name.
    pub fn of_name(name: &str) -> FlatState {
        if name.starts_with("whisker") {
            FlatState::Whisker
        } else {
            FlatState::Junk
        }
    }
}

impl std::fmt::Display for FlatState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A fitted left-right HMM over the discovered ordinal state space.
///
/// Immutable once trained; retraining builds a new value, so evaluation and
/// decoding may run concurrently with a retrain that replaces the handle.
#[derive(Debug, Clone)]
pub struct LeftRightModel {
    states: Vec<String>,
    /// state name -> log2 start probability.
    start: BTreeMap<String, f64>,
    /// source name -> (destination name -> log2 probability).
    transitions: BTreeMap<String, BTreeMap<String, f64>>,
    /// log2 end probability per flat family, indexed by `FlatState::index`.
    end: [f64; 2],
    nsteps: usize,
    emissions: EmissionTables,
}

impl LeftRightModel {
    /// Train the full model: time-independent transition estimate, ordinal
    /// state discovery, and emission tables on the ordinal state space.
    pub fn train(
        training: &TrainingSet,
        labels: &LabelSet,
        features: FeatureSet,
        config: EmissionConfig,
    ) -> Result<Self> {
        if training.is_empty() {
            return Err(Error::DegenerateTrainingData {
                reason: "training set contains no frames".to_string(),
            });
        }

        let (start_log, trans_log, end_log) = estimate_time_independent(training, labels)?;

        let ordinal = MultiStateClassifier::from_training(training, labels);
        let nsteps = ordinal.nsteps();
        if nsteps == 0 {
            return Err(Error::DegenerateTrainingData {
                reason: "no trajectory-labeled frames found (nsteps = 0)".to_string(),
            });
        }

        let emissions =
            EmissionEstimator::new(features, config).estimate(training, &ordinal)?;

        let states = ordinal.states().to_vec();
        let have: BTreeSet<&str> = states.iter().map(String::as_str).collect();

        let mut start = BTreeMap::new();
        for family in FlatState::ALL {
            let name = family.slot_name(0);
            if have.contains(name.as_str()) {
                start.insert(name, start_log[family.index()]);
            }
        }

        let mut transitions: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
        for t in 0..=nsteps {
            for src in FlatState::ALL {
                let src_name = src.slot_name(t);
                if !have.contains(src_name.as_str()) {
                    continue;
                }
                // Junk keeps the counter, whisker advances it.
                let dst_t = match src {
                    FlatState::Junk => t,
                    FlatState::Whisker => t + 1,
                };
                for dst in FlatState::ALL {
                    let dst_name = dst.slot_name(dst_t);
                    if !have.contains(dst_name.as_str()) {
                        continue;
                    }
                    transitions
                        .entry(src_name.clone())
                        .or_default()
                        .insert(dst_name, trans_log[src.index()][dst.index()]);
                }
            }
        }

        info!(
            n_states = states.len(),
            nsteps, "trained left-right model"
        );

        Ok(LeftRightModel {
            states,
            start,
            transitions,
            end: end_log,
            nsteps,
            emissions,
        })
    }

    /// Model state names in enumeration order; matrix accessors follow this
    /// order.
    pub fn states(&self) -> &[String] {
        &self.states
    }

    /// Number of ordinal repeats in the topology.
    pub fn nsteps(&self) -> usize {
        self.nsteps
    }

    /// state name -> log2 start probability. States that cannot begin a
    /// frame are absent.
    pub fn start_log_probs(&self) -> &BTreeMap<String, f64> {
        &self.start
    }

    /// log2 end probability per flat family, indexed by `FlatState::index`.
    pub fn end_log_probs(&self) -> [f64; 2] {
        self.end
    }

    /// The fitted emission tables.
    pub fn emissions(&self) -> &EmissionTables {
        &self.emissions
    }

    /// Square transition matrix of log2 probabilities in model state order.
    ///
    /// Absent transitions are NEG_INFINITY (log of zero probability), not
    /// 0.0, so a missing edge can never masquerade as a certain one.
    pub fn transition_matrix(&self) -> Vec<Vec<f64>> {
        let n = self.states.len();
        let mut matrix = vec![vec![f64::NEG_INFINITY; n]; n];
        for (i, src) in self.states.iter().enumerate() {
            if let Some(row) = self.transitions.get(src) {
                for (j, dst) in self.states.iter().enumerate() {
                    if let Some(&log_p) = row.get(dst) {
                        matrix[i][j] = log_p;
                    }
                }
            }
        }
        matrix
    }

    /// log2 P(segment | state) under the fitted emission tables.
    pub fn evaluate(&self, segment: &Segment, state: usize) -> Result<f64> {
        self.emissions.evaluate(segment, state)
    }

    /// `evaluate` addressed by state name.
    pub fn evaluate_named(&self, segment: &Segment, state: &str) -> Result<f64> {
        self.emissions.evaluate_named(segment, state)
    }
}

/// Scan each labeled frame's binary-classified segment sequence and count
/// start, transition, and end events; normalize and log2-transform.
///
/// Frames with no ground truth are skipped; an empty frame contributes
/// nothing.
fn estimate_time_independent(
    training: &TrainingSet,
    labels: &LabelSet,
) -> Result<([f64; 2], [[f64; 2]; 2], [f64; 2])> {
    let flat = TwoStateClassifier::from_labels(labels);
    let mut start = [0.0f64; FlatState::NUM_STATES];
    let mut trans = [[0.0f64; FlatState::NUM_STATES]; FlatState::NUM_STATES];
    let mut end = [0.0f64; FlatState::NUM_STATES];
    let mut n_frames = 0usize;

    for (fid, segments) in training {
        let ordered = ordinal_order(segments);
        let mut sequence = Vec::with_capacity(ordered.len());
        for seg in &ordered {
            match flat.classify(*fid, seg.id) {
                Label::State(s) => sequence.push(s),
                Label::Unlabeled => {
                    sequence.clear();
                    break;
                }
            }
        }
        let (&first, &last) = match (sequence.first(), sequence.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => continue,
        };
        n_frames += 1;
        start[first] += 1.0;
        for pair in sequence.windows(2) {
            trans[pair[0]][pair[1]] += 1.0;
        }
        end[last] += 1.0;
    }

    if n_frames == 0 {
        return Err(Error::DegenerateTrainingData {
            reason: "no ground-truth frames in training set".to_string(),
        });
    }
    debug!(n_frames, "counted time-independent transitions");

    let start_log = normalize_log_pair(&start, "start vector")?;
    let end_log = normalize_log_pair(&end, "end vector")?;
    let mut trans_log = [[0.0f64; 2]; 2];
    for (family, row) in FlatState::ALL.iter().zip(trans.iter()) {
        trans_log[family.index()] =
            normalize_log_pair(row, &format!("transition row '{}'", family.name()))?;
    }
    Ok((start_log, trans_log, end_log))
}

fn normalize_log_pair(counts: &[f64; 2], what: &str) -> Result<[f64; 2]> {
    let log_p = normalize_counts_log2(counts).ok_or_else(|| Error::DegenerateTrainingData {
        reason: format!("{what} has zero total count"),
    })?;
    Ok([log_p[0], log_p[1]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use wt_common::{FrameId, SegmentId, TracePoint, TrajectoryId};

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    fn seg(fid: u32, wid: u32, y: f64, len: f64, score: f64) -> Segment {
        Segment::new(
            FrameId(fid),
            SegmentId(wid),
            vec![
                TracePoint::new(0.0, y),
                TracePoint::new(len / 2.0, y),
                TracePoint::new(len, y),
            ],
            vec![score; 3],
        )
    }

    fn insert(training: &mut TrainingSet, s: Segment) {
        training.entry(s.frame).or_default().insert(s.id, s);
    }

    /// Four labeled frames with known counts: frame 0 runs junk, whisker;
    /// frames 1-3 run whisker, junk.
    fn known_counts() -> (TrainingSet, LabelSet) {
        let mut training = TrainingSet::new();
        let mut traj0 = BTreeMap::new();

        insert(&mut training, seg(0, 0, 5.0, 6.0, 0.2)); // junk first
        insert(&mut training, seg(0, 1, 10.0, 100.0, 0.9));
        traj0.insert(FrameId(0), SegmentId(1));
        for fid in 1..4u32 {
            insert(&mut training, seg(fid, 0, 10.0, 100.0, 0.9));
            insert(&mut training, seg(fid, 1, 30.0, 6.0, 0.2));
            traj0.insert(FrameId(fid), SegmentId(0));
        }

        let mut labels = LabelSet::new();
        labels.insert(TrajectoryId(0), traj0);
        (training, labels)
    }

    fn trained() -> LeftRightModel {
        let (training, labels) = known_counts();
        LeftRightModel::train(
            &training,
            &labels,
            FeatureSet::standard(),
            EmissionConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_flat_state_round_trip() {
        for family in FlatState::ALL {
            assert_eq!(FlatState::from_index(family.index()), Some(family));
        }
        assert_eq!(FlatState::of_name("whisker3"), FlatState::Whisker);
        assert_eq!(FlatState::of_name("junk0"), FlatState::Junk);
        assert_eq!(FlatState::Whisker.slot_name(2), "whisker2");
    }

    #[test]
    fn test_discovered_state_space() {
        let model = trained();
        assert_eq!(model.nsteps(), 1);
        assert_eq!(
            model.states(),
            &[
                "junk0".to_string(),
                "whisker0".to_string(),
                "junk1".to_string(),
            ]
        );
    }

    #[test]
    fn test_start_probabilities_from_known_counts() {
        let model = trained();
        let start = model.start_log_probs();
        // 1 of 4 frames starts with junk, 3 with a whisker.
        assert!(approx_eq(start["junk0"].exp2(), 0.25, 1e-9));
        assert!(approx_eq(start["whisker0"].exp2(), 0.75, 1e-9));
        let total: f64 = start.values().map(|p| p.exp2()).sum();
        assert!(approx_eq(total, 1.0, 1e-9));
    }

    #[test]
    fn test_end_probabilities_from_known_counts() {
        let model = trained();
        let end = model.end_log_probs();
        // 3 frames end in junk, 1 ends in a whisker.
        assert!(approx_eq(end[FlatState::Junk.index()].exp2(), 0.75, 1e-9));
        assert!(approx_eq(end[FlatState::Whisker.index()].exp2(), 0.25, 1e-9));
        let total: f64 = end.iter().map(|p| p.exp2()).sum();
        assert!(approx_eq(total, 1.0, 1e-9));
    }

    #[test]
    fn test_transition_matrix_rows_are_stochastic() {
        let model = trained();
        let matrix = model.transition_matrix();
        let n = model.states().len();
        assert_eq!(matrix.len(), n);
        for (i, row) in matrix.iter().enumerate() {
            assert_eq!(row.len(), n);
            let total: f64 = row.iter().map(|p| p.exp2()).sum();
            // Rows with outgoing edges are stochastic; a terminal slot has
            // no outgoing mass at all.
            assert!(
                approx_eq(total, 1.0, 1e-9) || total == 0.0,
                "row {i} sums to {total}"
            );
        }
    }

    #[test]
    fn test_counter_semantics_in_transitions() {
        let model = trained();
        let ix = |name: &str| model.states().iter().position(|s| s == name).unwrap();
        let matrix = model.transition_matrix();

        // All pairs in training are (junk -> whisker) or (whisker -> junk),
        // so those replicated scalars are certainty and the rest are -inf.
        assert!(approx_eq(matrix[ix("junk0")][ix("whisker0")], 0.0, 1e-9));
        assert!(approx_eq(matrix[ix("whisker0")][ix("junk1")], 0.0, 1e-9));
        assert_eq!(matrix[ix("junk0")][ix("junk0")], f64::NEG_INFINITY);
        // A whisker advances the counter; it can never stay at its own slot.
        assert_eq!(matrix[ix("whisker0")][ix("junk0")], f64::NEG_INFINITY);
        assert_eq!(matrix[ix("whisker0")][ix("whisker0")], f64::NEG_INFINITY);
    }

    #[test]
    fn test_evaluate_named_prefers_matching_state() {
        let model = trained();
        let whisker = seg(9, 0, 10.0, 100.0, 0.9);
        let junk = seg(9, 1, 30.0, 6.0, 0.2);
        assert!(
            model.evaluate_named(&whisker, "whisker0").unwrap()
                > model.evaluate_named(&whisker, "junk1").unwrap()
        );
        assert!(
            model.evaluate_named(&junk, "junk1").unwrap()
                > model.evaluate_named(&junk, "whisker0").unwrap()
        );
    }

    #[test]
    fn test_empty_training_set_fails() {
        let training = TrainingSet::new();
        let labels = LabelSet::new();
        let err = LeftRightModel::train(
            &training,
            &labels,
            FeatureSet::standard(),
            EmissionConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::DegenerateTrainingData { .. }));
    }

    #[test]
    fn test_unlabeled_training_set_fails() {
        let (training, _) = known_counts();
        let labels = LabelSet::new();
        let err = LeftRightModel::train(
            &training,
            &labels,
            FeatureSet::standard(),
            EmissionConfig::default(),
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("no ground-truth frames"), "got: {msg}");
    }

    #[test]
    fn test_zero_count_transition_row_fails() {
        // Single-segment frames produce no consecutive pairs, so both
        // transition rows normalize over zero counts.
        let mut training = TrainingSet::new();
        let mut traj0 = BTreeMap::new();
        for fid in 0..3u32 {
            insert(&mut training, seg(fid, 0, 10.0, 100.0, 0.9));
            traj0.insert(FrameId(fid), SegmentId(0));
        }
        let mut labels = LabelSet::new();
        labels.insert(TrajectoryId(0), traj0);
        let err = LeftRightModel::train(
            &training,
            &labels,
            FeatureSet::standard(),
            EmissionConfig::default(),
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("transition row"), "got: {msg}");
    }
}
