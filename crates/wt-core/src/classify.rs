//! State-space classifiers: assign a training label to every training
//! segment and define the resulting state set.
//!
//! Two strategies exist. The two-state classifier is the coarse junk vs.
//! trajectory-member split used for the time-independent transition
//! estimate. The multi-state classifier ranks trajectory members within a
//! frame by a geometric key and synthesizes one junk and one whisker state
//! name per ordinal slot; its discovered state space becomes the left-right
//! topology.
//!
//! State enumeration is deterministic: names sort by (ordinal slot, family)
//! so repeated training runs produce identical index assignments.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use wt_common::{FrameId, LabelSet, Segment, SegmentId, TrainingSet};

/// Classification outcome for one training segment.
///
/// `Unlabeled` marks frames with no ground truth; those rows are excluded
/// from density estimation and transition counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Unlabeled,
    State(usize),
}

impl Label {
    /// The state index, if this segment has ground truth.
    pub fn state(&self) -> Option<usize> {
        match self {
            Label::Unlabeled => None,
            Label::State(s) => Some(*s),
        }
    }
}

/// A fitted state-space classifier.
pub trait Classifier {
    /// The state names, in deterministic enumeration order. A `Label::State`
    /// index always points into this slice.
    fn states(&self) -> &[String];

    /// Classify one training segment by its identifying pair.
    fn classify(&self, frame: FrameId, segment: SegmentId) -> Label;
}

/// Segments of one frame in the strict geometric ordering used by both the
/// ordinal classifier and the transition estimate: ascending first trace
/// point y, ties broken by segment id.
pub fn ordinal_order(segments: &BTreeMap<SegmentId, Segment>) -> Vec<&Segment> {
    let mut ordered: Vec<&Segment> = segments.values().collect();
    ordered.sort_by(|a, b| {
        let ka = a.root().map(|p| p.y).unwrap_or(f64::INFINITY);
        let kb = b.root().map(|p| p.y).unwrap_or(f64::INFINITY);
        ka.total_cmp(&kb).then(a.id.cmp(&b.id))
    });
    ordered
}

fn labeled_pairs(labels: &LabelSet) -> BTreeSet<(FrameId, SegmentId)> {
    labels
        .values()
        .flat_map(|frames| frames.iter().map(|(fid, wid)| (*fid, *wid)))
        .collect()
}

fn labeled_frames(labels: &LabelSet) -> BTreeSet<FrameId> {
    labels
        .values()
        .flat_map(|frames| frames.keys().copied())
        .collect()
}

/// Binary junk / trajectory-member classifier.
#[derive(Debug, Clone)]
pub struct TwoStateClassifier {
    states: Vec<String>,
    labeled: BTreeSet<(FrameId, SegmentId)>,
    frames: BTreeSet<FrameId>,
}

impl TwoStateClassifier {
    /// State index of junk segments.
    pub const JUNK: usize = 0;
    /// State index of trajectory members.
    pub const WHISKER: usize = 1;

    /// Build the classifier from the flattened trajectory label table.
    pub fn from_labels(labels: &LabelSet) -> Self {
        TwoStateClassifier {
            states: vec!["junk".to_string(), "whiskers".to_string()],
            labeled: labeled_pairs(labels),
            frames: labeled_frames(labels),
        }
    }
}

impl Classifier for TwoStateClassifier {
    fn states(&self) -> &[String] {
        &self.states
    }

    fn classify(&self, frame: FrameId, segment: SegmentId) -> Label {
        if !self.frames.contains(&frame) {
            return Label::Unlabeled;
        }
        if self.labeled.contains(&(frame, segment)) {
            Label::State(Self::WHISKER)
        } else {
            Label::State(Self::JUNK)
        }
    }
}

/// Left-right ordinal classifier.
///
/// Per frame, segments are walked in `ordinal_order`; a counter `t` starts
/// at 0, trajectory members receive `whisker{t}` and then increment it,
/// non-members receive `junk{t}` at the current counter value. The maximum
/// counter over all frames is `nsteps`, the number of ordinal repeats the
/// left-right topology needs.
#[derive(Debug, Clone)]
pub struct MultiStateClassifier {
    states: Vec<String>,
    class_map: BTreeMap<(FrameId, SegmentId), usize>,
    frames: BTreeSet<FrameId>,
    nsteps: usize,
}

impl MultiStateClassifier {
    /// Build the classifier and discover the ordinal state space.
    pub fn from_training(training: &TrainingSet, labels: &LabelSet) -> Self {
        let labeled = labeled_pairs(labels);
        let frames = labeled_frames(labels);

        let mut names: BTreeSet<String> = BTreeSet::new();
        let mut name_map: BTreeMap<(FrameId, SegmentId), String> = BTreeMap::new();
        let mut nsteps = 0;

        for (fid, segments) in training {
            // State discovery runs over ground-truth frames only; segments
            // in other frames classify as Unlabeled.
            if !frames.contains(fid) {
                continue;
            }
            let mut t = 0;
            for seg in ordinal_order(segments) {
                let name = if labeled.contains(&(*fid, seg.id)) {
                    let name = format!("whisker{t}");
                    t += 1;
                    name
                } else {
                    format!("junk{t}")
                };
                names.insert(name.clone());
                name_map.insert((*fid, seg.id), name);
            }
            nsteps = nsteps.max(t);
        }

        let mut states: Vec<String> = names.into_iter().collect();
        states.sort_by_key(|name| state_sort_key(name));
        let index: BTreeMap<&str, usize> = states
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_str(), i))
            .collect();

        let class_map = name_map
            .into_iter()
            .map(|(key, name)| (key, index[name.as_str()]))
            .collect();

        debug!(
            n_states = states.len(),
            nsteps, "discovered ordinal state space"
        );

        MultiStateClassifier {
            states,
            class_map,
            frames,
            nsteps,
        }
    }

    /// Number of ordinal repeats discovered from the training data.
    pub fn nsteps(&self) -> usize {
        self.nsteps
    }
}

impl Classifier for MultiStateClassifier {
    fn states(&self) -> &[String] {
        &self.states
    }

    fn classify(&self, frame: FrameId, segment: SegmentId) -> Label {
        if !self.frames.contains(&frame) {
            return Label::Unlabeled;
        }
        match self.class_map.get(&(frame, segment)) {
            Some(&state) => Label::State(state),
            None => Label::Unlabeled,
        }
    }
}

/// Sort key for ordinal state names: (slot, family) with junk before
/// whisker, so enumeration runs junk0, whisker0, junk1, whisker1, ...
fn state_sort_key(name: &str) -> (usize, u8) {
    if let Some(t) = name.strip_prefix("whisker").and_then(|s| s.parse().ok()) {
        (t, 1)
    } else if let Some(t) = name.strip_prefix("junk").and_then(|s| s.parse().ok()) {
        (t, 0)
    } else {
        (usize::MAX, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wt_common::{TracePoint, TrajectoryId};

    fn seg(fid: u32, wid: u32, y: f64) -> Segment {
        Segment::new(
            FrameId(fid),
            SegmentId(wid),
            vec![TracePoint::new(0.0, y), TracePoint::new(10.0, y)],
            vec![1.0, 1.0],
        )
    }

    fn insert(training: &mut TrainingSet, s: Segment) {
        training.entry(s.frame).or_default().insert(s.id, s);
    }

    /// traj0 covers seg_a in frames 0 and 1; frame 0 also has an
    /// unlabeled seg_b.
    fn scenario() -> (TrainingSet, LabelSet) {
        let mut training = TrainingSet::new();
        insert(&mut training, seg(0, 0, 10.0)); // seg_a
        insert(&mut training, seg(0, 1, 30.0)); // seg_b
        insert(&mut training, seg(1, 0, 10.0)); // seg_a
        let mut labels = LabelSet::new();
        let mut traj0 = BTreeMap::new();
        traj0.insert(FrameId(0), SegmentId(0));
        traj0.insert(FrameId(1), SegmentId(0));
        labels.insert(TrajectoryId(0), traj0);
        (training, labels)
    }

    #[test]
    fn test_two_state_scenario() {
        let (_, labels) = scenario();
        let c = TwoStateClassifier::from_labels(&labels);
        assert_eq!(c.states(), &["junk".to_string(), "whiskers".to_string()]);
        assert_eq!(c.classify(FrameId(0), SegmentId(0)), Label::State(1));
        assert_eq!(c.classify(FrameId(0), SegmentId(1)), Label::State(0));
        assert_eq!(c.classify(FrameId(1), SegmentId(0)), Label::State(1));
    }

    #[test]
    fn test_two_state_unlabeled_frame() {
        let (_, labels) = scenario();
        let c = TwoStateClassifier::from_labels(&labels);
        assert_eq!(c.classify(FrameId(99), SegmentId(0)), Label::Unlabeled);
    }

    #[test]
    fn test_two_state_label_range() {
        let (training, labels) = scenario();
        let c = TwoStateClassifier::from_labels(&labels);
        for (fid, segments) in &training {
            for wid in segments.keys() {
                match c.classify(*fid, *wid) {
                    Label::Unlabeled => {}
                    Label::State(s) => assert!(s <= 1),
                }
            }
        }
    }

    #[test]
    fn test_multi_state_scenario() {
        let (training, labels) = scenario();
        let c = MultiStateClassifier::from_training(&training, &labels);
        assert!(c.nsteps() >= 1);

        // seg_a sorts first (y=10), so it takes whisker0; seg_b follows
        // with the incremented counter, junk1.
        let whisker0 = c.states().iter().position(|s| s == "whisker0").unwrap();
        let junk1 = c.states().iter().position(|s| s == "junk1").unwrap();
        assert_eq!(c.classify(FrameId(0), SegmentId(0)), Label::State(whisker0));
        assert_eq!(c.classify(FrameId(0), SegmentId(1)), Label::State(junk1));
        assert_eq!(c.classify(FrameId(1), SegmentId(0)), Label::State(whisker0));
        assert_eq!(c.classify(FrameId(7), SegmentId(0)), Label::Unlabeled);
    }

    #[test]
    fn test_multi_state_ignores_unlabeled_frames() {
        // Frame 9 has no ground truth; its lone segment would otherwise
        // mint a junk0 state that no labeled frame exhibits.
        let (mut training, labels) = scenario();
        insert(&mut training, seg(9, 0, 10.0));
        let c = MultiStateClassifier::from_training(&training, &labels);
        assert!(!c.states().iter().any(|s| s == "junk0"));
        assert_eq!(c.classify(FrameId(9), SegmentId(0)), Label::Unlabeled);
    }

    #[test]
    fn test_multi_state_counter_semantics() {
        // Two whiskers with junk before, between, and after.
        let mut training = TrainingSet::new();
        insert(&mut training, seg(0, 0, 5.0)); // junk0
        insert(&mut training, seg(0, 1, 10.0)); // whisker0
        insert(&mut training, seg(0, 2, 30.0)); // junk1
        insert(&mut training, seg(0, 3, 50.0)); // whisker1
        insert(&mut training, seg(0, 4, 70.0)); // junk2
        let mut labels = LabelSet::new();
        let mut traj0 = BTreeMap::new();
        traj0.insert(FrameId(0), SegmentId(1));
        labels.insert(TrajectoryId(0), traj0);
        let mut traj1 = BTreeMap::new();
        traj1.insert(FrameId(0), SegmentId(3));
        labels.insert(TrajectoryId(1), traj1);

        let c = MultiStateClassifier::from_training(&training, &labels);
        assert_eq!(c.nsteps(), 2);
        assert_eq!(
            c.states(),
            &[
                "junk0".to_string(),
                "whisker0".to_string(),
                "junk1".to_string(),
                "whisker1".to_string(),
                "junk2".to_string(),
            ]
        );

        let expect = [
            (0, "junk0"),
            (1, "whisker0"),
            (2, "junk1"),
            (3, "whisker1"),
            (4, "junk2"),
        ];
        for (wid, name) in expect {
            let ix = c.states().iter().position(|s| s == name).unwrap();
            assert_eq!(c.classify(FrameId(0), SegmentId(wid)), Label::State(ix));
        }
    }

    #[test]
    fn test_multi_state_name_count_for_full_frames() {
        // Every frame: whisker, junk, whisker -> names whisker0, junk1,
        // whisker1; with a leading junk in one frame, junk0 appears too.
        let mut training = TrainingSet::new();
        for fid in 0..3u32 {
            insert(&mut training, seg(fid, 0, 10.0));
            insert(&mut training, seg(fid, 1, 30.0));
            insert(&mut training, seg(fid, 2, 50.0));
        }
        insert(&mut training, seg(2, 3, 1.0)); // junk ahead of whisker0
        let mut labels = LabelSet::new();
        for (tid, wid) in [(0u32, 0u32), (1, 2)] {
            let mut t = BTreeMap::new();
            for fid in 0..3u32 {
                t.insert(FrameId(fid), SegmentId(wid));
            }
            labels.insert(TrajectoryId(tid), t);
        }

        let c = MultiStateClassifier::from_training(&training, &labels);
        assert_eq!(c.nsteps(), 2);
        // One junk and one whisker name per ordinal step.
        assert_eq!(c.states().len(), 2 * c.nsteps());
    }

    #[test]
    fn test_ordinal_order_ties_break_by_id() {
        let mut segments = BTreeMap::new();
        let a = seg(0, 2, 10.0);
        let b = seg(0, 1, 10.0);
        segments.insert(a.id, a);
        segments.insert(b.id, b);
        let ordered = ordinal_order(&segments);
        assert_eq!(ordered[0].id, SegmentId(1));
        assert_eq!(ordered[1].id, SegmentId(2));
    }

    #[test]
    fn test_enumeration_is_reproducible() {
        let (training, labels) = scenario();
        let a = MultiStateClassifier::from_training(&training, &labels);
        let b = MultiStateClassifier::from_training(&training, &labels);
        assert_eq!(a.states(), b.states());
        assert_eq!(
            a.classify(FrameId(0), SegmentId(1)),
            b.classify(FrameId(0), SegmentId(1))
        );
    }
}
