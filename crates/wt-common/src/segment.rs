//! Tracked-segment values and the table shapes the model core consumes.
//!
//! Segments are produced by an external tracing engine; the core only reads
//! them. Both tables use `BTreeMap` so iteration order is deterministic,
//! which the classifiers and estimator rely on for reproducible training.

use crate::id::{FrameId, SegmentId, TrajectoryId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One point of a segment's traced backbone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    pub x: f64,
    pub y: f64,
}

impl TracePoint {
    pub fn new(x: f64, y: f64) -> Self {
        TracePoint { x, y }
    }
}

/// A single tracked curve in one video frame.
///
/// The trace runs from the follicle (root) outward. `scores` holds the
/// tracing engine's per-point quality values and is aligned with `trace`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub frame: FrameId,
    pub id: SegmentId,
    pub trace: Vec<TracePoint>,
    pub scores: Vec<f64>,
}

impl Segment {
    pub fn new(frame: FrameId, id: SegmentId, trace: Vec<TracePoint>, scores: Vec<f64>) -> Self {
        Segment {
            frame,
            id,
            trace,
            scores,
        }
    }

    /// First trace point, if the trace is non-empty.
    ///
    /// Used as the geometric ordering key within a frame.
    pub fn root(&self) -> Option<TracePoint> {
        self.trace.first().copied()
    }
}

/// frame -> segment-id -> segment, as produced by the tracing engine.
pub type TrainingSet = BTreeMap<FrameId, BTreeMap<SegmentId, Segment>>;

/// trajectory -> frame -> segment-id, the ground-truth membership table.
pub type LabelSet = BTreeMap<TrajectoryId, BTreeMap<FrameId, SegmentId>>;
