//! Frame, segment, and trajectory identity types.
//!
//! A tracked segment is uniquely identified by the (frame, segment) pair.
//! Trajectory IDs name a labeled sequence of such pairs across frames.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Video frame index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FrameId(pub u32);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for FrameId {
    fn from(fid: u32) -> Self {
        FrameId(fid)
    }
}

/// Segment index within one frame.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SegmentId(pub u32);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SegmentId {
    fn from(wid: u32) -> Self {
        SegmentId(wid)
    }
}

/// Identifier for a labeled trajectory (one physical whisker across frames).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TrajectoryId(pub u32);

impl fmt::Display for TrajectoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TrajectoryId {
    fn from(tid: u32) -> Self {
        TrajectoryId(tid)
    }
}
