//! Whisker Triage common types, IDs, and errors.
//!
//! This crate provides foundational types shared across wt-core modules:
//! - Frame, segment, and trajectory identity types
//! - The tracked-segment and trajectory-label table shapes
//! - Common error types

pub mod error;
pub mod id;
pub mod segment;

pub use error::{Error, ErrorCategory, Result};
pub use id::{FrameId, SegmentId, TrajectoryId};
pub use segment::{LabelSet, Segment, TracePoint, TrainingSet};
