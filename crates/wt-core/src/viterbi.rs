//! Viterbi sequence decoding.
//!
//! The transition statistics are estimated within frames, so decoding runs
//! per frame: the segments of one frame, in ordinal order, form the
//! observation sequence, and the lattice is (segment position x model
//! state). Frames with fewer segments than ordinal slots are handled by
//! lattice pruning: states the start and transition mass cannot reach in
//! the available number of observations never enter the path, and no
//! null-emission slots are synthesized.
//!
//! The recurrence is the standard one, entirely in log2 space:
//! `V[t][s] = max_p(V[t-1][p] + T[p][s]) + E_s(obs_t)`, with back-pointers
//! for path reconstruction, and the end mass of each state's flat family
//! added at the final column before the argmax.

use crate::classify::ordinal_order;
use crate::model::{FlatState, LeftRightModel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use wt_common::{Error, FrameId, Result, Segment, SegmentId, TrainingSet};
use wt_math::argmax;

/// One decoded segment label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedLabel {
    pub frame: FrameId,
    pub segment: SegmentId,
    pub state: String,
}

impl LeftRightModel {
    /// Decode every frame's segment set into the maximum-likelihood label
    /// path.
    ///
    /// Returns one label per segment across all frames, in frame order and
    /// ordinal order within a frame. An empty frame yields no labels.
    pub fn decode(&self, frames: &TrainingSet) -> Result<Vec<DecodedLabel>> {
        let transitions = self.transition_matrix();
        let mut out = Vec::new();
        for (fid, segments) in frames {
            self.decode_frame(*fid, segments, &transitions, &mut out)?;
        }
        Ok(out)
    }

    fn decode_frame(
        &self,
        frame: FrameId,
        segments: &BTreeMap<SegmentId, Segment>,
        transitions: &[Vec<f64>],
        out: &mut Vec<DecodedLabel>,
    ) -> Result<()> {
        let ordered = ordinal_order(segments);
        if ordered.is_empty() {
            return Ok(());
        }
        let states = self.states();
        let n = states.len();
        let m = ordered.len();

        // Emission column per observation.
        let mut emit = vec![vec![0.0f64; n]; m];
        for (t, seg) in ordered.iter().enumerate() {
            for (s, e) in emit[t].iter_mut().enumerate() {
                *e = self.evaluate(seg, s)?;
            }
        }

        let mut score = vec![vec![f64::NEG_INFINITY; n]; m];
        let mut back = vec![vec![0usize; n]; m];

        for s in 0..n {
            let start = self
                .start_log_probs()
                .get(&states[s])
                .copied()
                .unwrap_or(f64::NEG_INFINITY);
            score[0][s] = start + emit[0][s];
        }

        for t in 1..m {
            for s in 0..n {
                let mut best = f64::NEG_INFINITY;
                let mut best_prev = 0;
                for p in 0..n {
                    let candidate = score[t - 1][p] + transitions[p][s];
                    if candidate > best {
                        best = candidate;
                        best_prev = p;
                    }
                }
                if best > f64::NEG_INFINITY {
                    score[t][s] = best + emit[t][s];
                    back[t][s] = best_prev;
                }
            }
        }

        // Terminal column carries the end mass of each state's family.
        let end = self.end_log_probs();
        let final_scores: Vec<f64> = (0..n)
            .map(|s| score[m - 1][s] + end[FlatState::of_name(&states[s]).index()])
            .collect();
        // The state space is non-empty for any trained model.
        let last = argmax(&final_scores).unwrap_or(0);
        if final_scores.is_empty() || final_scores[last] == f64::NEG_INFINITY {
            return Err(Error::InfeasibleSequence {
                frame: frame.to_string(),
            });
        }

        let mut path = vec![0usize; m];
        path[m - 1] = last;
        for t in (1..m).rev() {
            path[t - 1] = back[t][path[t]];
        }
        debug!(%frame, n_segments = m, log2_p = final_scores[last], "decoded frame");

        for (t, seg) in ordered.iter().enumerate() {
            out.push(DecodedLabel {
                frame,
                segment: seg.id,
                state: states[path[t]].clone(),
            });
        }
        Ok(())
    }
}
