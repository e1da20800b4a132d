//! Block-level counters and the point scorer.

use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;

/// Counters accumulated over one block of trials, reset at every block
/// boundary.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BlockStats {
    pub correct_responses: u32,
    pub expected_matches: u32,
    pub false_alarms: u32,
}

impl BlockStats {
    pub fn reset(&mut self) {
        *self = BlockStats::default();
    }

    /// Block accuracy: (correct − false alarms) / expected matches, clamped
    /// at zero. A block with no expected matches counts as fully accurate.
    pub fn accuracy(&self) -> f32 {
        if self.expected_matches == 0 {
            return 1.0;
        }
        let raw = (self.correct_responses as f32 - self.false_alarms as f32)
            / self.expected_matches as f32;
        raw.max(0.0)
    }
}

/// Maps response outcomes to point deltas and keeps the running session
/// score. Correct and false-alarm awards accumulate on a trial; a miss
/// overwrites the trial total (the session score still receives the miss
/// delta additively).
#[derive(Debug, Clone)]
pub struct Scorer {
    points: ScoringConfig,
    total: i64,
}

impl Scorer {
    pub fn new(points: ScoringConfig) -> Self {
        Self { points, total: 0 }
    }

    pub fn reset(&mut self) {
        self.total = 0;
    }

    pub fn total(&self) -> i64 {
        self.total
    }

    /// Award a correct response; returns the per-trial delta.
    pub fn award_correct(&mut self) -> i32 {
        self.total += self.points.points_correct as i64;
        self.points.points_correct
    }

    /// Award a false alarm; returns the (negative) per-trial delta.
    pub fn award_false_alarm(&mut self) -> i32 {
        self.total += self.points.points_false_alarm as i64;
        self.points.points_false_alarm
    }

    /// Award a miss; returns the value that overwrites the trial total.
    pub fn award_miss(&mut self) -> i32 {
        self.total += self.points.points_miss as i64;
        self.points.points_miss
    }
}
