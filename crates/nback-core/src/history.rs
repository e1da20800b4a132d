//! Per-modality stimulus history with n-back lookback.
//!
//! Each modality keeps an append-only sequence of presented values; trials
//! where the modality was absent append `None` so index `i` lines up across
//! all three lanes. A lookback window is only valid within one difficulty
//! level, so the store is reset whenever N changes.

use serde::{Deserialize, Serialize};

use crate::domain::{CellIndex, ClipId, ColorId};

/// One modality's append-only sequence. `None` entries mark trials where the
/// modality was not presented.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryLane<T> {
    entries: Vec<Option<T>>,
}

impl<T: Copy + PartialEq> HistoryLane<T> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, value: Option<T>) {
        self.entries.push(value);
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    /// Value presented `n` trials back: outer `None` when the lane holds
    /// fewer than `n` entries, `Some(None)` when the trial recorded an
    /// absent stimulus.
    pub fn look_back(&self, n: usize) -> Option<Option<T>> {
        if n == 0 || self.entries.len() < n {
            return None;
        }
        Some(self.entries[self.entries.len() - n])
    }

    /// True iff the lane has at least `n` entries and the value `n` trials
    /// back equals `value`. Absent entries never match.
    pub fn matches(&self, n: usize, value: T) -> bool {
        self.look_back(n) == Some(Some(value))
    }
}

/// The three modality lanes, appended in lockstep one entry per trial.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StimulusHistory {
    cells: HistoryLane<CellIndex>,
    colors: HistoryLane<ColorId>,
    clips: HistoryLane<ClipId>,
}

impl StimulusHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one trial's values to all three lanes at once, preserving the
    /// index alignment invariant.
    pub fn record_trial(
        &mut self,
        cell: Option<CellIndex>,
        color: Option<ColorId>,
        clip: Option<ClipId>,
    ) {
        self.cells.push(cell);
        self.colors.push(color);
        self.clips.push(clip);
    }

    /// Trials recorded since the last reset.
    pub fn len(&self) -> usize {
        debug_assert_eq!(self.cells.len(), self.colors.len());
        debug_assert_eq!(self.cells.len(), self.clips.len());
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all three lanes. Invoked exactly when N changes; a lookback
    /// spanning a difficulty change is not semantically valid.
    pub fn reset_all(&mut self) {
        self.cells.clear();
        self.colors.clear();
        self.clips.clear();
    }

    pub fn cells(&self) -> &HistoryLane<CellIndex> {
        &self.cells
    }

    pub fn colors(&self) -> &HistoryLane<ColorId> {
        &self.colors
    }

    pub fn clips(&self) -> &HistoryLane<ClipId> {
        &self.clips
    }
}
