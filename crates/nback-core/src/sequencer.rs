//! Stimulus selection and n-back match evaluation.
//!
//! The sequencer decides, per trial and per mode, which modalities are
//! presented and with what stimulus values, then evaluates each active
//! modality against the n-back history and records the expectation flags on
//! the trial.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::StimulusConfig;
use crate::domain::{CellIndex, ClipId, ColorId, Highlight, Modality, Mode, Trial};
use crate::history::StimulusHistory;
use crate::scoring::BlockStats;

/// Probability that the visual channel is presented on a Combined trial.
/// The audio channel draws independently with the same probability.
const COMBINED_CHANNEL_P: f64 = 0.7;

/// One trial's stimulus plan: what the presentation collaborator shows, and
/// what each modality records into history.
///
/// The shown highlight and the recorded values differ on purpose: a Visual
/// trial paints its color into a random cell without that cell becoming a
/// location stimulus, and a Spatial trial marks its cell with the neutral
/// marker without presenting any color identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialStimuli {
    pub highlight: Option<(CellIndex, Highlight)>,
    pub clip: Option<ClipId>,
    pub record_cell: Option<CellIndex>,
    pub record_color: Option<ColorId>,
}

impl TrialStimuli {
    fn none() -> Self {
        Self {
            highlight: None,
            clip: None,
            record_cell: None,
            record_color: None,
        }
    }
}

/// Draws stimulus values from the configured palettes.
#[derive(Debug)]
pub struct Sequencer {
    rng: StdRng,
    color_count: usize,
    clip_count: usize,
    cell_count: usize,
}

impl Sequencer {
    pub fn new(stimuli: &StimulusConfig) -> Self {
        Self::with_rng(stimuli, StdRng::from_entropy())
    }

    /// Deterministic sequencer for tests and replays.
    pub fn seeded(stimuli: &StimulusConfig, seed: u64) -> Self {
        Self::with_rng(stimuli, StdRng::seed_from_u64(seed))
    }

    fn with_rng(stimuli: &StimulusConfig, rng: StdRng) -> Self {
        Self {
            rng,
            color_count: stimuli.colors.len(),
            clip_count: stimuli.audio_clips.len(),
            cell_count: stimuli.cell_count as usize,
        }
    }

    fn draw_color(&mut self) -> ColorId {
        ColorId(self.rng.gen_range(0..self.color_count) as u8)
    }

    fn draw_clip(&mut self) -> ClipId {
        ClipId(self.rng.gen_range(0..self.clip_count) as u8)
    }

    fn draw_cell(&mut self) -> CellIndex {
        CellIndex(self.rng.gen_range(0..self.cell_count) as u16)
    }

    /// Select this trial's stimuli for the given mode.
    pub fn draw(&mut self, mode: Mode) -> TrialStimuli {
        let mut s = TrialStimuli::none();
        match mode {
            Mode::Visual => {
                let color = self.draw_color();
                // the cell is a canvas for the color, not a location stimulus
                s.highlight = Some((self.draw_cell(), Highlight::Palette(color)));
                s.record_color = Some(color);
            }
            Mode::Auditory => {
                s.clip = Some(self.draw_clip());
            }
            Mode::Spatial => {
                let cell = self.draw_cell();
                s.highlight = Some((cell, Highlight::Marker));
                s.record_cell = Some(cell);
            }
            Mode::Combined => {
                let mut visual = self.rng.gen_bool(COMBINED_CHANNEL_P);
                let mut audio = self.rng.gen_bool(COMBINED_CHANNEL_P);
                // every Combined trial presents at least one stimulus
                if !visual && !audio {
                    if self.rng.gen_bool(0.5) {
                        visual = true;
                    } else {
                        audio = true;
                    }
                }
                if visual {
                    let cell = self.draw_cell();
                    let color = self.draw_color();
                    s.highlight = Some((cell, Highlight::Palette(color)));
                    s.record_cell = Some(cell);
                    s.record_color = Some(color);
                }
                if audio {
                    s.clip = Some(self.draw_clip());
                }
            }
        }
        s
    }
}

/// Evaluate every active modality of `stimuli` against the n-back history,
/// record the expectation flags on the trial, and count each expected match
/// into the block stats (once per modality, so a Combined trial matching on
/// two channels counts twice).
pub fn evaluate_expectations(
    stimuli: &TrialStimuli,
    n: u32,
    history: &StimulusHistory,
    trial: &mut Trial,
    stats: &mut BlockStats,
) {
    let n = n as usize;
    if let Some(cell) = stimuli.record_cell {
        let matched = history.cells().matches(n, cell);
        trial.set_expected(Modality::Location, matched);
        if matched {
            stats.expected_matches += 1;
        }
    }
    if let Some(color) = stimuli.record_color {
        let matched = history.colors().matches(n, color);
        trial.set_expected(Modality::Color, matched);
        if matched {
            stats.expected_matches += 1;
        }
    }
    if let Some(clip) = stimuli.clip {
        let matched = history.clips().matches(n, clip);
        trial.set_expected(Modality::Audio, matched);
        if matched {
            stats.expected_matches += 1;
        }
    }
}
