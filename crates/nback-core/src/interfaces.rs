//! Collaborator seams: presentation, display and export.
//!
//! The engine drives these narrow interfaces and never depends on their
//! implementations; rendering, audio playback and durable persistence all
//! live behind them, outside the core.

use thiserror::Error;

use crate::domain::{CellIndex, ClipId, Highlight, SessionId, Trial};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("export failed: {0}")]
    Other(String),
}

/// Renders stimuli. All calls are fire-and-forget; the engine consumes no
/// return values.
pub trait Presentation: Send {
    fn highlight(&mut self, cell: CellIndex, color: Highlight);
    fn reset_cell(&mut self, cell: CellIndex);
    fn play_sound(&mut self, clip: ClipId);
}

/// Receives score updates and instructional text. Purely observational.
pub trait DisplaySink: Send {
    fn show_score(&mut self, score: i64);
    fn show_message(&mut self, text: &str);
}

/// Receives the finalized, ordered trial records. Durable persistence is the
/// implementor's concern; a failure here is surfaced as a warning and never
/// affects the session.
pub trait TrialExporter: Send {
    fn export(&mut self, session: &SessionId, trials: &[Trial]) -> Result<(), ExportError>;
}

/// Presentation that renders nowhere. Useful for headless sessions and tests.
#[derive(Debug, Default)]
pub struct NullPresentation;

impl Presentation for NullPresentation {
    fn highlight(&mut self, _cell: CellIndex, _color: Highlight) {}
    fn reset_cell(&mut self, _cell: CellIndex) {}
    fn play_sound(&mut self, _clip: ClipId) {}
}

/// Display that discards everything.
#[derive(Debug, Default)]
pub struct NullDisplay;

impl DisplaySink for NullDisplay {
    fn show_score(&mut self, _score: i64) {}
    fn show_message(&mut self, _text: &str) {}
}
