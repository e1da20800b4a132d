//! Terminal implementations of the engine's collaborator seams.

use std::io::Write as _;
use std::path::PathBuf;

use nback_core::{
    to_csv, CellIndex, ClipId, DisplaySink, ExportError, Highlight, Presentation, SessionId,
    StimulusConfig, Trial, TrialExporter,
};

/// Prints stimuli as text lines. Raw mode may be active, so every line ends
/// with an explicit carriage return.
pub struct TerminalPresentation {
    colors: Vec<String>,
    clips: Vec<String>,
    marker: String,
}

impl TerminalPresentation {
    pub fn new(stimuli: &StimulusConfig) -> Self {
        Self {
            colors: stimuli.colors.clone(),
            clips: stimuli.audio_clips.clone(),
            marker: stimuli.spatial_highlight.clone(),
        }
    }

    fn color_name(&self, color: Highlight) -> &str {
        match color {
            Highlight::Palette(id) => self
                .colors
                .get(id.0 as usize)
                .map(String::as_str)
                .unwrap_or("?"),
            Highlight::Marker => &self.marker,
        }
    }
}

impl Presentation for TerminalPresentation {
    fn highlight(&mut self, cell: CellIndex, color: Highlight) {
        print!("  [cell {:>2}] {}\r\n", cell.0, self.color_name(color));
        let _ = std::io::stdout().flush();
    }

    fn reset_cell(&mut self, cell: CellIndex) {
        log::debug!("cell {} cleared", cell.0);
    }

    fn play_sound(&mut self, clip: ClipId) {
        let name = self.clips.get(clip.0 as usize).map(String::as_str).unwrap_or("?");
        print!("  [tone]    {}\r\n", name);
        let _ = std::io::stdout().flush();
    }
}

/// Prints score updates and instructional text.
#[derive(Default)]
pub struct TerminalDisplay;

impl DisplaySink for TerminalDisplay {
    fn show_score(&mut self, score: i64) {
        print!("Score: {}\r\n", score);
        let _ = std::io::stdout().flush();
    }

    fn show_message(&mut self, text: &str) {
        print!("{}\r\n", text);
        let _ = std::io::stdout().flush();
    }
}

/// Writes the session's records to a delimited file at session end.
pub struct CsvFileExporter {
    path: PathBuf,
}

impl CsvFileExporter {
    pub fn new(path: Option<PathBuf>) -> Self {
        let path = path.unwrap_or_else(|| {
            PathBuf::from(format!(
                "PlayerData_{}.csv",
                chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
            ))
        });
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl TrialExporter for CsvFileExporter {
    fn export(&mut self, session: &SessionId, trials: &[Trial]) -> Result<(), ExportError> {
        std::fs::write(&self.path, to_csv(trials))?;
        log::info!(
            "session {}: data saved to {}",
            session,
            self.path.display()
        );
        Ok(())
    }
}
