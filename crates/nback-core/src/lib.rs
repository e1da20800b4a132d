//! Adaptive multi-modality n-back working-memory trial engine.
//!
//! The engine presents timed stimuli across up to three modalities (spatial
//! location, visual color, auditory tone), scores multi-key responses
//! against n-back expectations, and adapts difficulty from block-level
//! accuracy. Rendering, audio, score display and durable persistence are
//! collaborators behind the narrow traits in [`interfaces`]; the core holds
//! no ambient state beyond one session.

pub mod config;
pub mod domain;
pub mod engine;
pub mod history;
pub mod interfaces;
pub mod progression;
pub mod recorder;
pub mod response;
pub mod runner;
pub mod scoring;
pub mod sequencer;

#[cfg(test)]
mod tests_proptest;

// Configuration
pub use config::{ConfigError, NBackConfig, ScoringConfig, SessionConfig, StimulusConfig, TimingConfig};

// Domain types
pub use domain::{
    CellIndex, ClipId, ColorId, Highlight, Modality, Mode, Outcome, ProgressionPolicy, SessionId,
    Trial,
};

// Engine (high-level orchestrator)
pub use engine::{Engine, EngineError, SessionSnapshot};

// History store
pub use history::StimulusHistory;

// Collaborator seams
pub use interfaces::{
    DisplaySink, ExportError, NullDisplay, NullPresentation, Presentation, TrialExporter,
};

// Progression state machine
pub use progression::{BlockDecision, BlockTransition, Progression, Terminal, PHASE_SEQUENCE};

// Trial recorder
pub use recorder::{to_csv, TrialLog};

// Response window
pub use response::{KeyClass, ResponseWindow, WindowState};

// Async session driver
pub use runner::{drive_session, now_us, SessionRunner};

// Scoring
pub use scoring::{BlockStats, Scorer};

// Stimulus sequencing
pub use sequencer::{evaluate_expectations, Sequencer, TrialStimuli};
