//! High-level trial engine: owns the session state and drives one trial at a
//! time through sequencing, presentation, the response window and scoring.
//!
//! The engine is synchronous and timestamp-driven; every transition takes the
//! caller's `now_us`. The driver (see [`crate::runner`]) supplies real time
//! and sleeps out the response window and inter-trial delays.

use serde::Serialize;
use thiserror::Error;

use crate::config::{ConfigError, NBackConfig};
use crate::domain::{Mode, Modality, ProgressionPolicy, SessionId, Trial};
use crate::history::StimulusHistory;
use crate::interfaces::{DisplaySink, Presentation, TrialExporter};
use crate::progression::{BlockDecision, BlockTransition, Progression, Terminal};
use crate::recorder::TrialLog;
use crate::response::{KeyClass, ResponseWindow};
use crate::scoring::{BlockStats, Scorer};
use crate::sequencer::{evaluate_expectations, Sequencer, TrialStimuli};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("session has terminated: {}", .0.message())]
    Terminated(Terminal),
    #[error("response window is still open")]
    WindowOpen,
}

/// Read-only view of the session state for display and diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub mode: Mode,
    pub n: u32,
    pub score: i64,
    pub trials_run: u64,
    pub consecutive_failures: u32,
    pub policy: ProgressionPolicy,
    pub terminal: Option<Terminal>,
}

pub struct Engine {
    config: NBackConfig,
    progression: Progression,
    history: StimulusHistory,
    stats: BlockStats,
    scorer: Scorer,
    window: ResponseWindow,
    sequencer: Sequencer,
    log: TrialLog,
    presentation: Box<dyn Presentation>,
    display: Box<dyn DisplaySink>,
    trial_count: u64,
    /// Stimuli of the trial whose window is open; appended to history and
    /// cleared from the presentation when the window closes.
    current_stimuli: Option<TrialStimuli>,
}

impl Engine {
    /// Build an engine with entropy-seeded stimulus draws. Fails on an
    /// invalid configuration (empty palette, zero cell count, ...) so a
    /// session never starts from an invalid draw space.
    pub fn new(
        config: NBackConfig,
        presentation: Box<dyn Presentation>,
        display: Box<dyn DisplaySink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let sequencer = Sequencer::new(&config.stimuli);
        Ok(Self::build(config, presentation, display, sequencer))
    }

    /// Deterministic engine for tests and replays.
    pub fn seeded(
        config: NBackConfig,
        presentation: Box<dyn Presentation>,
        display: Box<dyn DisplaySink>,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let sequencer = Sequencer::seeded(&config.stimuli, seed);
        Ok(Self::build(config, presentation, display, sequencer))
    }

    fn build(
        config: NBackConfig,
        presentation: Box<dyn Presentation>,
        display: Box<dyn DisplaySink>,
        sequencer: Sequencer,
    ) -> Self {
        let progression = Progression::new(&config.session);
        let scorer = Scorer::new(config.scoring.clone());
        Self {
            config,
            progression,
            history: StimulusHistory::new(),
            stats: BlockStats::default(),
            scorer,
            window: ResponseWindow::new(),
            sequencer,
            log: TrialLog::new(SessionId::new()),
            presentation,
            display,
            trial_count: 0,
            current_stimuli: None,
        }
    }

    pub fn config(&self) -> &NBackConfig {
        &self.config
    }

    pub fn session_id(&self) -> &SessionId {
        self.log.session()
    }

    pub fn score(&self) -> i64 {
        self.scorer.total()
    }

    pub fn trials(&self) -> &[Trial] {
        self.log.trials()
    }

    pub fn block_stats(&self) -> &BlockStats {
        &self.stats
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn terminal(&self) -> Option<Terminal> {
        self.progression.terminal()
    }

    pub fn is_terminal(&self) -> bool {
        self.progression.is_terminal()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.progression.mode(),
            n: self.progression.n(),
            score: self.scorer.total(),
            trials_run: self.trial_count,
            consecutive_failures: self.progression.consecutive_failures(),
            policy: self.progression.policy(),
            terminal: self.progression.terminal(),
        }
    }

    /// Reset all session state and announce the first phase. Any open window
    /// is discarded; the caller must have torn down the previous trial loop
    /// first so at most one loop drives this engine.
    pub fn begin_session(&mut self, now_us: i64) {
        self.progression = Progression::new(&self.config.session);
        self.history.reset_all();
        self.stats.reset();
        self.scorer.reset();
        self.window = ResponseWindow::new();
        self.current_stimuli = None;
        self.trial_count = 0;
        self.log = TrialLog::new(SessionId::new());
        log::info!(
            "session {} started at {}us: policy={:?} n={}",
            self.log.session(),
            now_us,
            self.progression.policy(),
            self.progression.n()
        );
        self.display.show_score(0);
        self.announce_phase();
    }

    /// Start the next trial: draw stimuli for the current mode, record
    /// expectations, present, and open the response window.
    pub fn start_trial(&mut self, now_us: i64) -> Result<(), EngineError> {
        if let Some(t) = self.progression.terminal() {
            return Err(EngineError::Terminated(t));
        }
        if self.window.is_awaiting() {
            return Err(EngineError::WindowOpen);
        }

        self.trial_count += 1;
        let mode = self.progression.mode();
        let n = self.progression.n();
        let stimuli = self.sequencer.draw(mode);

        let mut trial = Trial::new(self.trial_count, now_us, mode, n);
        evaluate_expectations(&stimuli, n, &self.history, &mut trial, &mut self.stats);
        log::debug!(
            "trial {} mode={} n={} expects L={} C={} A={}",
            trial.seq,
            mode.name(),
            n,
            trial.expected(Modality::Location),
            trial.expected(Modality::Color),
            trial.expected(Modality::Audio),
        );

        if let Some((cell, color)) = stimuli.highlight {
            self.presentation.highlight(cell, color);
        }
        if let Some(clip) = stimuli.clip {
            self.presentation.play_sound(clip);
        }

        self.log.push(trial);
        self.current_stimuli = Some(stimuli);
        self.window.open(now_us);
        Ok(())
    }

    /// Forward one key event into the open response window. Events while the
    /// window is Idle are ignored.
    pub fn handle_key(&mut self, modality: Modality, now_us: i64) -> KeyClass {
        let class = match self.log.current_mut() {
            Some(trial) => {
                self.window
                    .handle_key(trial, modality, now_us, &mut self.scorer, &mut self.stats)
            }
            None => KeyClass::Ignored,
        };
        match class {
            KeyClass::Correct => {
                log::debug!("correct {} match", modality.name());
                self.display.show_score(self.scorer.total());
            }
            KeyClass::FalseAlarm => {
                log::debug!("false alarm for {}", modality.name());
                self.display.show_score(self.scorer.total());
            }
            KeyClass::Ignored => {}
        }
        class
    }

    /// Close the response window: register a miss if one is due, clear the
    /// presentation, and append this trial's values to the histories.
    pub fn close_window(&mut self) {
        if !self.window.is_awaiting() {
            return;
        }
        let (missed, seq) = match self.log.current_mut() {
            Some(trial) => (self.window.close(trial, &mut self.scorer), trial.seq),
            None => return,
        };
        if missed {
            log::debug!("missed match on trial {}", seq);
            self.display.show_score(self.scorer.total());
        }
        if let Some(stimuli) = self.current_stimuli.take() {
            if let Some((cell, _)) = stimuli.highlight {
                self.presentation.reset_cell(cell);
            }
            self.history
                .record_trial(stimuli.record_cell, stimuli.record_color, stimuli.clip);
        }
    }

    /// True once the trial counter sits on a block boundary; the driver then
    /// calls [`Engine::finish_block`].
    pub fn at_block_boundary(&self) -> bool {
        self.trial_count > 0
            && self.trial_count % self.config.session.trials_per_block as u64 == 0
    }

    /// Evaluate the finished block and apply the progression decision.
    /// Histories reset whenever N changes; block counters reset regardless of
    /// the branch taken. When the decision advanced and a phase pause is
    /// configured, the transition message is shown and the caller is expected
    /// to pause `delay_between_phases_ms` before announcing the next phase.
    pub fn finish_block(&mut self) -> BlockDecision {
        let block_mode = self.progression.mode();
        let decision = self.progression.evaluate_block(&self.stats);
        log::info!(
            "block ended for {}: correct={} falseAlarms={} expected={} accuracy={:.2} advanced={}",
            block_mode.name(),
            self.stats.correct_responses,
            self.stats.false_alarms,
            self.stats.expected_matches,
            decision.accuracy,
            decision.advanced,
        );

        if decision.advanced && self.config.timing.delay_between_phases_ms > 0 {
            self.display.show_message("Get Ready for the Next Phase...");
        }

        match decision.transition {
            BlockTransition::NextPhase(mode) => {
                log::info!("new phase: {} at N={}", mode.name(), self.progression.n());
            }
            BlockTransition::EscalateN(n) => {
                // a lookback across the difficulty change would be invalid
                self.history.reset_all();
                log::info!("level up: N={}, mode=Combined", n);
            }
            BlockTransition::Terminate(t) => {
                self.display.show_message(t.message());
                log::info!("session {} terminal: {}", self.log.session(), t.message());
            }
            BlockTransition::Retry => {
                log::info!(
                    "accuracy below threshold; failure count {}",
                    self.progression.consecutive_failures()
                );
            }
        }

        self.stats.reset();
        decision
    }

    /// Refresh the phase instruction line after a block transition.
    pub fn announce_phase(&mut self) {
        if self.progression.is_terminal() {
            return;
        }
        let text = self
            .progression
            .mode()
            .instruction(self.progression.n());
        self.display.show_message(&text);
    }

    /// Hand the finalized trial records to the export collaborator. Export
    /// failure is a warning, never a session error; the in-memory records
    /// stay intact and there is no retry.
    pub fn export_to(&mut self, exporter: &mut dyn TrialExporter) {
        match exporter.export(self.log.session(), self.log.trials()) {
            Ok(()) => {
                log::info!("exported {} trial records", self.log.len());
            }
            Err(e) => {
                log::warn!("trial export failed: {}", e);
                self.display
                    .show_message(&format!("Warning: could not save trial data ({})", e));
            }
        }
    }

    /// Render the session's records as delimited text.
    pub fn csv(&self) -> String {
        self.log.csv()
    }
}
