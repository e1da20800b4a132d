//! Timed response window: key acceptance, classification, miss detection.
//!
//! The window is a two-state machine (Idle / AwaitingInput) driven by the
//! caller's timestamps. It never extends or shortens itself on input; the
//! driver closes it after the configured stimulus duration.

use serde::{Deserialize, Serialize};

use crate::domain::{Modality, Outcome, Trial};
use crate::scoring::{BlockStats, Scorer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum WindowState {
    #[default]
    Idle,
    AwaitingInput,
}

/// Classification of one key event against the current trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    /// Window closed, or the key was already used this trial.
    Ignored,
    Correct,
    FalseAlarm,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseWindow {
    state: WindowState,
    opened_us: i64,
}

impl ResponseWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    pub fn is_awaiting(&self) -> bool {
        self.state == WindowState::AwaitingInput
    }

    /// Enter AwaitingInput. The caller is responsible for closing the window
    /// after the stimulus duration has elapsed.
    pub fn open(&mut self, now_us: i64) {
        self.state = WindowState::AwaitingInput;
        self.opened_us = now_us;
    }

    /// Handle one key event. Accepts at most one event per modality per
    /// trial; the first accepted key stamps the trial's reaction time.
    pub fn handle_key(
        &mut self,
        trial: &mut Trial,
        modality: Modality,
        now_us: i64,
        scorer: &mut Scorer,
        stats: &mut BlockStats,
    ) -> KeyClass {
        if !self.is_awaiting() {
            return KeyClass::Ignored;
        }
        if trial.has_response(modality) {
            // idempotent per key per trial
            return KeyClass::Ignored;
        }

        if trial.responses.is_empty() {
            trial.reaction_time_ms =
                Some(crate::domain::dt_us(now_us, self.opened_us) as f32 / 1_000.0);
        }
        trial.push_response(modality);

        if trial.consume_pending(modality) {
            // the most recent classification wins the outcome tag, so a
            // later false alarm can overwrite this
            trial.outcome = Outcome::Correct;
            trial.points += scorer.award_correct();
            stats.correct_responses += 1;
            KeyClass::Correct
        } else {
            trial.outcome = Outcome::FalseAlarm;
            trial.points += scorer.award_false_alarm();
            stats.false_alarms += 1;
            KeyClass::FalseAlarm
        }
    }

    /// Close the window. If no key was accepted this trial and at least one
    /// expectation is still pending, registers exactly one miss: the points
    /// overwrite the trial total and the outcome tag is chosen by modality
    /// priority. Returns whether a miss was registered.
    pub fn close(&mut self, trial: &mut Trial, scorer: &mut Scorer) -> bool {
        self.state = WindowState::Idle;

        if !trial.responses.is_empty() {
            return false;
        }
        match trial.first_pending() {
            Some(modality) => {
                trial.points = scorer.award_miss();
                trial.outcome = Outcome::miss_for(modality);
                true
            }
            None => false,
        }
    }
}
