//! Session trial log and delimited export rendering.

use crate::domain::{Modality, SessionId, Trial};

const CSV_HEADER: &str = "TrialNumber,Timestamp,Mode,N_Level,PointsAwarded,\
LocationMatchExpected,ColorMatchExpected,AuditoryMatchExpected,\
UserResponseKey,Outcome,ReactionTime_ms";

/// Accumulates one record per trial for the session lifetime.
#[derive(Debug, Clone)]
pub struct TrialLog {
    session: SessionId,
    trials: Vec<Trial>,
}

impl TrialLog {
    pub fn new(session: SessionId) -> Self {
        Self {
            session,
            trials: Vec::new(),
        }
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn push(&mut self, trial: Trial) {
        self.trials.push(trial);
    }

    /// The trial currently being mutated by the open response window.
    pub fn current_mut(&mut self) -> Option<&mut Trial> {
        self.trials.last_mut()
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn csv(&self) -> String {
        to_csv(&self.trials)
    }
}

fn csv_bool(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

/// Render trials as delimited text, one row per trial.
pub fn to_csv(trials: &[Trial]) -> String {
    let mut out = String::with_capacity(64 * (trials.len() + 1));
    out.push_str(CSV_HEADER);
    out.push('\n');
    for t in trials {
        let row = format!(
            "{},{:.3},{},{},{},{},{},{},{},{},{:.0}\n",
            t.seq,
            t.timestamp_us as f64 / 1_000_000.0,
            t.mode.name(),
            t.n,
            t.points,
            csv_bool(t.expected(Modality::Location)),
            csv_bool(t.expected(Modality::Color)),
            csv_bool(t.expected(Modality::Audio)),
            t.response_key_string(),
            t.outcome.label(),
            t.reaction_time_ms.unwrap_or(0.0),
        );
        out.push_str(&row);
    }
    out
}
