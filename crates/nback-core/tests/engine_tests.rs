//! End-to-end engine scenarios: block scoring, progression and export.

use std::sync::{Arc, Mutex};

use nback_core::{
    BlockTransition, Engine, EngineError, ExportError, Modality, Mode, NBackConfig, NullPresentation,
    Outcome, ProgressionPolicy, SessionId, Terminal, Trial, TrialExporter,
};

/// Display stub that records everything it is shown.
#[derive(Clone, Default)]
struct RecordingDisplay {
    scores: Arc<Mutex<Vec<i64>>>,
    messages: Arc<Mutex<Vec<String>>>,
}

impl nback_core::DisplaySink for RecordingDisplay {
    fn show_score(&mut self, score: i64) {
        self.scores.lock().unwrap().push(score);
    }
    fn show_message(&mut self, text: &str) {
        self.messages.lock().unwrap().push(text.to_string());
    }
}

impl RecordingDisplay {
    fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
    fn last_score(&self) -> Option<i64> {
        self.scores.lock().unwrap().last().copied()
    }
}

struct CapturingExporter {
    csv: Arc<Mutex<Option<String>>>,
}

impl TrialExporter for CapturingExporter {
    fn export(&mut self, _session: &SessionId, trials: &[Trial]) -> Result<(), ExportError> {
        *self.csv.lock().unwrap() = Some(nback_core::to_csv(trials));
        Ok(())
    }
}

struct FailingExporter;

impl TrialExporter for FailingExporter {
    fn export(&mut self, _session: &SessionId, _trials: &[Trial]) -> Result<(), ExportError> {
        Err(ExportError::Other("disk full".to_string()))
    }
}

/// Single-color, single-clip, single-cell stimuli make every trial past the
/// n-back depth an expected match, which pins down scoring deterministically.
fn degenerate_config(trials_per_block: u32, policy: ProgressionPolicy) -> NBackConfig {
    let mut cfg = NBackConfig::default();
    cfg.session.trials_per_block = trials_per_block;
    cfg.session.policy = policy;
    cfg.stimuli.colors = vec!["Red".to_string()];
    cfg.stimuli.audio_clips = vec!["C4".to_string()];
    cfg.stimuli.cell_count = 1;
    cfg
}

fn engine_with_display(cfg: NBackConfig) -> (Engine, RecordingDisplay) {
    let display = RecordingDisplay::default();
    let engine = Engine::seeded(
        cfg,
        Box::new(NullPresentation),
        Box::new(display.clone()),
        42,
    )
    .unwrap();
    (engine, display)
}

/// Run one trial, pressing the given keys mid-window.
fn run_trial(engine: &mut Engine, now_us: &mut i64, keys: &[Modality]) {
    engine.start_trial(*now_us).unwrap();
    let mut t = *now_us;
    for key in keys {
        t += 200_000;
        engine.handle_key(*key, t);
    }
    *now_us += 1_500_000;
    engine.close_window();
    *now_us += 1_000_000;
}

#[test]
fn perfect_block_advances_phase() {
    let (mut engine, display) = engine_with_display(degenerate_config(4, ProgressionPolicy::Adaptive));
    let mut now = 1_000_000;
    engine.begin_session(now);
    assert_eq!(
        display.messages().last().unwrap(),
        "Phase: Color Matching (N=2)"
    );

    // trials 1-2 cannot match; 3-4 are guaranteed color matches
    run_trial(&mut engine, &mut now, &[]);
    run_trial(&mut engine, &mut now, &[]);
    run_trial(&mut engine, &mut now, &[Modality::Color]);
    run_trial(&mut engine, &mut now, &[Modality::Color]);

    assert_eq!(engine.block_stats().expected_matches, 2);
    assert_eq!(engine.block_stats().correct_responses, 2);
    assert_eq!(engine.score(), 20);
    assert_eq!(display.last_score(), Some(20));

    assert!(engine.at_block_boundary());
    let decision = engine.finish_block();
    assert!(decision.advanced);
    assert_eq!(decision.accuracy, 1.0);
    assert_eq!(decision.transition, BlockTransition::NextPhase(Mode::Auditory));
    assert!(display
        .messages()
        .contains(&"Get Ready for the Next Phase...".to_string()));
    engine.announce_phase();
    assert_eq!(
        display.messages().last().unwrap(),
        "Phase: Sound Matching (N=2)"
    );
    // counters reset regardless of branch
    assert_eq!(engine.block_stats().expected_matches, 0);
}

#[test]
fn unanswered_matches_miss_and_fail_blocks() {
    let mut cfg = degenerate_config(4, ProgressionPolicy::Adaptive);
    cfg.session.max_consecutive_failures = 2;
    let (mut engine, display) = engine_with_display(cfg);
    let mut now = 1_000_000;
    engine.begin_session(now);

    // never respond: trials 3-4 are missed matches
    for _ in 0..4 {
        run_trial(&mut engine, &mut now, &[]);
    }
    let missed: Vec<&Trial> = engine
        .trials()
        .iter()
        .filter(|t| t.outcome == Outcome::MissColor)
        .collect();
    assert_eq!(missed.len(), 2);
    assert!(missed.iter().all(|t| t.points == -5));
    assert_eq!(engine.score(), -10);

    let decision = engine.finish_block();
    assert!(!decision.advanced);
    assert_eq!(decision.accuracy, 0.0);
    assert_eq!(decision.transition, BlockTransition::Retry);

    // a second failed block exhausts the budget
    for _ in 0..4 {
        run_trial(&mut engine, &mut now, &[]);
    }
    let decision = engine.finish_block();
    assert_eq!(
        decision.transition,
        BlockTransition::Terminate(Terminal::Failed)
    );
    assert!(engine.is_terminal());
    assert!(display
        .messages()
        .contains(&"Game Over: Failed to meet accuracy threshold.".to_string()));
    assert!(matches!(
        engine.start_trial(now),
        Err(EngineError::Terminated(Terminal::Failed))
    ));
}

#[test]
fn fixed_policy_completes_after_challenge_block() {
    let (mut engine, display) = engine_with_display(degenerate_config(1, ProgressionPolicy::Fixed));
    let mut now = 1_000_000;
    engine.begin_session(now);

    // four training blocks, one trial each
    for expected in [
        BlockTransition::NextPhase(Mode::Auditory),
        BlockTransition::NextPhase(Mode::Spatial),
        BlockTransition::NextPhase(Mode::Combined),
        BlockTransition::EscalateN(3),
    ] {
        run_trial(&mut engine, &mut now, &[]);
        let decision = engine.finish_block();
        assert!(decision.advanced);
        assert_eq!(decision.transition, expected);
        engine.announce_phase();
    }
    // histories were cleared by the N escalation
    assert_eq!(engine.history_len(), 0);
    assert_eq!(
        display.messages().last().unwrap(),
        "Challenge: Combined Mode (N=3)"
    );

    // exactly one Combined block at N=3, then completion
    run_trial(&mut engine, &mut now, &[]);
    let decision = engine.finish_block();
    assert_eq!(
        decision.transition,
        BlockTransition::Terminate(Terminal::Completed)
    );
    assert!(display
        .messages()
        .contains(&"Fixed Mode assessment complete.".to_string()));
    assert!(engine.start_trial(now).is_err());
}

#[test]
fn adaptive_policy_escalates_past_three() {
    let (mut engine, _display) = engine_with_display(degenerate_config(1, ProgressionPolicy::Adaptive));
    let mut now = 1_000_000;
    engine.begin_session(now);

    // answer exactly the expected modalities: every block scores 1.0, so
    // the adaptive policy keeps escalating N past 3
    for _ in 0..6 {
        engine.start_trial(now).unwrap();
        let expected: Vec<Modality> = Modality::ALL
            .into_iter()
            .filter(|m| engine.trials().last().unwrap().expected(*m))
            .collect();
        let mut t = now;
        for k in expected {
            t += 100_000;
            engine.handle_key(k, t);
        }
        now += 1_500_000;
        engine.close_window();
        now += 1_000_000;
        engine.finish_block();
        engine.announce_phase();
    }
    // four training blocks then two escalations: N=3, then 4, then 5
    assert_eq!(engine.snapshot().n, 5);
    assert_eq!(engine.snapshot().mode, Mode::Combined);
    assert!(!engine.is_terminal());
}

#[test]
fn trial_points_mix_correct_and_false_alarm() {
    let (mut engine, _display) = engine_with_display(degenerate_config(4, ProgressionPolicy::Adaptive));
    let mut now = 1_000_000;
    engine.begin_session(now);

    run_trial(&mut engine, &mut now, &[]);
    run_trial(&mut engine, &mut now, &[]);
    // trial 3: correct color match plus an audio false alarm
    run_trial(&mut engine, &mut now, &[Modality::Color, Modality::Audio]);

    let trial = engine.trials().last().unwrap();
    assert_eq!(trial.points, 5);
    assert_eq!(trial.outcome, Outcome::FalseAlarm);
    assert_eq!(trial.response_key_string(), "C;A;");
    assert!(trial.reaction_time_ms.is_some());
    assert_eq!(engine.block_stats().correct_responses, 1);
    assert_eq!(engine.block_stats().false_alarms, 1);
}

#[test]
fn keys_outside_window_are_ignored() {
    let (mut engine, _display) = engine_with_display(degenerate_config(4, ProgressionPolicy::Adaptive));
    let mut now = 1_000_000;
    engine.begin_session(now);
    run_trial(&mut engine, &mut now, &[]);

    // window is closed now
    assert_eq!(
        engine.handle_key(Modality::Color, now),
        nback_core::KeyClass::Ignored
    );
    assert!(engine.trials().last().unwrap().responses.is_empty());
}

#[test]
fn export_success_renders_csv() {
    let (mut engine, _display) = engine_with_display(degenerate_config(2, ProgressionPolicy::Adaptive));
    let mut now = 1_000_000;
    engine.begin_session(now);
    run_trial(&mut engine, &mut now, &[]);
    run_trial(&mut engine, &mut now, &[Modality::Audio]);

    let csv = Arc::new(Mutex::new(None));
    let mut exporter = CapturingExporter { csv: csv.clone() };
    engine.export_to(&mut exporter);

    let rendered = csv.lock().unwrap().clone().unwrap();
    let mut lines = rendered.lines();
    assert!(lines.next().unwrap().starts_with("TrialNumber,Timestamp,Mode"));
    assert_eq!(lines.count(), 2);
    assert!(rendered.contains("FalseAlarm"));
}

#[test]
fn export_failure_warns_but_keeps_records() {
    let (mut engine, display) = engine_with_display(degenerate_config(2, ProgressionPolicy::Adaptive));
    let mut now = 1_000_000;
    engine.begin_session(now);
    run_trial(&mut engine, &mut now, &[]);

    engine.export_to(&mut FailingExporter);
    assert!(display
        .messages()
        .iter()
        .any(|m| m.starts_with("Warning: could not save trial data")));
    // records survive the failed export, no retry fires
    assert_eq!(engine.trials().len(), 1);
}

#[test]
fn new_session_resets_everything() {
    let (mut engine, _display) = engine_with_display(degenerate_config(4, ProgressionPolicy::Adaptive));
    let mut now = 1_000_000;
    engine.begin_session(now);
    run_trial(&mut engine, &mut now, &[Modality::Color]);
    let first_id = engine.session_id().clone();
    assert_ne!(engine.score(), 0);

    engine.begin_session(now);
    assert_eq!(engine.score(), 0);
    assert_eq!(engine.trials().len(), 0);
    assert_eq!(engine.history_len(), 0);
    assert_ne!(engine.session_id(), &first_id);
}
