//! Property-based tests for lookback and trial scoring invariants.

use proptest::prelude::*;

use crate::config::ScoringConfig;
use crate::domain::{ClipId, Modality, Mode, Outcome, Trial};
use crate::history::StimulusHistory;
use crate::response::ResponseWindow;
use crate::scoring::{BlockStats, Scorer};

proptest! {
    /// lookBack(n) agrees with a plain model of the recorded sequence, for
    /// every n up to past the history length.
    #[test]
    fn lookback_matches_model(entries in proptest::collection::vec(
        proptest::option::of(0u8..8), 0..40)
    ) {
        let mut h = StimulusHistory::new();
        for e in &entries {
            h.record_trial(None, None, e.map(ClipId));
        }
        for n in 1..entries.len() + 3 {
            let expected = if n <= entries.len() {
                Some(entries[entries.len() - n].map(ClipId))
            } else {
                None
            };
            prop_assert_eq!(h.clips().look_back(n), expected);
            if let Some(Some(v)) = expected {
                prop_assert!(h.clips().matches(n, v));
            }
        }
    }

    /// expectedMatch is true iff the lane has >= n entries and the value at
    /// length-n equals the current stimulus.
    #[test]
    fn match_predicate(entries in proptest::collection::vec(
        proptest::option::of(0u8..4), 0..30),
        n in 1usize..6,
        current in 0u8..4,
    ) {
        let mut h = StimulusHistory::new();
        for e in &entries {
            h.record_trial(None, None, e.map(ClipId));
        }
        let model = entries.len() >= n
            && entries[entries.len() - n] == Some(current);
        prop_assert_eq!(h.clips().matches(n, ClipId(current)), model);
    }

    /// A trial's points equal the sum of its correct/false-alarm awards,
    /// unless it missed, in which case points are exactly the miss value.
    #[test]
    fn trial_points_invariant(
        expected_mask in proptest::collection::vec(any::<bool>(), 3),
        keys in proptest::collection::vec(0usize..3, 0..6),
    ) {
        let scoring = ScoringConfig::default();
        let mut scorer = Scorer::new(scoring.clone());
        let mut stats = BlockStats::default();
        let mut window = ResponseWindow::new();
        let mut trial = Trial::new(1, 0, Mode::Combined, 2);
        for (i, m) in Modality::ALL.iter().enumerate() {
            trial.set_expected(*m, expected_mask[i]);
        }

        window.open(0);
        let mut expected_points = 0i32;
        let mut seen = [false; 3];
        for (step, k) in keys.iter().enumerate() {
            let m = Modality::ALL[*k];
            let now = (step as i64 + 1) * 1_000;
            window.handle_key(&mut trial, m, now, &mut scorer, &mut stats);
            if !seen[*k] {
                seen[*k] = true;
                if expected_mask[*k] {
                    expected_points += scoring.points_correct;
                } else {
                    expected_points += scoring.points_false_alarm;
                }
            }
        }
        let missed = window.close(&mut trial, &mut scorer);

        if missed {
            prop_assert!(keys.is_empty());
            prop_assert_eq!(trial.points, scoring.points_miss);
            prop_assert!(matches!(
                trial.outcome,
                Outcome::MissLocation | Outcome::MissColor | Outcome::MissAudio
            ));
        } else {
            prop_assert_eq!(trial.points, expected_points);
        }
    }
}
