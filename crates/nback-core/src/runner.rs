//! Async session driver.
//!
//! One tokio task drives the cooperative trial loop; the response window is
//! its only suspension point. Key events arrive on a bounded channel and are
//! drained into the engine while the window sleep runs; input never extends
//! or shortens the window. Starting a new session aborts the previous task
//! first, so at most one loop is ever active.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::Modality;
use crate::engine::Engine;

/// Bounded key-event channel depth. Three keys per trial is the ceiling, so
/// a small buffer absorbs any burst.
const KEY_CHANNEL_CAPACITY: usize = 16;

/// Wall-clock now in microseconds.
pub fn now_us() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

/// Drive one full session on the current task: trial generation,
/// presentation, the timed response window, scoring and block evaluation,
/// until the progression machine reaches a terminal state.
pub async fn drive_session(engine: &mut Engine, keys: &mut mpsc::Receiver<Modality>) {
    let timing = engine.config().timing.clone();
    engine.begin_session(now_us());

    while !engine.is_terminal() {
        // key events outside a response window are ignored, never queued
        // into the next trial
        while keys.try_recv().is_ok() {}

        if engine.start_trial(now_us()).is_err() {
            break;
        }

        // The window always runs its full duration; keys are folded in as
        // they arrive.
        let deadline =
            tokio::time::Instant::now() + Duration::from_millis(timing.stimulus_duration_ms);
        let sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(sleep);
        let mut input_open = true;
        loop {
            if input_open {
                tokio::select! {
                    _ = &mut sleep => break,
                    maybe_key = keys.recv() => match maybe_key {
                        Some(m) => {
                            engine.handle_key(m, now_us());
                        }
                        None => input_open = false,
                    },
                }
            } else {
                sleep.as_mut().await;
                break;
            }
        }
        engine.close_window();

        if timing.delay_between_stimuli_ms > 0 {
            tokio::time::sleep(Duration::from_millis(timing.delay_between_stimuli_ms)).await;
        }

        if engine.at_block_boundary() {
            let decision = engine.finish_block();
            if engine.is_terminal() {
                break;
            }
            if decision.advanced && timing.delay_between_phases_ms > 0 {
                tokio::time::sleep(Duration::from_millis(timing.delay_between_phases_ms)).await;
            }
            engine.announce_phase();
        }
    }
}

struct RunningSession {
    keys: mpsc::Sender<Modality>,
    join: JoinHandle<Engine>,
}

/// Owns the single active session task. Starting a session tears down any
/// previous one before the new engine state comes up.
#[derive(Default)]
pub struct SessionRunner {
    current: Option<RunningSession>,
}

impl SessionRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.current
            .as_ref()
            .map(|s| !s.join.is_finished())
            .unwrap_or(false)
    }

    /// Spawn the session loop, cancelling any outstanding one first. Returns
    /// the key-event sender for the input collaborator.
    pub fn start(&mut self, mut engine: Engine) -> mpsc::Sender<Modality> {
        self.abort();
        let (tx, mut rx) = mpsc::channel(KEY_CHANNEL_CAPACITY);
        let join = tokio::spawn(async move {
            drive_session(&mut engine, &mut rx).await;
            engine
        });
        self.current = Some(RunningSession {
            keys: tx.clone(),
            join,
        });
        tx
    }

    /// Key-event sender of the active session, if any.
    pub fn keys(&self) -> Option<mpsc::Sender<Modality>> {
        self.current.as_ref().map(|s| s.keys.clone())
    }

    /// Cancel the active session loop, if any.
    pub fn abort(&mut self) {
        if let Some(session) = self.current.take() {
            session.join.abort();
            log::debug!("previous session loop aborted");
        }
    }

    /// Wait for the active session to finish and take the engine back (for
    /// export and summaries). Returns `None` if there was no session or it
    /// was aborted. Cancel-safe: dropping the future leaves the session
    /// registered so a later `abort` still reaches it.
    pub async fn finish(&mut self) -> Option<Engine> {
        let session = self.current.as_mut()?;
        let result = (&mut session.join).await.ok();
        self.current = None;
        result
    }
}
