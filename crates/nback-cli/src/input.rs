//! Keystroke capture for the interactive session.
//!
//! A blocking poll loop maps L/C/A key presses onto modality response events
//! and feeds them into the running session. The loop exits when the subject
//! quits (Esc / Ctrl+C) or when the session ends and closes the channel.

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use nback_core::Modality;
use tokio::sync::mpsc;

const POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Restores the terminal on drop, whatever path the loop exits by.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> std::io::Result<Self> {
        crossterm::terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::terminal::disable_raw_mode();
    }
}

fn is_exit(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => true,
        KeyCode::Esc => true,
        _ => false,
    }
}

fn key_to_modality(key: &KeyEvent) -> Option<Modality> {
    match key.code {
        KeyCode::Char(c) => match c.to_ascii_lowercase() {
            'l' => Some(Modality::Location),
            'c' => Some(Modality::Color),
            'a' => Some(Modality::Audio),
            _ => None,
        },
        _ => None,
    }
}

/// Run the blocking input loop. Returns `true` when the subject quit, or
/// `false` when the session ended on its own.
pub fn input_loop(keys: mpsc::Sender<Modality>) -> bool {
    let _raw = match RawModeGuard::enable() {
        Ok(guard) => guard,
        Err(e) => {
            log::warn!("raw mode unavailable, keyboard input disabled: {}", e);
            return false;
        }
    };

    loop {
        match event::poll(POLL_TIMEOUT) {
            Ok(true) => {}
            Ok(false) => {
                if keys.is_closed() {
                    return false;
                }
                continue;
            }
            Err(e) => {
                log::warn!("input poll failed: {}", e);
                return false;
            }
        }
        let key = match event::read() {
            Ok(Event::Key(key)) => key,
            Ok(_) => continue,
            Err(e) => {
                log::warn!("input read failed: {}", e);
                return false;
            }
        };
        if is_exit(&key) {
            return true;
        }
        if let Some(modality) = key_to_modality(&key) {
            if keys.blocking_send(modality).is_err() {
                // session loop is gone; nothing left to feed
                return false;
            }
        }
    }
}
