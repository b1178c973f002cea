use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What a key press asks the feed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Previous,
    Next,
    ToggleMute,
    ToggleLike,
    Retry,
    Products,
    Status,
    Quit,
}

pub fn action_for(key: &KeyEvent) -> Option<Action> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return matches!(key.code, KeyCode::Char('c')).then_some(Action::Quit);
    }
    let action = match key.code {
        KeyCode::Up | KeyCode::Char('k') => Action::Previous,
        KeyCode::Down | KeyCode::Char('j') | KeyCode::Char(' ') => Action::Next,
        KeyCode::Char('m') => Action::ToggleMute,
        KeyCode::Char('l') => Action::ToggleLike,
        KeyCode::Char('r') => Action::Retry,
        KeyCode::Char('p') => Action::Products,
        KeyCode::Char('s') => Action::Status,
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        _ => return None,
    };
    Some(action)
}

/// Read keys on a blocking thread until the token is cancelled or the
/// receiver goes away.
///
/// The terminal stays in raw mode while the reader runs.
pub fn spawn_key_reader(token: CancellationToken) -> (JoinHandle<()>, mpsc::Receiver<Action>) {
    let (tx, rx) = mpsc::channel(16);

    let handle = tokio::task::spawn_blocking(move || {
        if terminal::enable_raw_mode().is_err() {
            info!("Failed to enable raw mode. Keyboard input is disabled.");
            return;
        }

        while !token.is_cancelled() {
            let Ok(true) = event::poll(POLL_INTERVAL) else {
                continue;
            };
            let Ok(Event::Key(key)) = event::read() else {
                continue;
            };
            let Some(action) = action_for(&key) else {
                continue;
            };
            debug!(?action, "Key pressed");
            if tx.blocking_send(action).is_err() || action == Action::Quit {
                break;
            }
        }

        if terminal::disable_raw_mode().is_err() {
            info!("Failed to disable raw mode.");
        }
    });

    (handle, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_navigation_keys() {
        assert_eq!(
            action_for(&press(KeyCode::Down, KeyModifiers::NONE)),
            Some(Action::Next)
        );
        assert_eq!(
            action_for(&press(KeyCode::Char('k'), KeyModifiers::NONE)),
            Some(Action::Previous)
        );
        assert_eq!(action_for(&press(KeyCode::Left, KeyModifiers::NONE)), None);
    }

    #[test]
    fn test_quit_keys() {
        assert_eq!(
            action_for(&press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Action::Quit)
        );
        assert_eq!(
            action_for(&press(KeyCode::Esc, KeyModifiers::NONE)),
            Some(Action::Quit)
        );
        assert_eq!(
            action_for(&press(KeyCode::Char('m'), KeyModifiers::CONTROL)),
            None
        );
    }

    #[test]
    fn test_release_is_ignored() {
        let mut key = press(KeyCode::Char('l'), KeyModifiers::NONE);
        key.kind = KeyEventKind::Release;
        assert_eq!(action_for(&key), None);
    }
}
