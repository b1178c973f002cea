use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{MediaElement, SharedElement};
use crate::error::PlaybackError;

/// Scripted outcome for the next `play()` call on a [`SimulatedElement`].
#[derive(Debug, Clone)]
pub enum PlayScript {
    Resolve,
    /// Transient rejection, e.g. autoplay policy or decoder contention.
    Reject(String),
    /// Permanent rejection.
    Fail(String),
}

/// Call counters exposed for diagnostics and assertions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulatedStats {
    pub attaches: u32,
    pub detaches: u32,
    pub play_calls: u32,
    pub pauses: u32,
}

#[derive(Debug, Default)]
struct SimulatedState {
    src: Option<String>,
    muted: bool,
    playing: bool,
    rewound: bool,
    script: VecDeque<PlayScript>,
    stats: SimulatedStats,
}

/// In-process media element with deterministic, scriptable behaviour.
///
/// Unscripted `play()` calls resolve after `play_latency`.
#[derive(Debug)]
pub struct SimulatedElement {
    state: Mutex<SimulatedState>,
    play_latency: Duration,
}

impl SimulatedElement {
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    pub fn with_latency(play_latency: Duration) -> Self {
        Self {
            state: Mutex::new(SimulatedState {
                muted: true,
                rewound: true,
                ..Default::default()
            }),
            play_latency,
        }
    }

    /// Build one element per feed position.
    pub fn feed(count: usize) -> Vec<Arc<SimulatedElement>> {
        (0..count).map(|_| Arc::new(Self::new())).collect()
    }

    /// Upcast a set of simulated elements for the controller.
    pub fn shared(elements: &[Arc<SimulatedElement>]) -> Vec<SharedElement> {
        elements
            .iter()
            .map(|e| Arc::clone(e) as SharedElement)
            .collect()
    }

    /// Queue outcomes for upcoming `play()` calls.
    pub fn script(&self, outcomes: impl IntoIterator<Item = PlayScript>) {
        self.state.lock().script.extend(outcomes);
    }

    pub fn source(&self) -> Option<String> {
        self.state.lock().src.clone()
    }

    pub fn is_rewound(&self) -> bool {
        self.state.lock().rewound
    }

    pub fn stats(&self) -> SimulatedStats {
        self.state.lock().stats
    }
}

impl Default for SimulatedElement {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaElement for SimulatedElement {
    fn attach(&self, src: &str) {
        let mut state = self.state.lock();
        state.src = Some(src.to_string());
        state.playing = false;
        state.rewound = true;
        state.stats.attaches += 1;
    }

    fn detach(&self) {
        let mut state = self.state.lock();
        if state.src.take().is_some() {
            state.stats.detaches += 1;
        }
        state.playing = false;
        state.rewound = true;
    }

    fn has_source(&self) -> bool {
        self.state.lock().src.is_some()
    }

    fn set_muted(&self, muted: bool) {
        self.state.lock().muted = muted;
    }

    fn is_muted(&self) -> bool {
        self.state.lock().muted
    }

    fn pause(&self) {
        let mut state = self.state.lock();
        if state.playing {
            state.stats.pauses += 1;
        }
        state.playing = false;
    }

    fn rewind(&self) {
        self.state.lock().rewound = true;
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    async fn play(&self) -> Result<(), PlaybackError> {
        let script = {
            let mut state = self.state.lock();
            state.stats.play_calls += 1;
            if state.src.is_none() {
                return Err(PlaybackError::permanent_rejection("no source attached"));
            }
            state.script.pop_front().unwrap_or(PlayScript::Resolve)
        };

        if !self.play_latency.is_zero() {
            tokio::time::sleep(self.play_latency).await;
        }

        match script {
            PlayScript::Resolve => {
                let mut state = self.state.lock();
                // Detached while the play request was pending.
                if state.src.is_none() {
                    return Err(PlaybackError::permanent_rejection("play() aborted by unload"));
                }
                state.playing = true;
                state.rewound = false;
                Ok(())
            }
            PlayScript::Reject(reason) => Err(PlaybackError::transient_rejection(reason)),
            PlayScript::Fail(reason) => Err(PlaybackError::permanent_rejection(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_play_requires_source() {
        let element = SimulatedElement::new();
        let err = element.play().await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(!element.is_playing());
    }

    #[tokio::test]
    async fn test_scripted_outcomes_in_order() {
        let element = SimulatedElement::new();
        element.attach("a.mp4");
        element.script([
            PlayScript::Reject("autoplay".into()),
            PlayScript::Fail("codec".into()),
        ]);

        assert!(element.play().await.unwrap_err().is_retryable());
        assert!(!element.play().await.unwrap_err().is_retryable());
        assert!(element.play().await.is_ok());
        assert!(element.is_playing());
        assert!(!element.is_rewound());
        assert_eq!(element.stats().play_calls, 3);
    }

    #[test]
    fn test_detach_releases_and_counts() {
        let element = SimulatedElement::new();
        element.attach("a.mp4");
        element.detach();
        element.detach();
        assert!(!element.has_source());
        assert_eq!(element.stats().attaches, 1);
        assert_eq!(element.stats().detaches, 1);
    }

    #[test]
    fn test_starts_muted() {
        assert!(SimulatedElement::new().is_muted());
    }
}
