//! Playback controller: decides which feed positions hold decoded media.
//!
//! The controller is synchronous. Work that has to wait (play-with-retry, the
//! delayed cleanup sweep) is returned to the caller as a [`TransitionPlan`]
//! and its completion is fed back through [`PlaybackController::complete_play`]
//! and [`PlaybackController::sweep`]. Both re-check the current position and
//! no-op when superseded.

use std::collections::HashSet;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::slot::{PlaybackSlot, SlotError, SlotState, distance, neighbours};
use crate::config::{PlaybackConfig, SlotPolicy};
use crate::error::PlaybackError;
use crate::media::{MediaEvent, SharedElement};
use crate::retry::{RetryAction, RetryPolicy, RetryReport, retry_with_backoff};
use crate::session::FeedSession;

/// Deferred work produced by a transition.
#[derive(Debug)]
pub struct TransitionPlan {
    pub index: usize,
    pub generation: u64,
    /// Play request for the new current position; `None` when the slot is inert.
    pub play: Option<PlayRequest>,
    /// Delay before the cleanup sweep for `index` should run.
    pub sweep_after: Duration,
}

/// Play-with-retry job for one position.
pub struct PlayRequest {
    pub index: usize,
    pub generation: u64,
    element: SharedElement,
    policy: RetryPolicy,
    current: watch::Receiver<Option<(usize, u64)>>,
}

impl std::fmt::Debug for PlayRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayRequest")
            .field("index", &self.index)
            .field("generation", &self.generation)
            .field("policy", &self.policy)
            .finish()
    }
}

impl PlayRequest {
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `play()` with bounded retries until it resolves, fails for good, or
    /// a newer transition takes over.
    pub async fn run(self) -> RetryReport<()> {
        let index = self.index;
        let owner = Some((index, self.generation));
        let element = self.element;
        let current = self.current;

        retry_with_backoff(
            &self.policy,
            index,
            || *current.borrow() == owner && element.has_source(),
            |_| {
                let element = element.clone();
                async move { RetryAction::from(element.play().await) }
            },
        )
        .await
    }
}

/// What a finished play request amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayCompletion {
    Activated { index: usize },
    Failed { index: usize, error: SlotError },
    /// The position is no longer current; the result was discarded.
    Superseded { index: usize },
}

/// Result of a cleanup sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// `current_index` moved on since the sweep was scheduled.
    Stale,
    Completed { unloaded: usize, reset: usize },
}

impl SweepOutcome {
    pub fn changes(&self) -> usize {
        match self {
            SweepOutcome::Stale => 0,
            SweepOutcome::Completed { unloaded, reset } => unloaded + reset,
        }
    }
}

/// Point-in-time view of one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotSnapshot {
    pub index: usize,
    pub state: SlotState,
    pub has_source: bool,
    pub playing: bool,
    pub muted: bool,
    pub error: Option<SlotError>,
}

pub struct PlaybackController {
    config: PlaybackConfig,
    elements: Vec<SharedElement>,
    slots: Vec<PlaybackSlot>,
    current: Option<usize>,
    generation: u64,
    /// Positions promoted to constrained handling after repeated rejections.
    constrained: HashSet<usize>,
    /// Current position and the generation that owns it.
    current_tx: watch::Sender<Option<(usize, u64)>>,
}

impl PlaybackController {
    /// One element per feed position, in feed order.
    pub fn new(config: PlaybackConfig, elements: Vec<SharedElement>) -> Self {
        let slots = vec![PlaybackSlot::new(); elements.len()];
        let (current_tx, _) = watch::channel(None);
        Self {
            config,
            elements,
            slots,
            current: None,
            generation: 0,
            constrained: HashSet::new(),
            current_tx,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn slot(&self, index: usize) -> Option<&PlaybackSlot> {
        self.slots.get(index)
    }

    pub fn elements(&self) -> &[SharedElement] {
        &self.elements
    }

    pub fn is_constrained(&self, index: usize) -> bool {
        self.constrained.contains(&index)
    }

    pub fn policy(&self, index: usize) -> SlotPolicy {
        self.config
            .policy_for(index, self.constrained.contains(&index))
    }

    /// Make `index` the current position.
    ///
    /// Pauses every other handle, attaches and dispatches play for the new
    /// position, preloads neighbours, and returns the deferred work. Returns
    /// `None` for an empty feed or when `index` is already current.
    pub fn transition(&mut self, session: &FeedSession, index: usize) -> Option<TransitionPlan> {
        if self.slots.is_empty() {
            return None;
        }
        let index = index.min(self.slots.len() - 1);
        if self.current == Some(index) {
            return None;
        }

        let previous = self.current;
        self.current = Some(index);
        self.advance_generation();

        let policy = self.policy(index);
        debug!(
            from = ?previous,
            to = index,
            generation = self.generation,
            ?policy,
            "Playback transition"
        );

        // Nothing but the new position may keep decoding.
        for i in 0..self.slots.len() {
            if i != index && self.slots[i].state.is_attached() {
                self.park(session, i);
            }
        }

        if policy.isolate {
            for i in 0..self.slots.len() {
                if i != index && self.slots[i].state.is_attached() {
                    self.unload(i);
                }
            }
        }

        let play = self.activate(session, index, &policy);

        for i in neighbours(index, policy.preload_distance, self.slots.len()) {
            self.preload(session, i);
        }

        Some(TransitionPlan {
            index,
            generation: self.generation,
            play,
            sweep_after: self.config.sweep_grace(),
        })
    }

    /// Clear a terminal failure on the current position and dispatch play again.
    pub fn retry_current(&mut self, session: &FeedSession) -> Option<TransitionPlan> {
        let index = self.current?;
        if !self.slots[index].is_failed() {
            return None;
        }

        info!(index, "Retrying failed position on request");
        self.advance_generation();
        self.slots[index].last_error = None;
        self.elements[index].detach();
        self.slots[index].state = SlotState::Unloaded;

        let policy = self.policy(index);
        let play = self.activate(session, index, &policy);
        Some(TransitionPlan {
            index,
            generation: self.generation,
            play,
            sweep_after: self.config.sweep_grace(),
        })
    }

    /// Apply the outcome of a [`PlayRequest`].
    pub fn complete_play(
        &mut self,
        session: &FeedSession,
        index: usize,
        generation: u64,
        report: RetryReport<()>,
    ) -> PlayCompletion {
        let Some(slot) = self.slots.get_mut(index) else {
            return PlayCompletion::Superseded { index };
        };
        let element = &self.elements[index];

        if generation != self.generation || self.current != Some(index) {
            // A newer request owns this position, it scrolled away, or its
            // media failed to load while play was pending.
            if self.current != Some(index) {
                element.pause();
                element.rewind();
                if matches!(slot.state, SlotState::Loading | SlotState::Active) {
                    slot.state = SlotState::Preloaded;
                }
            } else if slot.state == SlotState::Failed {
                element.pause();
            }
            debug!(index, generation, "Discarding superseded play result");
            return PlayCompletion::Superseded { index };
        }

        slot.play_failures = slot.play_failures.saturating_add(report.failed_attempts());
        if self.config.adaptive.enabled
            && slot.play_failures >= self.config.adaptive.failure_threshold
            && self.constrained.insert(index)
        {
            info!(
                index,
                failures = slot.play_failures,
                "Position promoted to constrained playback"
            );
        }

        match report.result {
            Ok(()) => {
                element.set_muted(session.muted());
                slot.state = SlotState::Active;
                slot.last_error = None;
                debug!(index, attempts = report.attempts, "Position active");
                PlayCompletion::Activated { index }
            }
            Err(PlaybackError::Superseded { .. }) => {
                debug!(index, "Play chain superseded");
                PlayCompletion::Superseded { index }
            }
            Err(err) => {
                element.pause();
                let error = SlotError::from_play(&err);
                warn!(index, attempts = report.attempts, error = %err, "Playback failed");
                slot.state = SlotState::Failed;
                slot.last_error = Some(error.clone());
                PlayCompletion::Failed { index, error }
            }
        }
    }

    /// Cleanup pass scheduled after a transition to `index`.
    ///
    /// Unloads positions beyond the retain window and parks the rest. A sweep
    /// for a position that is no longer current does nothing.
    pub fn sweep(&mut self, session: &FeedSession, index: usize) -> SweepOutcome {
        if self.current != Some(index) {
            debug!(index, current = ?self.current, "Skipping stale sweep");
            return SweepOutcome::Stale;
        }

        let policy = self.policy(index);
        let mut unloaded = 0;
        let mut reset = 0;

        for i in 0..self.slots.len() {
            if i == index || !self.slots[i].state.is_attached() {
                continue;
            }
            if distance(i, index) > policy.retain_distance {
                self.unload(i);
                unloaded += 1;
            } else if self.park(session, i) {
                reset += 1;
            }
        }

        if unloaded + reset > 0 {
            debug!(index, unloaded, reset, "Sweep released media");
        }
        SweepOutcome::Completed { unloaded, reset }
    }

    /// Push the mute flag to every attached handle. Returns how many were touched.
    pub fn apply_mute(&self, muted: bool) -> usize {
        let mut touched = 0;
        for (slot, element) in self.slots.iter().zip(&self.elements) {
            if slot.state.is_attached() {
                element.set_muted(muted);
                touched += 1;
            }
        }
        touched
    }

    /// Route a host-reported lifecycle event to its slot.
    ///
    /// Returns the slot error when the event marks the slot failed.
    pub fn handle_media_event(&mut self, index: usize, event: MediaEvent) -> Option<SlotError> {
        let slot = self.slots.get_mut(index)?;
        match event {
            MediaEvent::Ready => {
                debug!(index, state = %slot.state, "Media ready");
                None
            }
            MediaEvent::LoadFailed { reason } => {
                if !slot.state.is_attached() {
                    debug!(index, %reason, "Ignoring load failure for unloaded slot");
                    return None;
                }
                warn!(index, %reason, "Media load failed");
                self.elements[index].pause();
                let error = SlotError::Load(reason);
                slot.state = SlotState::Failed;
                slot.last_error = Some(error.clone());
                if self.current == Some(index) {
                    // Retire the pending play request for this position.
                    self.advance_generation();
                }
                Some(error)
            }
        }
    }

    pub fn snapshot(&self) -> Vec<SlotSnapshot> {
        self.slots
            .iter()
            .zip(&self.elements)
            .enumerate()
            .map(|(index, (slot, element))| SlotSnapshot {
                index,
                state: slot.state,
                has_source: element.has_source(),
                playing: element.is_playing(),
                muted: element.is_muted(),
                error: slot.last_error.clone(),
            })
            .collect()
    }

    fn advance_generation(&mut self) {
        self.generation += 1;
        self.current_tx
            .send_replace(self.current.map(|index| (index, self.generation)));
    }

    // --- slot primitives ---

    /// Attach the current position and build its play request.
    fn activate(
        &mut self,
        session: &FeedSession,
        index: usize,
        policy: &SlotPolicy,
    ) -> Option<PlayRequest> {
        let muted = session.muted();
        let element = self.elements[index].clone();
        let slot = &mut self.slots[index];

        if matches!(slot.last_error, Some(SlotError::Play(_))) {
            // Terminal play failure: stay visible but inert.
            if !slot.state.is_attached() {
                element.attach(session.media_url(index));
            }
            element.set_muted(muted);
            slot.state = SlotState::Failed;
            debug!(index, "Current position is inert after terminal failure");
            return None;
        }

        if slot.state == SlotState::Failed || !element.has_source() {
            // Load failures get a fresh attach when the position comes back.
            slot.last_error = None;
            element.attach(session.media_url(index));
        }
        element.set_muted(muted);
        slot.state = SlotState::Loading;

        Some(PlayRequest {
            index,
            generation: self.generation,
            element,
            policy: self.config.retry_policy(policy.constrained),
            current: self.current_tx.subscribe(),
        })
    }

    fn preload(&mut self, session: &FeedSession, index: usize) {
        let element = &self.elements[index];
        let slot = &mut self.slots[index];

        if !slot.state.is_attached() {
            if matches!(slot.last_error, Some(SlotError::Load(_))) {
                slot.last_error = None;
            }
            element.attach(session.media_url(index));
            slot.state = if slot.last_error.is_some() {
                SlotState::Failed
            } else {
                SlotState::Preloaded
            };
            debug!(index, state = %slot.state, "Preloading neighbour");
        }

        element.pause();
        element.rewind();
        element.set_muted(session.muted());
    }

    /// Pause, rewind and mute-sync an attached non-current slot.
    ///
    /// Returns true when the slot's state changed.
    fn park(&mut self, session: &FeedSession, index: usize) -> bool {
        let element = &self.elements[index];
        let slot = &mut self.slots[index];

        element.pause();
        element.rewind();
        element.set_muted(session.muted());

        if matches!(slot.state, SlotState::Active | SlotState::Loading) {
            slot.state = SlotState::Preloaded;
            true
        } else {
            false
        }
    }

    fn unload(&mut self, index: usize) {
        let element = &self.elements[index];
        element.pause();
        element.detach();
        let slot = &mut self.slots[index];
        debug!(index, from = %slot.state, "Unloading slot");
        slot.state = SlotState::Unloaded;
    }
}
