//! Messages exchanged with the feed actor.

use serde::Serialize;
use tokio::sync::oneshot;

use crate::error::PlaybackError;
use crate::media::MediaEvent;
use crate::model::{FeedItem, ItemId, LikeAction, ViewReceipt};
use crate::playback::{SlotError, SlotSnapshot, SlotState};
use crate::retry::RetryReport;
use crate::router::{NavKey, ScrollTarget, ViewportState};

/// Commands accepted by the feed actor.
#[derive(Debug)]
pub enum FeedCommand {
    /// Raw scroll offset sampled by the host.
    Scroll { offset: f64 },
    Wheel { delta_y: f64 },
    TouchStart { y: f64 },
    TouchEnd { y: f64 },
    Key(NavKey),
    Resize { viewport_height: f64 },
    JumpTo(usize),
    ToggleMute,
    SetMuted(bool),
    /// Like or unlike the current item.
    ToggleLike,
    /// Clear a terminal failure on the current item and play again.
    RetryCurrent,
    /// Lifecycle event reported by the host for a media element.
    Media { index: usize, event: MediaEvent },
    /// Query current state (response sent via oneshot channel).
    GetSnapshot(oneshot::Sender<FeedSnapshot>),
    /// Request graceful shutdown.
    Stop,
}

/// Notifications published by the feed actor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    IndexChanged { from: usize, to: usize },
    /// The host should scroll its container.
    ScrollTo(ScrollTarget),
    SlotChanged { index: usize, state: SlotState },
    /// A slot failed for good; `hide_media` is set for load failures.
    SlotFailed {
        index: usize,
        error: SlotError,
        hide_media: bool,
    },
    MuteChanged { muted: bool },
    ViewCountUpdated { index: usize, view_count: u64 },
    LikeCountUpdated {
        index: usize,
        like_count: u64,
        liked: bool,
    },
}

/// Running counters kept by the actor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeedStats {
    pub transitions: u64,
    pub sweeps: u64,
    pub stale_sweeps: u64,
    pub failed_plays: u64,
    pub views_reported: u64,
}

/// Point-in-time state of a feed session.
#[derive(Debug, Clone, Serialize)]
pub struct FeedSnapshot {
    pub viewport: ViewportState,
    pub muted: bool,
    pub generation: u64,
    pub slots: Vec<SlotSnapshot>,
    pub items: Vec<FeedItem>,
    pub liked: Vec<ItemId>,
    pub stats: FeedStats,
}

impl FeedSnapshot {
    pub fn current_item(&self) -> Option<&FeedItem> {
        self.items.get(self.viewport.current_index)
    }

    pub fn state_of(&self, index: usize) -> Option<SlotState> {
        self.slots.get(index).map(|slot| slot.state)
    }

    pub fn active_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.state == SlotState::Active)
            .count()
    }
}

/// Results of work the actor spawned, fed back through its internal channel.
#[derive(Debug)]
pub(crate) enum Completion {
    PlayFinished {
        index: usize,
        generation: u64,
        report: RetryReport<()>,
    },
    SweepDue {
        index: usize,
    },
    ViewRecorded {
        item: ItemId,
        result: Result<ViewReceipt, PlaybackError>,
    },
    LikeRecorded {
        item: ItemId,
        action: LikeAction,
        result: Result<u64, PlaybackError>,
    },
}

/// How the actor's run loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    /// Stopped by a `Stop` command or because every handle was dropped.
    Stopped,
    /// Shut down through the cancellation token.
    Cancelled,
}
