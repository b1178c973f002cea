use std::fmt;

use serde::Serialize;

use crate::error::PlaybackError;

/// Playback state of one feed position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    /// No media handle attached.
    Unloaded,
    /// Current position; attached and waiting for `play()` to resolve.
    Loading,
    /// Attached, paused, rewound.
    Preloaded,
    /// Current position, playing.
    Active,
    /// Terminal load or play failure; inert until explicitly retried.
    Failed,
}

impl SlotState {
    pub fn is_attached(self) -> bool {
        !matches!(self, SlotState::Unloaded)
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SlotState::Unloaded => "unloaded",
            SlotState::Loading => "loading",
            SlotState::Preloaded => "preloaded",
            SlotState::Active => "active",
            SlotState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Why a slot was marked failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "lowercase")]
pub enum SlotError {
    /// Source unreachable or unsupported; the element should not be rendered.
    Load(String),
    /// Play rejected after all retries.
    Play(String),
}

impl SlotError {
    pub fn from_play(err: &PlaybackError) -> Self {
        match err {
            PlaybackError::Load { reason } => SlotError::Load(reason.clone()),
            other => SlotError::Play(other.to_string()),
        }
    }

    /// Load failures hide the element; play failures leave it visible but inert.
    pub fn hides_media(&self) -> bool {
        matches!(self, SlotError::Load(_))
    }
}

impl fmt::Display for SlotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotError::Load(reason) => write!(f, "load error: {reason}"),
            SlotError::Play(reason) => write!(f, "playback error: {reason}"),
        }
    }
}

/// Per-position playback record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSlot {
    pub state: SlotState,
    pub last_error: Option<SlotError>,
    /// Play rejections observed at this position during the session.
    pub play_failures: u32,
}

impl PlaybackSlot {
    pub fn new() -> Self {
        Self {
            state: SlotState::Unloaded,
            last_error: None,
            play_failures: 0,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.state == SlotState::Failed
    }
}

impl Default for PlaybackSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Distance between two feed positions.
pub fn distance(a: usize, b: usize) -> usize {
    a.abs_diff(b)
}

/// Positions within `radius` of `center`, excluding `center`, clamped to the feed.
pub fn neighbours(center: usize, radius: usize, len: usize) -> impl Iterator<Item = usize> {
    let start = center.saturating_sub(radius);
    let end = center.saturating_add(radius).min(len.saturating_sub(1));
    (start..=end).filter(move |&i| i != center && i < len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbours_clamped_at_edges() {
        assert_eq!(neighbours(0, 1, 5).collect::<Vec<_>>(), vec![1]);
        assert_eq!(neighbours(4, 1, 5).collect::<Vec<_>>(), vec![3]);
        assert_eq!(neighbours(2, 2, 5).collect::<Vec<_>>(), vec![0, 1, 3, 4]);
        assert_eq!(neighbours(0, 0, 5).count(), 0);
        assert_eq!(neighbours(0, 3, 1).count(), 0);
    }

    #[test]
    fn test_attachment_by_state() {
        assert!(!SlotState::Unloaded.is_attached());
        assert!(SlotState::Loading.is_attached());
        assert!(SlotState::Preloaded.is_attached());
        assert!(SlotState::Active.is_attached());
        assert!(SlotState::Failed.is_attached());
    }

    #[test]
    fn test_slot_error_visibility() {
        assert!(SlotError::Load("404".into()).hides_media());
        assert!(!SlotError::Play("autoplay".into()).hides_media());
    }
}
