//! Media element abstraction.
//!
//! The host (a browser `<video>` element, a native player, or the simulated
//! element used by the CLI) implements [`MediaElement`]; the engine only ever
//! talks to media through this trait.

mod simulated;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PlaybackError;

pub use simulated::{PlayScript, SimulatedElement, SimulatedStats};

/// A single media element bound to one feed position.
#[async_trait]
pub trait MediaElement: Send + Sync {
    /// Attach `src` and start fetching/decoding it.
    fn attach(&self, src: &str);
    /// Release the source and any decoder held for it.
    fn detach(&self);
    fn has_source(&self) -> bool;

    fn set_muted(&self, muted: bool);
    fn is_muted(&self) -> bool;

    fn pause(&self);
    /// Seek back to the start.
    fn rewind(&self);
    fn is_playing(&self) -> bool;

    /// Begin playback. Rejections are classified with
    /// [`PlaybackError::is_retryable`].
    async fn play(&self) -> Result<(), PlaybackError>;
}

pub type SharedElement = Arc<dyn MediaElement>;

/// Lifecycle notifications reported by the host for a feed position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    /// Enough data is buffered to start playback.
    Ready,
    /// The source could not be fetched or decoded.
    LoadFailed { reason: String },
}
