//! Handle for driving a running feed actor.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::messages::{FeedCommand, FeedEvent, FeedSnapshot};
use crate::media::MediaEvent;
use crate::router::NavKey;

/// Default mailbox capacity for the feed actor.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// Capacity of the event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Default timeout for send operations when the mailbox is full.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("feed actor has stopped")]
    ActorStopped,
    #[error("send to feed actor timed out")]
    Timeout,
}

/// Cloneable handle to a feed actor.
#[derive(Clone)]
pub struct FeedHandle {
    sender: mpsc::Sender<FeedCommand>,
    events: broadcast::Sender<FeedEvent>,
    cancellation_token: CancellationToken,
}

impl FeedHandle {
    pub(crate) fn new(
        sender: mpsc::Sender<FeedCommand>,
        events: broadcast::Sender<FeedEvent>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            sender,
            events,
            cancellation_token,
        }
    }

    /// Send a command, waiting briefly if the mailbox is full.
    pub async fn send(&self, cmd: FeedCommand) -> Result<(), SendError> {
        match self.sender.try_send(cmd) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(cmd)) => {
                match tokio::time::timeout(DEFAULT_SEND_TIMEOUT, self.sender.reserve()).await {
                    Ok(Ok(permit)) => {
                        permit.send(cmd);
                        Ok(())
                    }
                    Ok(Err(_)) => Err(SendError::ActorStopped),
                    Err(_) => Err(SendError::Timeout),
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SendError::ActorStopped),
        }
    }

    /// Subscribe to feed events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.events.subscribe()
    }

    pub async fn scroll(&self, offset: f64) -> Result<(), SendError> {
        self.send(FeedCommand::Scroll { offset }).await
    }

    pub async fn wheel(&self, delta_y: f64) -> Result<(), SendError> {
        self.send(FeedCommand::Wheel { delta_y }).await
    }

    pub async fn touch_start(&self, y: f64) -> Result<(), SendError> {
        self.send(FeedCommand::TouchStart { y }).await
    }

    pub async fn touch_end(&self, y: f64) -> Result<(), SendError> {
        self.send(FeedCommand::TouchEnd { y }).await
    }

    /// Forward a key press. Returns whether the host should suppress its
    /// default handling of the key.
    pub async fn key(&self, key: NavKey) -> Result<bool, SendError> {
        self.send(FeedCommand::Key(key)).await?;
        Ok(key.is_navigation())
    }

    pub async fn resize(&self, viewport_height: f64) -> Result<(), SendError> {
        self.send(FeedCommand::Resize { viewport_height }).await
    }

    pub async fn jump_to(&self, index: usize) -> Result<(), SendError> {
        self.send(FeedCommand::JumpTo(index)).await
    }

    pub async fn toggle_mute(&self) -> Result<(), SendError> {
        self.send(FeedCommand::ToggleMute).await
    }

    pub async fn set_muted(&self, muted: bool) -> Result<(), SendError> {
        self.send(FeedCommand::SetMuted(muted)).await
    }

    pub async fn toggle_like(&self) -> Result<(), SendError> {
        self.send(FeedCommand::ToggleLike).await
    }

    pub async fn retry_current(&self) -> Result<(), SendError> {
        self.send(FeedCommand::RetryCurrent).await
    }

    pub async fn media_event(&self, index: usize, event: MediaEvent) -> Result<(), SendError> {
        self.send(FeedCommand::Media { index, event }).await
    }

    pub async fn snapshot(&self) -> Result<FeedSnapshot, SendError> {
        let (tx, rx) = oneshot::channel();
        self.send(FeedCommand::GetSnapshot(tx)).await?;
        rx.await.map_err(|_| SendError::ActorStopped)
    }

    /// Ask the actor to stop after the commands already queued.
    pub async fn stop(&self) -> Result<(), SendError> {
        self.send(FeedCommand::Stop).await
    }

    /// Stop the actor without draining its mailbox.
    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl std::fmt::Debug for FeedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedHandle")
            .field("closed", &self.sender.is_closed())
            .field("capacity", &self.sender.capacity())
            .finish()
    }
}
