//! Playback engine for vertically scrolling short-video feeds.
//!
//! The engine decides which feed positions hold decoded media while a user
//! scrolls: one active position, a bounded set of paused neighbours, and
//! nothing else. It is host-agnostic; media elements are reached through the
//! [`media::MediaElement`] trait.
//!
//! - [`playback`]: slot state machine and the playback controller
//! - [`router`]: scroll, wheel, touch and keyboard routing
//! - [`monitor`]: periodic media and memory sampling
//! - [`actor`]: the task that ties a session together

pub mod actor;
pub mod config;
pub mod device;
pub mod engagement;
pub mod error;
pub mod media;
pub mod model;
pub mod monitor;
pub mod playback;
pub mod retry;
pub mod router;
pub mod session;

pub use actor::{FeedActor, FeedCommand, FeedEvent, FeedHandle, FeedOutcome, FeedSnapshot};
pub use config::EngineConfig;
pub use device::DeviceId;
pub use engagement::{Engagement, InMemoryEngagement};
pub use error::{ConfigError, DeviceIdError, PlaybackError, Result};
pub use media::{MediaElement, MediaEvent, SharedElement, SimulatedElement};
pub use model::{FeedItem, ItemId, LikeAction, ViewReceipt};
pub use monitor::{MemoryMonitor, MemorySample};
pub use session::FeedSession;
