//! Feed actor: serialises user input, host media events and timers for one
//! feed session.

mod feed_actor;
mod handle;
mod messages;

pub use feed_actor::FeedActor;
pub use handle::{
    DEFAULT_EVENT_CAPACITY, DEFAULT_MAILBOX_CAPACITY, DEFAULT_SEND_TIMEOUT, FeedHandle, SendError,
};
pub use messages::{FeedCommand, FeedEvent, FeedOutcome, FeedSnapshot, FeedStats};
