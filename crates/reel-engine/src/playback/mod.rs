//! Slot lifecycle and the playback controller.

mod controller;
mod slot;

pub use controller::{
    PlayCompletion, PlayRequest, PlaybackController, SlotSnapshot, SweepOutcome, TransitionPlan,
};
pub use slot::{PlaybackSlot, SlotError, SlotState, distance, neighbours};
