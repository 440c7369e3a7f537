//! Replay sequences
//!
//! Fixed catalog of arm motions, a sequencer that plays them step by step
//! through the device, and the status buffer pollers drain.

mod catalog;
mod sequencer;
mod status;

pub use catalog::{ReplayCatalog, ReplaySequence, ReplayStep};
pub use sequencer::ReplaySequencer;
pub use status::{ReplayPoll, ReplayStatus};
