//! Playback transport: state machine, device callback, and audio thread.

mod controller;
mod source;
pub mod transport;

pub use controller::{AudioError, PlaybackController, PlaybackStrategy};
pub use source::TransportSource;
pub use transport::{
    BlockFill, PlaybackState, PlaybackStatus, Transport, TransportWarning, SAMPLE_RATE,
};
