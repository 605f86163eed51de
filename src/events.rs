//! Core → UI event channel.
//!
//! The playback core never touches widgets. State changes, warnings, and
//! errors are pushed onto a channel; the Tauri layer forwards each one to
//! the webview as a `playback-event`, and the frontend reacts to those
//! notifications (button labels, message boxes) instead of polling.

use serde::Serialize;

use crate::playback::transport::PlaybackState;

pub type EventSender = crossbeam_channel::Sender<PlaybackEvent>;
pub type EventReceiver = crossbeam_channel::Receiver<PlaybackEvent>;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlaybackEvent {
    /// Transport entered a new state.
    StateChanged { state: PlaybackState },
    /// Playback drained the whole buffer and auto-stopped.
    Finished,
    /// An ignored transport event or a recoverable condition (CPU fallback).
    Warning { message: String },
    /// A failure; the transport is back in Stopped and resources released.
    Error { message: String },
}

pub fn channel() -> (EventSender, EventReceiver) {
    crossbeam_channel::unbounded()
}
