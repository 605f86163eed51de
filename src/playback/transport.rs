//! Playback transport state machine.
//!
//! Owns the sample buffer, the playback cursor, and elapsed-time accounting
//! across pause boundaries. All fields live behind one `Mutex<Transport>`
//! shared between the control thread, the audio thread, and the device
//! callback (`TransportSource`), so state + cursor + timestamps are always
//! read and updated as a single critical section.

use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

/// Sample rate of Kokoro output audio (mono).
pub const SAMPLE_RATE: u32 = 24000;

/// Current transport state. Exactly one value at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// A transport event that is not valid in the current state.
///
/// These are surfaced to the user as warnings, never as failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportWarning {
    #[error("Audio is already playing.")]
    AlreadyActive,
    #[error("Playback is already paused.")]
    AlreadyPaused,
    #[error("No audio is currently playing.")]
    NotPlaying,
    #[error("Playback is not paused.")]
    NotPaused,
}

/// Outcome of one device-callback block fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFill {
    /// Block contains audio samples; cursor advanced.
    Audio,
    /// Paused (or lock contention upstream): block is silence, cursor untouched.
    Silence,
    /// Block contains the last real samples, zero-padded; buffer is exhausted.
    Final,
    /// Transport is stopped; the source should end.
    Ended,
}

/// Snapshot of the transport for the UI (button state, progress display).
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    /// Sample-cursor position in seconds (exact for the streaming strategy).
    pub position_seconds: f64,
    /// Wall-clock playback time across pause boundaries.
    pub elapsed_seconds: f64,
    pub duration_seconds: f64,
}

/// The consolidated playback-state record.
pub struct Transport {
    state: PlaybackState,
    buffer: Vec<f32>,
    cursor: usize,
    sample_rate: u32,
    /// Playback time accumulated over all completed play segments.
    accumulated: Duration,
    /// Start of the current play segment; `None` unless Playing.
    segment_start: Option<Instant>,
}

impl Transport {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            state: PlaybackState::Stopped,
            buffer: Vec::new(),
            cursor: 0,
            sample_rate,
            accumulated: Duration::ZERO,
            segment_start: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Install a buffer and enter Playing. Valid only from Stopped.
    pub fn play(&mut self, buffer: Vec<f32>) -> Result<(), TransportWarning> {
        self.play_at(buffer, Instant::now())
    }

    fn play_at(&mut self, buffer: Vec<f32>, now: Instant) -> Result<(), TransportWarning> {
        if self.state != PlaybackState::Stopped {
            return Err(TransportWarning::AlreadyActive);
        }
        self.buffer = buffer;
        self.cursor = 0;
        self.accumulated = Duration::ZERO;
        self.segment_start = Some(now);
        self.state = PlaybackState::Playing;
        Ok(())
    }

    /// Playing → Paused. Banks the current segment's wall-clock time.
    pub fn pause(&mut self) -> Result<(), TransportWarning> {
        self.pause_at(Instant::now())
    }

    fn pause_at(&mut self, now: Instant) -> Result<(), TransportWarning> {
        match self.state {
            PlaybackState::Playing => {
                if let Some(start) = self.segment_start.take() {
                    self.accumulated += now.saturating_duration_since(start);
                }
                self.state = PlaybackState::Paused;
                Ok(())
            }
            PlaybackState::Paused => Err(TransportWarning::AlreadyPaused),
            PlaybackState::Stopped => Err(TransportWarning::NotPlaying),
        }
    }

    /// Paused → Playing. Opens a new wall-clock segment.
    pub fn resume(&mut self) -> Result<(), TransportWarning> {
        self.resume_at(Instant::now())
    }

    fn resume_at(&mut self, now: Instant) -> Result<(), TransportWarning> {
        match self.state {
            PlaybackState::Paused => {
                self.segment_start = Some(now);
                self.state = PlaybackState::Playing;
                Ok(())
            }
            PlaybackState::Playing => Err(TransportWarning::NotPaused),
            PlaybackState::Stopped => Err(TransportWarning::NotPlaying),
        }
    }

    /// Release the buffer and reset everything. Idempotent: returns `false`
    /// if the transport was already stopped.
    pub fn stop(&mut self) -> bool {
        let changed = self.state != PlaybackState::Stopped;
        self.state = PlaybackState::Stopped;
        self.buffer = Vec::new();
        self.cursor = 0;
        self.accumulated = Duration::ZERO;
        self.segment_start = None;
        changed
    }

    /// Auto-transition after the device drained the buffer.
    ///
    /// Called from the control thread (never from inside the callback) once
    /// the sink reports empty. Returns `true` if a transition happened.
    pub fn finish(&mut self) -> bool {
        if self.state == PlaybackState::Playing {
            self.stop();
            true
        } else {
            false
        }
    }

    /// Device-callback contract: fill one output block.
    ///
    /// When Playing, copies `min(remaining, out.len())` samples at the
    /// cursor, zero-fills any shortfall, and advances the cursor by the
    /// number of real samples copied. When Paused the block is silence and
    /// the cursor does not move. The caller holds the transport lock, so the
    /// copy and the advance are atomic with respect to pause/stop.
    pub fn fill_block(&mut self, out: &mut [f32]) -> BlockFill {
        match self.state {
            PlaybackState::Stopped => {
                out.fill(0.0);
                BlockFill::Ended
            }
            PlaybackState::Paused => {
                out.fill(0.0);
                BlockFill::Silence
            }
            PlaybackState::Playing => {
                let remaining = self.buffer.len() - self.cursor;
                let n = remaining.min(out.len());
                out[..n].copy_from_slice(&self.buffer[self.cursor..self.cursor + n]);
                out[n..].fill(0.0);
                self.cursor += n;
                if self.cursor == self.buffer.len() {
                    BlockFill::Final
                } else {
                    BlockFill::Audio
                }
            }
        }
    }

    /// Wall-clock playback time across pause boundaries.
    pub fn elapsed(&self) -> Duration {
        self.elapsed_at(Instant::now())
    }

    fn elapsed_at(&self, now: Instant) -> Duration {
        match self.segment_start {
            Some(start) => self.accumulated + now.saturating_duration_since(start),
            None => self.accumulated,
        }
    }

    /// Sample-cursor position in seconds.
    pub fn position_seconds(&self) -> f64 {
        self.cursor as f64 / self.sample_rate as f64
    }

    pub fn duration_seconds(&self) -> f64 {
        self.buffer.len() as f64 / self.sample_rate as f64
    }

    /// Segment-strategy resume: derive the cursor from accumulated wall-clock
    /// time and return a copy of the remaining samples for a fresh one-shot
    /// play call. The wall-clock conversion is approximate (it drifts under
    /// system load), which is the documented trade-off of this strategy.
    pub fn remaining_from_elapsed(&mut self) -> Vec<f32> {
        let target = (self.accumulated.as_secs_f64() * self.sample_rate as f64) as usize;
        self.cursor = target.min(self.buffer.len());
        self.buffer[self.cursor..].to_vec()
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            state: self.state,
            position_seconds: self.position_seconds(),
            elapsed_seconds: self.elapsed().as_secs_f64(),
            duration_seconds: self.duration_seconds(),
        }
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(SAMPLE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instants() -> (Instant, Instant) {
        let t0 = Instant::now();
        (t0, t0 + Duration::from_millis(500))
    }

    #[test]
    fn pause_banks_segment_time() {
        let (t0, t1) = instants();
        let mut t = Transport::default();
        t.play_at(vec![0.1; 24000], t0).unwrap();
        t.pause_at(t1).unwrap();

        assert_eq!(t.elapsed_at(t1), Duration::from_millis(500));
        // Paused: elapsed no longer grows.
        assert_eq!(
            t.elapsed_at(t1 + Duration::from_secs(10)),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn elapsed_accumulates_across_pause_boundaries() {
        let t0 = Instant::now();
        let mut t = Transport::default();
        t.play_at(vec![0.1; 48000], t0).unwrap();
        t.pause_at(t0 + Duration::from_millis(300)).unwrap();
        t.resume_at(t0 + Duration::from_secs(5)).unwrap();
        t.pause_at(t0 + Duration::from_secs(5) + Duration::from_millis(200))
            .unwrap();

        assert_eq!(t.elapsed_at(t0 + Duration::from_secs(60)), Duration::from_millis(500));
    }

    #[test]
    fn wall_clock_resume_cursor_matches_accumulated_time() {
        let (t0, t1) = instants();
        let mut t = Transport::default();
        t.play_at(vec![0.1; 24000], t0).unwrap();
        t.pause_at(t1).unwrap();
        t.resume_at(t1).unwrap();

        let remaining = t.remaining_from_elapsed();
        assert_eq!(t.cursor(), 12000);
        assert_eq!(remaining.len(), 12000);
    }

    #[test]
    fn wall_clock_resume_cursor_is_clamped_to_buffer_length() {
        let t0 = Instant::now();
        let mut t = Transport::default();
        t.play_at(vec![0.1; 1000], t0).unwrap();
        // Paused long after the buffer's 1000-sample duration.
        t.pause_at(t0 + Duration::from_secs(30)).unwrap();
        t.resume_at(t0 + Duration::from_secs(30)).unwrap();

        let remaining = t.remaining_from_elapsed();
        assert_eq!(t.cursor(), 1000);
        assert!(remaining.is_empty());
    }

    #[test]
    fn play_resets_accumulated_time() {
        let (t0, t1) = instants();
        let mut t = Transport::default();
        t.play_at(vec![0.0; 100], t0).unwrap();
        t.pause_at(t1).unwrap();
        t.stop();

        t.play_at(vec![0.0; 100], t1).unwrap();
        assert_eq!(t.elapsed_at(t1), Duration::ZERO);
    }
}
