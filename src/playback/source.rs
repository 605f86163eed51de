//! Streaming device callback for rodio.
//!
//! `TransportSource` is the per-block fill callback of the streaming
//! playback strategy: rodio's output thread pulls samples from it
//! continuously, and every block is filled from the shared transport.
//! Pause mutes (silence blocks, cursor untouched) without closing the
//! device, so resume has no restart latency.

use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;

use rodio::Source;

use crate::playback::transport::{BlockFill, Transport};

/// Samples pulled from the transport per lock acquisition.
const BLOCK_SIZE: usize = 1024;

pub struct TransportSource {
    shared: Arc<Mutex<Transport>>,
    block: Vec<f32>,
    pos: usize,
    sample_rate: u32,
    done: bool,
}

impl TransportSource {
    pub fn new(shared: Arc<Mutex<Transport>>, sample_rate: u32) -> Self {
        Self {
            shared,
            block: vec![0.0; BLOCK_SIZE],
            pos: BLOCK_SIZE, // force a refill on the first pull
            sample_rate,
            done: false,
        }
    }

    /// Refill the local block from the transport.
    ///
    /// Uses `try_lock` so the audio callback never blocks on the control or
    /// generation threads; on contention the block is silence and the cursor
    /// is left alone, which at one block is inaudible and never tears the
    /// cursor/buffer snapshot.
    fn refill(&mut self) {
        let fill = match self.shared.try_lock() {
            Ok(mut transport) => transport.fill_block(&mut self.block),
            Err(TryLockError::WouldBlock) => {
                self.block.fill(0.0);
                BlockFill::Silence
            }
            Err(TryLockError::Poisoned(e)) => e.into_inner().fill_block(&mut self.block),
        };

        match fill {
            BlockFill::Audio | BlockFill::Silence => {}
            // Yield the final (zero-padded) block, then end.
            BlockFill::Final => self.done = true,
            BlockFill::Ended => {
                self.done = true;
                self.block.clear();
            }
        }
        self.pos = 0;
    }
}

impl Iterator for TransportSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.pos >= self.block.len() {
            if self.done {
                return None;
            }
            self.refill();
            if self.block.is_empty() {
                return None;
            }
        }
        let sample = self.block[self.pos];
        self.pos += 1;
        Some(sample)
    }
}

impl Source for TransportSource {
    fn current_frame_len(&self) -> Option<usize> {
        None // length depends on live transport state
    }

    fn channels(&self) -> u16 {
        1 // Kokoro outputs mono
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
