//! Generation coordinator.
//!
//! Runs synthesis off the UI thread, accumulates the lazy chunk stream into
//! one sample buffer, and hands the finished buffer to the playback
//! controller. At most one generation is in flight; a second request is
//! rejected, not queued. Stop cancels an in-flight generation cooperatively
//! between chunks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::events::{EventSender, PlaybackEvent};
use crate::playback::{PlaybackController, PlaybackState, PlaybackStrategy};
use crate::tts::kokoro::{ComputeDevice, KokoroTTS, TtsError};

/// Snapshot of the speak form at the moment the request was made.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub text: String,
    pub voice: String,
    pub speed: f32,
    pub device: ComputeDevice,
}

/// Coordinates one background generation at a time and feeds the playback
/// controller. Cheap to clone; clones share the in-flight and cancel flags.
#[derive(Clone)]
pub struct SpeechSession {
    controller: PlaybackController,
    events: EventSender,
    in_flight: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
}

impl SpeechSession {
    pub fn new(controller: PlaybackController, events: EventSender) -> Self {
        Self {
            controller,
            events,
            in_flight: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_generating(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Request cancellation of an in-flight generation. Observed between
    /// chunks, so generation halts within one chunk.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Claim the single in-flight slot. Returns `false` if a generation is
    /// already running.
    fn try_begin(&self) -> bool {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Synthesize `request` and start playback. Blocking; the command layer
    /// runs this on a blocking task so the UI stays responsive.
    ///
    /// Every exit path clears the in-flight flag, which is what re-enables
    /// the UI's speak control regardless of success, failure, or stop.
    pub fn generate_and_play(
        &self,
        request: GenerationRequest,
        strategy: PlaybackStrategy,
    ) -> Result<(), TtsError> {
        if request.text.trim().is_empty() {
            // Rejected synchronously; no background work is started.
            return Err(TtsError::InvalidInput(
                "Please enter some text.".to_string(),
            ));
        }
        if self.controller.state() != PlaybackState::Stopped {
            return Err(TtsError::InvalidInput(
                "Audio is already playing.".to_string(),
            ));
        }
        if !self.try_begin() {
            return Err(TtsError::Busy);
        }

        self.cancel.store(false, Ordering::SeqCst);
        let result = self.run(request, strategy);
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    fn run(
        &self,
        request: GenerationRequest,
        strategy: PlaybackStrategy,
    ) -> Result<(), TtsError> {
        let engine = self.engine_with_fallback(request.device)?;

        let rx = engine.synthesize_streaming(request.text, request.voice, request.speed);

        let mut samples: Vec<f32> = Vec::new();
        let mut cancelled = false;
        for chunk in rx.iter() {
            // Checked between chunks; dropping `rx` below halts the producer.
            if self.cancel.load(Ordering::SeqCst) {
                cancelled = true;
                break;
            }
            samples.extend(chunk?);
        }
        drop(rx);

        if cancelled || self.cancel.load(Ordering::SeqCst) {
            log::info!("generation cancelled before playback");
            return Ok(());
        }
        if samples.is_empty() {
            return Err(TtsError::Generation(
                "synthesis produced no audio".to_string(),
            ));
        }

        log::info!(
            "generation complete: {} samples ({:.1}s audio)",
            samples.len(),
            samples.len() as f64 / f64::from(engine.sample_rate())
        );
        self.controller.play(samples, strategy);
        Ok(())
    }

    /// Create the engine on the requested device, falling back to CPU (with
    /// a user-visible warning) when the accelerator is unavailable.
    fn engine_with_fallback(&self, device: ComputeDevice) -> Result<KokoroTTS, TtsError> {
        match KokoroTTS::new(device) {
            Ok(engine) => Ok(engine),
            Err(TtsError::DeviceUnavailable(reason)) if device != ComputeDevice::Cpu => {
                log::warn!("{reason} Switching to CPU.");
                let _ = self.events.send(PlaybackEvent::Warning {
                    message: format!("{reason} Switching to CPU."),
                });
                KokoroTTS::new(ComputeDevice::Cpu)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events;
    use std::time::Duration;

    fn session() -> (SpeechSession, events::EventReceiver) {
        let (tx, rx) = events::channel();
        let controller = PlaybackController::spawn(tx.clone());
        (SpeechSession::new(controller, tx), rx)
    }

    fn request(text: &str) -> GenerationRequest {
        GenerationRequest {
            text: text.to_string(),
            voice: "af_heart".to_string(),
            speed: 1.0,
            device: ComputeDevice::Cpu,
        }
    }

    #[test]
    fn in_flight_slot_is_exclusive() {
        let (s, _rx) = session();
        assert!(s.try_begin());
        assert!(!s.try_begin());

        s.in_flight.store(false, Ordering::SeqCst);
        assert!(s.try_begin());
    }

    #[test]
    fn second_speak_is_rejected_not_queued() {
        let (s, _rx) = session();
        s.in_flight.store(true, Ordering::SeqCst);

        let err = s
            .generate_and_play(request("Hello."), PlaybackStrategy::Streaming)
            .unwrap_err();
        assert!(matches!(err, TtsError::Busy));
    }

    #[test]
    fn stop_during_generation_never_enters_playback() {
        let (s, rx) = session();
        s.cancel.store(true, Ordering::SeqCst);

        // `run` observes the stop flag on the first chunk boundary.
        s.run(request("One sentence. Two sentences. Three sentences."), PlaybackStrategy::Streaming)
            .unwrap();

        assert_eq!(s.controller.state(), PlaybackState::Stopped);

        // No StateChanged(Playing) may have been emitted.
        std::thread::sleep(Duration::from_millis(100));
        while let Ok(event) = rx.try_recv() {
            assert!(
                !matches!(
                    event,
                    PlaybackEvent::StateChanged {
                        state: PlaybackState::Playing
                    }
                ),
                "playback started despite stop: {event:?}"
            );
        }
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn unavailable_accelerator_falls_back_to_cpu_with_warning() {
        let (s, rx) = session();

        let engine = s.engine_with_fallback(ComputeDevice::Cuda).unwrap();
        assert_eq!(engine.device(), ComputeDevice::Cpu);

        let event = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(matches!(event, PlaybackEvent::Warning { .. }), "{event:?}");
    }
}
