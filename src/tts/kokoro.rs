//! Kokoro TTS engine.
//!
//! Synthesis collaborator boundary: text + voice + speed in, 24 kHz mono
//! f32 samples out, produced as a lazy sequence of per-sentence chunks.
//! Currently uses a placeholder signal generator while real ONNX inference
//! is pending; the contract (chunked output, device selection, error
//! taxonomy) is the part the rest of the application is built against.

use std::thread;

use crossbeam_channel::{bounded, Receiver};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::playback::SAMPLE_RATE;

/// Maximum characters per synthesis chunk (sentence-aligned).
const CHUNK_MAX_CHARS: usize = 300;

#[derive(Error, Debug)]
pub enum TtsError {
    #[error("Requested compute device is unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("Failed to generate audio: {0}")]
    Generation(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Speech generation is already in progress.")]
    Busy,
}

/// Compute device for synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    Cpu,
    Cuda,
}

impl ComputeDevice {
    /// Check that this device is actually usable, without falling back.
    /// CUDA is only available when compiled in.
    pub fn probe(self) -> Result<Self, TtsError> {
        match self {
            Self::Cpu => Ok(Self::Cpu),
            #[cfg(feature = "cuda")]
            Self::Cuda => Ok(Self::Cuda),
            #[cfg(not(feature = "cuda"))]
            Self::Cuda => Err(TtsError::DeviceUnavailable(
                "No CUDA GPUs are available.".to_string(),
            )),
        }
    }
}

/// Voice configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voice {
    pub id: String,
    pub name: String,
    pub gender: String,
    pub accent: String,
}

/// Kokoro TTS engine bound to a compute device.
#[derive(Debug, Clone)]
pub struct KokoroTTS {
    device: ComputeDevice,
    sample_rate: u32,
}

impl KokoroTTS {
    /// Create an engine on the requested device. Fails with
    /// [`TtsError::DeviceUnavailable`] when the device cannot be used, so
    /// the caller can decide whether to fall back to CPU.
    pub fn new(device: ComputeDevice) -> Result<Self, TtsError> {
        let device = device.probe()?;
        log::info!("Kokoro engine initialized on {device:?}");
        Ok(Self {
            device,
            sample_rate: SAMPLE_RATE,
        })
    }

    pub fn device(&self) -> ComputeDevice {
        self.device
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Generate speech for one chunk of text.
    /// Placeholder: a shaped tone scaled to reading speed - real Kokoro
    /// ONNX inference will replace this.
    pub fn generate(&self, text: &str, _voice_id: &str, speed: f32) -> Result<Vec<f32>, TtsError> {
        if text.trim().is_empty() {
            return Err(TtsError::InvalidInput("Text cannot be empty".to_string()));
        }
        let speed = speed.clamp(0.5, 2.0);

        let duration_seconds = (text.len() as f32 / 15.0) / speed;
        let num_samples = (duration_seconds * self.sample_rate as f32) as usize;

        let frequency = 440.0;
        let audio: Vec<f32> = (0..num_samples)
            .map(|i| {
                let t = i as f32 / self.sample_rate as f32;
                let envelope = if t < 0.1 {
                    t / 0.1
                } else if t > duration_seconds - 0.1 {
                    (duration_seconds - t) / 0.1
                } else {
                    1.0
                };
                (t * frequency * 2.0 * std::f32::consts::PI).sin() * 0.3 * envelope
            })
            .collect();

        Ok(audio)
    }

    /// Synthesize text as a lazy sequence of audio chunks.
    ///
    /// A producer thread splits the text at sentence boundaries and sends
    /// one sample chunk per piece over a bounded channel. Dropping the
    /// receiver halts the producer within one chunk, which is how the
    /// coordinator cancels an in-flight generation.
    pub fn synthesize_streaming(
        &self,
        text: String,
        voice: String,
        speed: f32,
    ) -> Receiver<Result<Vec<f32>, TtsError>> {
        let (tx, rx) = bounded::<Result<Vec<f32>, TtsError>>(32);
        let engine = self.clone();

        thread::spawn(move || {
            for chunk in split_into_chunks(&text, CHUNK_MAX_CHARS) {
                let result = engine.generate(&chunk, &voice, speed);
                let failed = result.is_err();
                if tx.send(result).is_err() {
                    log::debug!("chunk receiver dropped, stopping synthesis");
                    return;
                }
                if failed {
                    return;
                }
            }
            log::debug!("synthesis complete");
        });

        rx
    }
}

/// Split text into sentence-aligned chunks of at most `max_chars`.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let sentences: Vec<&str> = text.split_inclusive(&['.', '!', '?'][..]).collect();

    let mut current_chunk = String::new();

    for sentence in sentences {
        if current_chunk.len() + sentence.len() > max_chars && !current_chunk.is_empty() {
            chunks.push(current_chunk.trim().to_string());
            current_chunk = sentence.to_string();
        } else {
            current_chunk.push_str(sentence);
        }
    }

    if !current_chunk.trim().is_empty() {
        chunks.push(current_chunk.trim().to_string());
    }

    chunks
}

pub fn get_voices() -> Vec<Voice> {
    let catalog = [
        ("af_heart", "Heart", "female", "american"),
        ("af_bella", "Bella", "female", "american"),
        ("af_jessica", "Jessica", "female", "american"),
        ("af_nicole", "Nicole", "female", "american"),
        ("af_sarah", "Sarah", "female", "american"),
        ("af_sky", "Sky", "female", "american"),
        ("am_adam", "Adam", "male", "american"),
        ("am_michael", "Michael", "male", "american"),
        ("bf_emma", "Emma", "female", "british"),
        ("bf_isabella", "Isabella", "female", "british"),
        ("bm_george", "George", "male", "british"),
        ("bm_lewis", "Lewis", "male", "british"),
    ];

    catalog
        .into_iter()
        .map(|(id, name, gender, accent)| Voice {
            id: id.to_string(),
            name: name.to_string(),
            gender: gender.to_string(),
            accent: accent.to_string(),
        })
        .collect()
}
