//! TTS module for the Kokoro text-to-speech engine

pub mod kokoro;
pub mod session;

pub use kokoro::{get_voices, ComputeDevice, KokoroTTS, TtsError, Voice};
pub use session::{GenerationRequest, SpeechSession};
