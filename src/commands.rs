//! Tauri commands for the frontend to interact with the Rust backend

use std::sync::Mutex;

use tauri::{AppHandle, State};

use crate::events::{self, EventReceiver};
use crate::playback::{PlaybackController, PlaybackStatus, PlaybackStrategy};
use crate::tts::{get_voices as voice_catalog, ComputeDevice, GenerationRequest, SpeechSession, Voice};

/// Application state
pub struct AppState {
    pub controller: PlaybackController,
    pub session: SpeechSession,
    pub strategy: Mutex<PlaybackStrategy>,
    /// Taken once by the setup hook to start the event forwarder.
    events_rx: Mutex<Option<EventReceiver>>,
}

impl AppState {
    pub fn new() -> Self {
        let (tx, rx) = events::channel();
        let controller = PlaybackController::spawn(tx.clone());
        let session = SpeechSession::new(controller.clone(), tx.clone());

        Self {
            controller,
            session,
            strategy: Mutex::new(PlaybackStrategy::Streaming),
            events_rx: Mutex::new(Some(rx)),
        }
    }

    pub fn take_event_receiver(&self) -> Option<EventReceiver> {
        self.events_rx.lock().ok().and_then(|mut rx| rx.take())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Status snapshot for the UI: transport state plus generation activity.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AppStatus {
    #[serde(flatten)]
    pub playback: PlaybackStatus,
    pub generating: bool,
}

/// Generate speech for `text` and start playback.
///
/// Validation failures (empty text, busy) are returned synchronously as
/// `Err` before any background work starts; the frontend shows them as
/// warnings and re-enables the speak control when the promise settles.
#[tauri::command]
pub async fn speak(
    text: String,
    voice: String,
    speed: f32,
    device: ComputeDevice,
    state: State<'_, AppState>,
) -> Result<(), String> {
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err("Please enter some text.".to_string());
    }
    if !(0.5..=2.0).contains(&speed) {
        return Err("Speed must be between 0.5 and 2.0.".to_string());
    }

    let strategy = *state.strategy.lock().map_err(|e| e.to_string())?;
    let session = state.session.clone();
    let request = GenerationRequest {
        text,
        voice,
        speed,
        device,
    };

    // Generation is unbounded-latency work; keep it off the async runtime.
    tokio::task::spawn_blocking(move || session.generate_and_play(request, strategy))
        .await
        .map_err(|e| format!("Task error: {}", e))?
        .map_err(|e| e.to_string())
}

/// Pause playback (invalid when not playing; surfaces a warning event)
#[tauri::command]
pub fn pause_playback(state: State<'_, AppState>) -> Result<(), String> {
    state.controller.pause();
    Ok(())
}

/// Resume paused playback
#[tauri::command]
pub fn resume_playback(state: State<'_, AppState>) -> Result<(), String> {
    state.controller.resume();
    Ok(())
}

/// Stop playback and cancel any in-flight generation
#[tauri::command]
pub fn stop_playback(state: State<'_, AppState>) -> Result<(), String> {
    state.session.cancel();
    state.controller.stop();
    Ok(())
}

/// Current transport + generation status (button state, progress display)
#[tauri::command]
pub fn playback_status(state: State<'_, AppState>) -> Result<AppStatus, String> {
    Ok(AppStatus {
        playback: state.controller.status(),
        generating: state.session.is_generating(),
    })
}

/// Select the playback strategy for subsequent play requests
#[tauri::command]
pub fn set_playback_strategy(
    strategy: PlaybackStrategy,
    state: State<'_, AppState>,
) -> Result<(), String> {
    let mut current = state.strategy.lock().map_err(|e| e.to_string())?;
    *current = strategy;
    log::info!("playback strategy set to {strategy:?}");
    Ok(())
}

/// Get available TTS voices
#[tauri::command]
pub fn get_voices() -> Vec<Voice> {
    voice_catalog()
}

/// Stop playback, release the audio device, and exit the application
#[tauri::command]
pub fn request_exit(app: AppHandle, state: State<'_, AppState>) -> Result<(), String> {
    state.session.cancel();
    state.controller.stop();
    state.controller.shutdown();
    app.exit(0);
    Ok(())
}
