//! Kokoro Speak - Tauri Application
//!
//! A desktop GUI for the Kokoro text-to-speech model with
//! play / pause / resume / stop transport controls.

pub mod commands;
pub mod events;
pub mod playback;
pub mod tts;

use commands::AppState;
use tauri::{Emitter, Manager};

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .manage(AppState::new())
        .setup(|app| {
            // Forward core playback events to the webview. The UI reacts to
            // these notifications (button labels, message boxes) instead of
            // polling backend state.
            let state = app.state::<AppState>();
            if let Some(rx) = state.take_event_receiver() {
                let handle = app.handle().clone();
                std::thread::spawn(move || {
                    for event in rx.iter() {
                        if let Err(e) = handle.emit("playback-event", &event) {
                            log::warn!("failed to forward playback event: {e}");
                        }
                    }
                });
            }
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::speak,
            commands::pause_playback,
            commands::resume_playback,
            commands::stop_playback,
            commands::playback_status,
            commands::set_playback_strategy,
            commands::get_voices,
            commands::request_exit,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
