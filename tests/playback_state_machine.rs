//! Integration tests for the playback transport state machine.
//!
//! These tests drive the transport and the playback controller through
//! their transitions without audio hardware, model files, or network
//! access — the device callback is exercised directly via `fill_block`,
//! and controller tests only take paths that never open an output stream.
//!
//! # What is tested
//!
//! - Initial Stopped state and the full §transition table
//! - Invalid events are warnings that leave state unchanged, never panics
//! - Stop idempotency: cursor, accumulated time, and buffer always reset
//! - Device-callback block fills: copy, shortfall zero-fill, cursor clamp
//! - Sample-accurate pause/resume (no loss or duplication at the boundary)
//! - The 1-second sine scenario: play → pause at 0.5 s → resume → auto-stop
//! - Controller warning events for transport-invalid commands
//! - Synchronous rejection of empty speak requests

use std::f32::consts::PI;
use std::time::Duration;

use kokoro_speak_lib::events::{self, PlaybackEvent};
use kokoro_speak_lib::playback::{
    BlockFill, PlaybackController, PlaybackState, PlaybackStrategy, Transport, TransportWarning,
    SAMPLE_RATE,
};
use kokoro_speak_lib::tts::{ComputeDevice, GenerationRequest, SpeechSession, TtsError};

// ── Helpers ────────────────────────────────────────────────────────

/// One second of silence-free sine data at 24 kHz.
fn sine_second() -> Vec<f32> {
    (0..SAMPLE_RATE as usize)
        .map(|i| (i as f32 / SAMPLE_RATE as f32 * 440.0 * 2.0 * PI).sin() * 0.5)
        .collect()
}

/// Advance playback by `samples` through the device-callback contract.
fn pump(transport: &mut Transport, samples: usize, block: usize) -> BlockFill {
    let mut out = vec![0.0f32; block];
    let mut last = BlockFill::Silence;
    for _ in 0..samples / block {
        last = transport.fill_block(&mut out);
    }
    last
}

// ── Transport transition table ─────────────────────────────────────

#[test]
fn initial_state_is_stopped() {
    let t = Transport::default();
    assert_eq!(t.state(), PlaybackState::Stopped);
    assert_eq!(t.cursor(), 0);
}

#[test]
fn play_installs_buffer_and_enters_playing() {
    let mut t = Transport::default();
    t.play(vec![0.1; 100]).unwrap();
    assert_eq!(t.state(), PlaybackState::Playing);
    assert_eq!(t.cursor(), 0);
    assert!((t.duration_seconds() - 100.0 / SAMPLE_RATE as f64).abs() < 1e-9);
}

#[test]
fn play_while_active_is_a_warning_not_a_transition() {
    let mut t = Transport::default();
    t.play(vec![0.1; 100]).unwrap();

    let err = t.play(vec![0.2; 50]).unwrap_err();
    assert_eq!(err, TransportWarning::AlreadyActive);
    assert_eq!(t.state(), PlaybackState::Playing);

    t.pause().unwrap();
    let err = t.play(vec![0.2; 50]).unwrap_err();
    assert_eq!(err, TransportWarning::AlreadyActive);
    assert_eq!(t.state(), PlaybackState::Paused);
}

#[test]
fn pause_requires_playing() {
    let mut t = Transport::default();
    assert_eq!(t.pause().unwrap_err(), TransportWarning::NotPlaying);
    assert_eq!(t.state(), PlaybackState::Stopped);

    t.play(vec![0.1; 100]).unwrap();
    t.pause().unwrap();
    assert_eq!(t.pause().unwrap_err(), TransportWarning::AlreadyPaused);
    assert_eq!(t.state(), PlaybackState::Paused);
}

#[test]
fn resume_requires_paused() {
    let mut t = Transport::default();
    assert_eq!(t.resume().unwrap_err(), TransportWarning::NotPlaying);

    t.play(vec![0.1; 100]).unwrap();
    assert_eq!(t.resume().unwrap_err(), TransportWarning::NotPaused);
    assert_eq!(t.state(), PlaybackState::Playing);
}

#[test]
fn stop_resets_everything_from_any_state_and_is_idempotent() {
    let mut t = Transport::default();
    t.play(vec![0.1; 2048]).unwrap();
    pump(&mut t, 1024, 1024);
    t.pause().unwrap();

    assert!(t.stop());
    assert_eq!(t.state(), PlaybackState::Stopped);
    assert_eq!(t.cursor(), 0);
    assert_eq!(t.elapsed(), Duration::ZERO);
    assert_eq!(t.duration_seconds(), 0.0);

    // Second stop in a row is a no-op.
    assert!(!t.stop());
    assert_eq!(t.state(), PlaybackState::Stopped);
}

// ── Device callback contract ───────────────────────────────────────

#[test]
fn fill_block_copies_and_advances() {
    let mut t = Transport::default();
    let buffer: Vec<f32> = (0..512).map(|i| i as f32).collect();
    t.play(buffer).unwrap();

    let mut out = vec![0.0f32; 256];
    assert_eq!(t.fill_block(&mut out), BlockFill::Audio);
    assert_eq!(out[0], 0.0);
    assert_eq!(out[255], 255.0);
    assert_eq!(t.cursor(), 256);
}

#[test]
fn fill_block_zero_fills_shortfall_and_clamps_cursor() {
    let mut t = Transport::default();
    t.play(vec![0.5; 300]).unwrap();

    // Request more frames than remain.
    let mut out = vec![1.0f32; 512];
    assert_eq!(t.fill_block(&mut out), BlockFill::Final);
    assert!(out[..300].iter().all(|&s| s == 0.5));
    assert!(out[300..].iter().all(|&s| s == 0.0));
    assert_eq!(t.cursor(), 300); // never past buffer length
}

#[test]
fn fill_block_is_silent_without_cursor_advance_while_paused() {
    let mut t = Transport::default();
    t.play(vec![0.5; 2048]).unwrap();
    pump(&mut t, 1024, 1024);
    t.pause().unwrap();

    let mut out = vec![1.0f32; 256];
    assert_eq!(t.fill_block(&mut out), BlockFill::Silence);
    assert!(out.iter().all(|&s| s == 0.0));
    assert_eq!(t.cursor(), 1024);
}

#[test]
fn pause_resume_is_sample_accurate() {
    let mut t = Transport::default();
    t.play(vec![0.5; 4096]).unwrap();
    pump(&mut t, 2048, 1024);

    let cursor_before_pause = t.cursor();
    t.pause().unwrap();
    pump(&mut t, 4096, 1024); // paused fills must not move the cursor
    t.resume().unwrap();

    assert_eq!(t.cursor(), cursor_before_pause);
}

// ── Full scenario ──────────────────────────────────────────────────

#[test]
fn one_second_sine_play_pause_resume_to_completion() {
    let mut t = Transport::default();
    t.play(sine_second()).unwrap();

    // Simulated 0.5 s of playback: 12000 samples in 1000-sample blocks.
    let fill = pump(&mut t, 12000, 1000);
    assert_eq!(fill, BlockFill::Audio);
    t.pause().unwrap();
    assert_eq!(t.cursor(), 12000);
    assert!((t.position_seconds() - 0.5).abs() < 1e-9);

    t.resume().unwrap();
    let fill = pump(&mut t, 12000, 1000);
    assert_eq!(fill, BlockFill::Final);
    assert_eq!(t.cursor(), 24000);

    // Device drained; control thread performs the auto-transition.
    assert!(t.finish());
    assert_eq!(t.state(), PlaybackState::Stopped);
    assert_eq!(t.cursor(), 0);
}

#[test]
fn finish_is_inert_unless_playing() {
    let mut t = Transport::default();
    assert!(!t.finish());

    t.play(vec![0.1; 100]).unwrap();
    t.pause().unwrap();
    assert!(!t.finish());
    assert_eq!(t.state(), PlaybackState::Paused);
}

// ── Controller events ──────────────────────────────────────────────

#[test]
fn pause_when_stopped_emits_a_warning_event() {
    let (tx, rx) = events::channel();
    let controller = PlaybackController::spawn(tx);

    controller.pause();

    let event = rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert!(
        matches!(event, PlaybackEvent::Warning { ref message }
            if message.contains("No audio")),
        "{event:?}"
    );
    assert_eq!(controller.state(), PlaybackState::Stopped);
}

#[test]
fn resume_when_stopped_emits_a_warning_event() {
    let (tx, rx) = events::channel();
    let controller = PlaybackController::spawn(tx);

    controller.resume();

    let event = rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert!(matches!(event, PlaybackEvent::Warning { .. }), "{event:?}");
}

#[test]
fn stop_when_stopped_is_a_silent_no_op() {
    let (tx, rx) = events::channel();
    let controller = PlaybackController::spawn(tx);

    controller.stop();
    controller.stop();

    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    assert_eq!(controller.state(), PlaybackState::Stopped);
}

// ── Generation coordinator boundary ────────────────────────────────

#[test]
fn empty_speak_request_is_rejected_synchronously() {
    let (tx, _rx) = events::channel();
    let controller = PlaybackController::spawn(tx.clone());
    let session = SpeechSession::new(controller.clone(), tx);

    let request = GenerationRequest {
        text: "   \n  ".to_string(),
        voice: "af_heart".to_string(),
        speed: 1.0,
        device: ComputeDevice::Cpu,
    };
    let err = session
        .generate_and_play(request, PlaybackStrategy::Streaming)
        .unwrap_err();

    assert!(matches!(err, TtsError::InvalidInput(_)));
    assert_eq!(controller.state(), PlaybackState::Stopped);
    assert!(!session.is_generating());
}
