//! Playback controller and audio thread.
//!
//! Runs a dedicated audio thread that exclusively owns the rodio
//! OutputStream/Sink (the stream is not `Send`), driven by commands over an
//! mpsc channel. The output device is opened on the Stopped→Playing
//! transition and dropped on every transition back into Stopped, including
//! natural completion and shutdown.

use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::{EventSender, PlaybackEvent};
use crate::playback::source::TransportSource;
use crate::playback::transport::{PlaybackState, PlaybackStatus, Transport, TransportWarning};

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to create audio output stream: {0}")]
    Stream(String),
    #[error("Playback error: {0}")]
    Playback(String),
}

/// How audio reaches the output device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStrategy {
    /// One continuous sink fed block-by-block from the transport; pause
    /// mutes without closing the device. Sample-accurate resume.
    Streaming,
    /// Each resume issues a fresh bounded play call from a cursor derived
    /// from accumulated wall-clock time. Approximate resume (drifts under
    /// system load) but needs no live callback.
    Segment,
}

#[derive(Debug)]
enum PlaybackCmd {
    Play {
        samples: Vec<f32>,
        strategy: PlaybackStrategy,
    },
    Pause,
    Resume,
    Stop,
    Shutdown,
}

/// Handle to the audio thread. Cheap to clone; all clones drive the same
/// transport.
#[derive(Clone)]
pub struct PlaybackController {
    tx: mpsc::Sender<PlaybackCmd>,
    transport: Arc<Mutex<Transport>>,
}

/// Mutex poisoning in the audio path is recovered rather than propagated:
/// the transport record stays valid even if a holder panicked.
fn lock_transport(transport: &Mutex<Transport>) -> MutexGuard<'_, Transport> {
    transport.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PlaybackController {
    pub fn spawn(events: EventSender) -> Self {
        let (tx, rx) = mpsc::channel::<PlaybackCmd>();
        let transport = Arc::new(Mutex::new(Transport::default()));

        let transport_for_thread = Arc::clone(&transport);
        thread::spawn(move || audio_thread_main(rx, transport_for_thread, events));

        Self { tx, transport }
    }

    /// Install a buffer and start output (Stopped → Playing).
    pub fn play(&self, samples: Vec<f32>, strategy: PlaybackStrategy) {
        let _ = self.tx.send(PlaybackCmd::Play { samples, strategy });
    }

    pub fn pause(&self) {
        let _ = self.tx.send(PlaybackCmd::Pause);
    }

    pub fn resume(&self) {
        let _ = self.tx.send(PlaybackCmd::Resume);
    }

    pub fn stop(&self) {
        let _ = self.tx.send(PlaybackCmd::Stop);
    }

    /// Stop playback, release the device, and end the audio thread.
    pub fn shutdown(&self) {
        let _ = self.tx.send(PlaybackCmd::Shutdown);
    }

    pub fn state(&self) -> PlaybackState {
        lock_transport(&self.transport).state()
    }

    pub fn status(&self) -> PlaybackStatus {
        lock_transport(&self.transport).status()
    }
}

/// Output device resources. Held only while the transport is not Stopped;
/// dropping this closes the stream.
struct OutputDevice {
    _stream: OutputStream,
    sink: Sink,
}

fn open_device() -> Result<OutputDevice, AudioError> {
    let (stream, handle) =
        OutputStream::try_default().map_err(|e| AudioError::Stream(e.to_string()))?;
    let sink = Sink::try_new(&handle).map_err(|e| AudioError::Playback(e.to_string()))?;
    Ok(OutputDevice {
        _stream: stream,
        sink,
    })
}

fn emit(events: &EventSender, event: PlaybackEvent) {
    let _ = events.send(event);
}

fn emit_warning(events: &EventSender, warning: &TransportWarning) {
    log::warn!("ignored transport event: {warning}");
    emit(
        events,
        PlaybackEvent::Warning {
            message: warning.to_string(),
        },
    );
}

fn audio_thread_main(
    rx: mpsc::Receiver<PlaybackCmd>,
    transport: Arc<Mutex<Transport>>,
    events: EventSender,
) {
    let mut device: Option<OutputDevice> = None;
    let mut strategy = PlaybackStrategy::Streaming;

    loop {
        // Poll with a timeout so completion detection keeps running.
        let cmd = match rx.recv_timeout(Duration::from_millis(25)) {
            Ok(cmd) => Some(cmd),
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };

        if let Some(cmd) = cmd {
            match cmd {
                PlaybackCmd::Play {
                    samples,
                    strategy: requested,
                } => {
                    let sample_rate;
                    let installed = {
                        let mut t = lock_transport(&transport);
                        sample_rate = t.sample_rate();
                        t.play(samples)
                    };
                    match installed {
                        Ok(()) => {
                            strategy = requested;
                            match start_output(&transport, sample_rate, strategy) {
                                Ok(dev) => {
                                    device = Some(dev);
                                    log::info!("playback started ({strategy:?})");
                                    emit(
                                        &events,
                                        PlaybackEvent::StateChanged {
                                            state: PlaybackState::Playing,
                                        },
                                    );
                                }
                                Err(e) => {
                                    // Failure leaves the transport Stopped and
                                    // no device held.
                                    lock_transport(&transport).stop();
                                    log::error!("failed to start playback: {e}");
                                    emit(
                                        &events,
                                        PlaybackEvent::Error {
                                            message: e.to_string(),
                                        },
                                    );
                                }
                            }
                        }
                        Err(warning) => emit_warning(&events, &warning),
                    }
                }

                PlaybackCmd::Pause => match lock_transport(&transport).pause() {
                    Ok(()) => {
                        if strategy == PlaybackStrategy::Segment {
                            // Bounded play call: pause stops the call outright.
                            device = None;
                        }
                        emit(
                            &events,
                            PlaybackEvent::StateChanged {
                                state: PlaybackState::Paused,
                            },
                        );
                    }
                    Err(warning) => emit_warning(&events, &warning),
                },

                PlaybackCmd::Resume => {
                    let resumed = {
                        let mut t = lock_transport(&transport);
                        let sample_rate = t.sample_rate();
                        t.resume().map(|()| match strategy {
                            PlaybackStrategy::Streaming => None,
                            // Cursor and remaining samples are taken under the
                            // same lock as the transition.
                            PlaybackStrategy::Segment => {
                                Some((t.remaining_from_elapsed(), sample_rate))
                            }
                        })
                    };
                    match resumed {
                        Ok(segment) => {
                            if let Some((remaining, sample_rate)) = segment {
                                match open_device() {
                                    Ok(dev) => {
                                        dev.sink.append(SamplesBuffer::new(
                                            1,
                                            sample_rate,
                                            remaining,
                                        ));
                                        device = Some(dev);
                                    }
                                    Err(e) => {
                                        lock_transport(&transport).stop();
                                        device = None;
                                        log::error!("failed to resume playback: {e}");
                                        emit(
                                            &events,
                                            PlaybackEvent::Error {
                                                message: e.to_string(),
                                            },
                                        );
                                        continue;
                                    }
                                }
                            }
                            emit(
                                &events,
                                PlaybackEvent::StateChanged {
                                    state: PlaybackState::Playing,
                                },
                            );
                        }
                        Err(warning) => emit_warning(&events, &warning),
                    }
                }

                PlaybackCmd::Stop => {
                    let changed = lock_transport(&transport).stop();
                    device = None;
                    if changed {
                        log::info!("playback stopped");
                        emit(
                            &events,
                            PlaybackEvent::StateChanged {
                                state: PlaybackState::Stopped,
                            },
                        );
                    }
                }

                PlaybackCmd::Shutdown => {
                    lock_transport(&transport).stop();
                    drop(device.take());
                    break;
                }
            }
        }

        // Completion detection: the sink drains when the streaming source
        // yields its final block (or the one-shot segment ends). The device
        // is closed here, on the control thread, never inside the callback.
        if device.as_ref().is_some_and(|d| d.sink.empty()) {
            let finished = lock_transport(&transport).finish();
            if finished {
                device = None;
                log::info!("playback finished");
                emit(&events, PlaybackEvent::Finished);
                emit(
                    &events,
                    PlaybackEvent::StateChanged {
                        state: PlaybackState::Stopped,
                    },
                );
            }
        }
    }

    log::debug!("audio thread exiting");
}

fn start_output(
    transport: &Arc<Mutex<Transport>>,
    sample_rate: u32,
    strategy: PlaybackStrategy,
) -> Result<OutputDevice, AudioError> {
    let device = open_device()?;
    match strategy {
        PlaybackStrategy::Streaming => {
            device
                .sink
                .append(TransportSource::new(Arc::clone(transport), sample_rate));
        }
        PlaybackStrategy::Segment => {
            let samples = {
                let mut t = lock_transport(transport);
                t.remaining_from_elapsed()
            };
            device.sink.append(SamplesBuffer::new(1, sample_rate, samples));
        }
    }
    Ok(device)
}
