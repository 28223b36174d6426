use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::connection::manager::ConnectionManager;
use crate::models::button::{ButtonEvent, TapCount};
use crate::models::config::CaptureConfig;
use crate::models::error::{CaptureError, ConnectionError};
use crate::models::events::{CaptureEvent, ConnectionEvent};
use crate::models::recording::Recording;
use crate::models::state::{CaptureState, ConnectionState};
use crate::processing::assembler::AudioFrameAssembler;
use crate::storage::{metadata, recording_store};
use crate::traits::device_connection::DeviceConnection;
use crate::traits::sink::RecordingSink;

const EVENT_BUS_CAPACITY: usize = 64;
const COMMAND_CHANNEL_CAPACITY: usize = 4;

/// Button-driven capture sessions over the active device.
///
/// `start_listening` subscribes to the device's button stream and spawns a
/// session task; from then on any tap toggles capture. One tap opens a
/// capture, the next closes it and persists the WAV, and a mid-capture link
/// loss discards the buffer and returns to `Idle`. The session ends only
/// through `stop_listening`, which closes any open capture through the
/// normal stop path first.
pub struct CaptureOrchestrator {
    manager: Arc<ConnectionManager>,
    sink: Arc<dyn RecordingSink>,
    config: CaptureConfig,
    events: broadcast::Sender<CaptureEvent>,
    state: Arc<Mutex<CaptureState>>,
    commands: Mutex<Option<mpsc::Sender<SessionCommand>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

enum SessionCommand {
    StopListening,
}

impl CaptureOrchestrator {
    pub fn new(
        manager: Arc<ConnectionManager>,
        sink: Arc<dyn RecordingSink>,
        config: CaptureConfig,
    ) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::InvalidState)?;
        let (events, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Ok(Self {
            manager,
            sink,
            config,
            events,
            state: Arc::new(Mutex::new(CaptureState::Idle)),
            commands: Mutex::new(None),
            task: Mutex::new(None),
        })
    }

    pub fn state(&self) -> CaptureState {
        *self.state.lock()
    }

    pub fn is_listening(&self) -> bool {
        self.commands.lock().is_some()
    }

    pub fn events(&self) -> broadcast::Receiver<CaptureEvent> {
        self.events.subscribe()
    }

    /// Subscribes to the active device's button stream and starts the
    /// session task. The device must already be connected, and it must
    /// expose a button: a wearable without one cannot drive captures.
    pub async fn start_listening(&self) -> Result<(), CaptureError> {
        if self.is_listening() {
            return Err(CaptureError::InvalidState("already listening".into()));
        }
        let connection = self
            .manager
            .active_connection()
            .ok_or(ConnectionError::NotConnected)?;

        let button_rx = match connection.subscribe_button().await {
            Ok(Some(rx)) => rx,
            Ok(None) => {
                return Err(CaptureError::SubscriptionFailed(
                    "device has no button service".into(),
                ))
            }
            Err(e) => return Err(CaptureError::SubscriptionFailed(e.to_string())),
        };

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let session = SessionLoop {
            connection,
            sink: Arc::clone(&self.sink),
            config: self.config.clone(),
            events: self.events.clone(),
            state: Arc::clone(&self.state),
            conn_events: self.manager.events(),
            button_rx: Some(button_rx),
            capture: None,
        };
        let task = tokio::spawn(session.run(cmd_rx));

        *self.commands.lock() = Some(cmd_tx);
        *self.task.lock() = Some(task);
        info!("listening for button taps");
        Ok(())
    }

    /// Ends the session. An open capture is closed and persisted as if a
    /// closing tap had arrived; its recording keeps the opening tap count.
    /// Calling this while not listening is a no-op.
    pub async fn stop_listening(&self) {
        let Some(commands) = self.commands.lock().take() else {
            return;
        };
        let _ = commands.send(SessionCommand::StopListening).await;
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("capture session task ended abnormally: {e}");
            }
        }
    }
}

struct ActiveCapture {
    assembler: AudioFrameAssembler,
    audio_rx: mpsc::Receiver<Vec<u8>>,
    opening_taps: TapCount,
    started_at: DateTime<Utc>,
}

/// Per-session state, owned by the spawned session task.
struct SessionLoop {
    connection: Arc<dyn DeviceConnection>,
    sink: Arc<dyn RecordingSink>,
    config: CaptureConfig,
    events: broadcast::Sender<CaptureEvent>,
    state: Arc<Mutex<CaptureState>>,
    conn_events: broadcast::Receiver<ConnectionEvent>,
    button_rx: Option<mpsc::Receiver<ButtonEvent>>,
    capture: Option<ActiveCapture>,
}

enum LoopEvent {
    Command(Option<SessionCommand>),
    Connection(Result<ConnectionEvent, broadcast::error::RecvError>),
    Button(Option<ButtonEvent>),
    Audio(Option<Vec<u8>>),
}

impl SessionLoop {
    async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        loop {
            let event = tokio::select! {
                cmd = commands.recv() => LoopEvent::Command(cmd),
                conn = self.conn_events.recv() => LoopEvent::Connection(conn),
                tap = Self::next_button(&mut self.button_rx) => LoopEvent::Button(tap),
                packet = Self::next_packet(&mut self.capture) => LoopEvent::Audio(packet),
            };
            match event {
                LoopEvent::Command(Some(SessionCommand::StopListening))
                | LoopEvent::Command(None) => {
                    self.shutdown().await;
                    return;
                }
                LoopEvent::Button(Some(tap)) => self.handle_tap(tap).await,
                LoopEvent::Button(None) => {
                    self.button_rx = None;
                    self.abandon_capture("button stream ended");
                }
                LoopEvent::Connection(Ok(event)) => self.handle_connection_event(event),
                LoopEvent::Connection(Err(broadcast::error::RecvError::Lagged(missed))) => {
                    warn!("connection event stream lagged by {missed}");
                }
                LoopEvent::Connection(Err(broadcast::error::RecvError::Closed)) => {
                    self.abandon_capture("connection event stream closed");
                }
                LoopEvent::Audio(Some(packet)) => {
                    if let Some(capture) = &mut self.capture {
                        capture.assembler.push_frame(&packet);
                    }
                }
                LoopEvent::Audio(None) => self.abandon_capture("audio stream ended"),
            }
        }
    }

    async fn next_button(rx: &mut Option<mpsc::Receiver<ButtonEvent>>) -> Option<ButtonEvent> {
        match rx {
            Some(rx) => rx.recv().await,
            None => std::future::pending().await,
        }
    }

    async fn next_packet(capture: &mut Option<ActiveCapture>) -> Option<Vec<u8>> {
        match capture {
            Some(capture) => capture.audio_rx.recv().await,
            None => std::future::pending().await,
        }
    }

    async fn handle_tap(&mut self, tap: ButtonEvent) {
        if self.capture.is_some() {
            self.stop_capture(Some(tap.taps)).await;
        } else {
            self.start_capture(tap.taps).await;
        }
    }

    fn handle_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::ConnectionLost { device_id }
                if device_id == self.connection.device_id() =>
            {
                self.abandon_capture("connection lost");
            }
            ConnectionEvent::StateChanged {
                device_id,
                state: ConnectionState::Disconnected,
            } if device_id == self.connection.device_id() => {
                self.abandon_capture("device disconnected");
            }
            _ => {}
        }
    }

    async fn start_capture(&mut self, taps: TapCount) {
        let codec = match self.connection.audio_codec().await {
            Ok(codec) => codec,
            Err(e) => {
                self.status(format!("cannot start capture: {e}"));
                return;
            }
        };

        let decoder = if codec.is_compressed() {
            let Some(factory) = self.config.decoder_factory.as_ref() else {
                self.status(format!("no decoder available for {codec:?}"));
                return;
            };
            match factory.create() {
                Ok(decoder) => Some(decoder),
                Err(e) => {
                    self.status(format!("decoder init failed: {e}"));
                    return;
                }
            }
        } else {
            None
        };

        let assembler = match AudioFrameAssembler::new(codec, decoder) {
            Ok(assembler) => assembler,
            Err(e) => {
                self.status(format!("cannot start capture: {e}"));
                return;
            }
        };

        let audio_rx = match self.connection.subscribe_audio().await {
            Ok(rx) => rx,
            Err(e) => {
                self.status(format!("audio subscription failed: {e}"));
                return;
            }
        };

        self.capture = Some(ActiveCapture {
            assembler,
            audio_rx,
            opening_taps: taps,
            started_at: Utc::now(),
        });
        self.set_state(CaptureState::Capturing);
        info!("capture started ({:?}, {:?} tap)", codec, taps);
    }

    /// Normal stop path. `closing` is the tap that ended the capture, or
    /// `None` when the session is being torn down, in which case the
    /// recording keeps the opening tap count.
    async fn stop_capture(&mut self, closing: Option<TapCount>) {
        let Some(capture) = self.capture.take() else {
            return;
        };
        if let Err(e) = self.connection.unsubscribe_audio().await {
            warn!("audio unsubscribe failed: {e}");
        }
        self.set_state(CaptureState::Idle);

        let stats = capture.assembler.stats();
        if stats.frames_lost > 0 {
            warn!(
                "{} frames lost across {} gaps during capture",
                stats.frames_lost, stats.sequence_gaps
            );
        }

        if !capture.assembler.has_frames() {
            self.status("no audio captured".to_string());
            return;
        }

        let taps = closing.unwrap_or(capture.opening_taps);
        let wav = capture.assembler.build_wav();
        let duration = capture.assembler.duration_secs();
        let device_id = self.connection.device_id().to_string();
        let output_dir = self.config.output_directory.clone();
        let sink = Arc::clone(&self.sink);
        let events = self.events.clone();
        let started_at = capture.started_at;

        // File and sink I/O run off the loop so a slow disk cannot delay
        // the next tap.
        tokio::spawn(async move {
            let written = match recording_store::write_recording(&output_dir, &wav).await {
                Ok(written) => written,
                Err(e) => {
                    let _ = events
                        .send(CaptureEvent::Status(format!("failed to persist recording: {e}")));
                    return;
                }
            };
            let recording = Recording::new(
                &written.path,
                started_at,
                duration,
                written.size_bytes,
                &device_id,
                taps,
                &written.checksum,
            );
            if let Err(e) = metadata::write_metadata(&recording, &written.path).await {
                warn!("sidecar write failed: {e}");
            }
            match sink.persist(&recording).await {
                Ok(()) => {
                    info!(
                        "recording saved: {} ({:.2}s)",
                        recording.file_path, recording.duration_secs
                    );
                    let _ = events.send(CaptureEvent::RecordingSaved(recording));
                }
                Err(e) => {
                    let _ = events
                        .send(CaptureEvent::Status(format!("failed to persist recording: {e}")));
                }
            }
        });

        if stats.frames_lost > 0 {
            self.status(format!("{} audio frames lost during capture", stats.frames_lost));
        }
    }

    /// Drops an in-flight capture without persisting anything.
    fn abandon_capture(&mut self, reason: &str) {
        if self.capture.take().is_none() {
            return;
        }
        self.set_state(CaptureState::Idle);
        warn!("capture abandoned: {reason}");
        self.status(format!("capture abandoned: {reason}"));
    }

    async fn shutdown(&mut self) {
        self.stop_capture(None).await;
        if let Err(e) = self.connection.unsubscribe_button().await {
            warn!("button unsubscribe failed: {e}");
        }
        info!("stopped listening");
    }

    fn set_state(&self, next: CaptureState) {
        let mut state = self.state.lock();
        if *state != next {
            *state = next;
            let _ = self.events.send(CaptureEvent::StateChanged(next));
        }
    }

    fn status(&self, message: String) {
        let _ = self.events.send(CaptureEvent::Status(message));
    }
}
