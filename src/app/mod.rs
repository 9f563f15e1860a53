// SPDX-License-Identifier: MPL-2.0

//! Capture controller
//!
//! The controller owns the capture session through a serial worker thread,
//! mediates permission state, switches between photo and video
//! configurations, and forwards capture results to the asset store.
//!
//! # Architecture
//!
//! - `state`: Setup, mode and capture state types, messages, UI updates
//! - `session`: Setup gate and the serial session worker
//! - `update`: Message dispatch
//! - `handlers`: Message handlers by domain (permissions, mode, capture)
//!
//! # Execution contexts
//!
//! ```text
//!  UI ──ControllerHandle──▶ ┌────────────────────┐ ──UiUpdate──▶ UI
//!                           │ controller task    │
//!  pipeline ──CaptureEvent─▶│ (owns all control  │──spawn──▶ asset store
//!                           │  state)            │
//!                           └─────────┬──────────┘
//!                                     │ SessionCommand
//!                                     ▼
//!                           ┌────────────────────┐
//!                           │ session-queue      │──▶ CapturePipeline
//!                           │ thread (gated)     │
//!                           └────────────────────┘
//! ```

mod handlers;
mod session;
mod state;
mod update;

pub use session::{SessionCommand, SetupGate};
pub use state::{
    CaptureState, Controls, DeviceBindings, Message, SetupNotice, SetupResult, ShootingMode,
    UiUpdate,
};

use crate::backends::camera::{
    CaptureEvent, CapturePipeline, CaptureSink, DeviceDirectory, PreviewSender, get_backend,
};
use crate::backends::cues::{CuePlayer, cue_player};
use crate::backends::permissions::PermissionAuthority;
use crate::config::Config;
use crate::errors::AppResult;
use crate::pipelines::photo::EncodingQuality;
use crate::storage::{AssetStore, LibraryStore};
use session::{Session, SessionQueue};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Platform services the controller drives
pub struct Collaborators {
    pub permissions: Arc<dyn PermissionAuthority>,
    pub devices: Arc<dyn DeviceDirectory>,
    /// Moved onto the session worker
    pub pipeline: Box<dyn CapturePipeline>,
    pub store: Arc<dyn AssetStore>,
    pub cues: Arc<dyn CuePlayer>,
    /// Display surface for preview frames
    pub preview: Option<PreviewSender>,
}

impl Collaborators {
    /// Backend, library and cues selected by the configuration
    pub fn from_config(
        config: &Config,
        permissions: Arc<dyn PermissionAuthority>,
        preview: Option<PreviewSender>,
    ) -> AppResult<Self> {
        let backend = get_backend(config.backend, config.bitrate_preset)?;
        info!(backend = %config.backend, "Camera backend ready");
        Ok(Self {
            store: Arc::new(LibraryStore::new(
                config.photo_dir(),
                config.video_dir(),
                permissions.clone(),
            )),
            permissions,
            devices: backend.directory,
            pipeline: backend.pipeline,
            cues: cue_player(config.recording_cues),
            preview,
        })
    }
}

/// Tunables taken from the configuration
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Where in-progress recordings are written
    pub temp_dir: PathBuf,
    pub photo_quality: EncodingQuality,
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            temp_dir: config.temp_dir(),
            photo_quality: config.photo_quality,
        }
    }
}

/// Sends user actions to a running controller
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<Message>,
}

impl ControllerHandle {
    pub fn shutter(&self) {
        self.send(Message::Shutter);
    }

    pub fn select_mode(&self, mode: ShootingMode) {
        self.send(Message::SelectMode(mode));
    }

    /// Ask the controller to stop; an active recording is stopped and saved first
    pub fn shutdown(&self) {
        self.send(Message::Shutdown);
    }

    fn send(&self, message: Message) {
        if self.tx.send(message).is_err() {
            debug!("Controller has exited, dropping action");
        }
    }
}

/// Camera capture controller
pub struct CaptureController {
    // ===== Collaborators =====
    permissions: Arc<dyn PermissionAuthority>,
    store: Arc<dyn AssetStore>,
    cues: Arc<dyn CuePlayer>,
    settings: ControllerSettings,
    movie_extension: &'static str,

    // ===== Session worker =====
    gate: SetupGate,
    queue: SessionQueue,
    worker: Option<JoinHandle<()>>,

    // ===== Controller state =====
    mode: ShootingMode,
    capture_state: CaptureState,
    controls: Controls,
    /// Encoded still held between the two photo callbacks
    pending_photo: Option<Vec<u8>>,
    photo_in_flight: bool,
    /// Temp file of the recording in progress or being saved
    active_recording: Option<PathBuf>,
    setup_result: Option<SetupResult>,
    exit_requested: bool,

    // ===== Channels =====
    ui: mpsc::UnboundedSender<UiUpdate>,
    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
    capture_tx: CaptureSink,
    capture_rx: mpsc::UnboundedReceiver<CaptureEvent>,
}

impl CaptureController {
    /// Create the controller and its session worker
    ///
    /// The worker starts immediately but stays suspended until the camera
    /// permission outcome is known.
    pub fn new(
        collaborators: Collaborators,
        settings: ControllerSettings,
        ui: mpsc::UnboundedSender<UiUpdate>,
    ) -> AppResult<Self> {
        let Collaborators {
            permissions,
            devices,
            pipeline,
            store,
            cues,
            preview,
        } = collaborators;

        if let Err(e) = std::fs::create_dir_all(&settings.temp_dir) {
            warn!(dir = %settings.temp_dir.display(), error = %e, "Failed to create temp directory");
        }

        let movie_extension = pipeline.movie_extension();
        let gate = SetupGate::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let (capture_tx, capture_rx) = mpsc::unbounded_channel();
        let (queue, worker) =
            Session::spawn(pipeline, devices, preview, gate.subscribe(), tx.clone())?;

        Ok(Self {
            permissions,
            store,
            cues,
            settings,
            movie_extension,
            gate,
            queue,
            worker: Some(worker),
            mode: ShootingMode::default(),
            capture_state: CaptureState::default(),
            controls: Controls::default(),
            pending_photo: None,
            photo_in_flight: false,
            active_recording: None,
            setup_result: None,
            exit_requested: false,
            ui,
            tx,
            rx,
            capture_tx,
            capture_rx,
        })
    }

    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            tx: self.tx.clone(),
        }
    }

    /// Process messages until shutdown
    pub async fn run(mut self) {
        self.startup();

        loop {
            if self.exit_requested && !self.is_busy() {
                break;
            }

            let message = tokio::select! {
                Some(message) = self.rx.recv() => message,
                Some(event) = self.capture_rx.recv() => Message::Capture(event),
                else => break,
            };
            self.update(message);
        }

        self.finish().await;
    }

    /// Initial control state, permission checks and session setup
    fn startup(&mut self) {
        info!(mode = %self.mode, "Starting capture controller");
        self.notify(UiUpdate::Controls(self.controls));
        self.notify(UiUpdate::Mode(self.mode));

        self.check_permissions();

        self.queue.enqueue(SessionCommand::Configure);
        self.queue.enqueue(SessionCommand::Start);
    }

    /// Work that must complete before exiting
    fn is_busy(&self) -> bool {
        self.photo_in_flight || self.active_recording.is_some()
    }

    async fn finish(self) {
        let CaptureController {
            gate,
            queue,
            worker,
            ..
        } = self;

        queue.enqueue(SessionCommand::Stop);
        // Releases a worker still waiting for the permission outcome
        drop(gate);
        drop(queue);

        if let Some(worker) = worker {
            match tokio::task::spawn_blocking(move || worker.join()).await {
                Ok(Ok(())) => debug!("Session worker joined"),
                _ => warn!("Session worker did not exit cleanly"),
            }
        }
        info!("Capture controller stopped");
    }

    // ===== UI state =====

    fn notify(&self, update: UiUpdate) {
        if self.ui.send(update).is_err() {
            debug!("UI receiver dropped");
        }
    }

    fn set_controls(&mut self, controls: Controls) {
        if self.controls != controls {
            self.controls = controls;
            self.notify(UiUpdate::Controls(controls));
        }
    }

    fn set_shutter_enabled(&mut self, enabled: bool) {
        self.set_controls(Controls {
            shutter_enabled: enabled,
            ..self.controls
        });
    }

    /// Enable both controls when the session is usable
    fn enable_controls(&mut self) {
        if self.setup_result == Some(SetupResult::Success) && !self.exit_requested {
            self.set_controls(Controls::enabled());
        }
    }
}
