// SPDX-License-Identifier: GPL-3.0-only

//! Serial session worker
//!
//! All capture session mutation runs on one dedicated thread that consumes a
//! FIFO command queue. The worker does not run any command until the setup
//! gate is resolved, so commands queued while the camera prompt is open wait
//! for the user's answer.
//!
//! ```text
//! controller ──SessionCommand──▶ [queue] ──▶ session-queue thread ──▶ CapturePipeline
//!      ▲                                            │
//!      └──────────────────Message───────────────────┘
//! ```

use super::state::{DeviceBindings, Message, SetupResult, ShootingMode};
use crate::backends::camera::{
    CaptureDevice, CapturePipeline, CaptureSink, DeviceDirectory, DevicePosition, DeviceType,
    MediaKind, OutputKind, PhotoSettings, PreviewSender,
};
use crate::errors::{AppError, AppResult};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Work executed on the session worker
#[derive(Debug)]
pub enum SessionCommand {
    /// Bind the back camera and photo output
    Configure,
    /// Start the pipeline if setup succeeded
    Start,
    /// Rebind outputs for a shooting mode
    SwitchMode(ShootingMode),
    CapturePhoto {
        settings: PhotoSettings,
        sink: CaptureSink,
    },
    StartRecording {
        path: PathBuf,
        sink: CaptureSink,
    },
    StopRecording,
    /// Stop the pipeline and exit the worker
    Stop,
}

/// Setup outcome shared with the session worker
///
/// Resolved at most once; the worker blocks on it before running commands.
pub struct SetupGate {
    tx: watch::Sender<Option<SetupResult>>,
}

impl SetupGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Resolve the gate; returns false if it was already resolved
    pub fn resolve(&self, result: SetupResult) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(result);
            true
        })
    }

    pub fn current(&self) -> Option<SetupResult> {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<SetupResult>> {
        self.tx.subscribe()
    }
}

impl Default for SetupGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Sending half of the session queue
#[derive(Clone)]
pub struct SessionQueue {
    tx: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionQueue {
    /// Append a command; dropped with a log line if the worker has exited
    pub fn enqueue(&self, command: SessionCommand) {
        if let Err(e) = self.tx.send(command) {
            warn!(command = ?e.0, "Session worker gone, dropping command");
        }
    }
}

/// State owned by the session worker
pub struct Session {
    pipeline: Box<dyn CapturePipeline>,
    devices: Arc<dyn DeviceDirectory>,
    preview: Option<PreviewSender>,
    setup: SetupResult,
    mode: ShootingMode,
    bindings: DeviceBindings,
    events: mpsc::UnboundedSender<Message>,
}

impl Session {
    /// Spawn the worker thread
    pub fn spawn(
        pipeline: Box<dyn CapturePipeline>,
        devices: Arc<dyn DeviceDirectory>,
        preview: Option<PreviewSender>,
        gate: watch::Receiver<Option<SetupResult>>,
        events: mpsc::UnboundedSender<Message>,
    ) -> AppResult<(SessionQueue, JoinHandle<()>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session {
            pipeline,
            devices,
            preview,
            setup: SetupResult::NotAuthorized,
            mode: ShootingMode::default(),
            bindings: DeviceBindings::default(),
            events,
        };

        let handle = std::thread::Builder::new()
            .name("session-queue".to_string())
            .spawn(move || session.run(gate, rx))
            .map_err(|e| AppError::Capture(format!("failed to spawn session worker: {}", e)))?;

        Ok((SessionQueue { tx }, handle))
    }

    fn run(
        mut self,
        mut gate: watch::Receiver<Option<SetupResult>>,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    ) {
        let resolved = pollster::block_on(gate.wait_for(Option::is_some))
            .ok()
            .and_then(|value| *value);
        let Some(setup) = resolved else {
            debug!("Setup gate closed before resolution, session worker exiting");
            return;
        };
        self.setup = setup;
        info!(%setup, "Session queue released");

        while let Some(command) = commands.blocking_recv() {
            debug!(?command, "Session command");
            match command {
                SessionCommand::Configure => self.configure(),
                SessionCommand::Start => self.start(),
                SessionCommand::SwitchMode(mode) => self.switch_mode(mode),
                SessionCommand::CapturePhoto { settings, sink } => {
                    self.pipeline.capture_photo(settings, sink)
                }
                SessionCommand::StartRecording { path, sink } => {
                    self.pipeline.start_recording(&path, sink)
                }
                SessionCommand::StopRecording => self.pipeline.stop_recording(),
                SessionCommand::Stop => break,
            }
        }

        if self.pipeline.is_running() {
            self.pipeline.stop_running();
            info!("Capture session stopped");
        }
        debug!("Session worker exiting");
    }

    fn report(&self, message: Message) {
        if self.events.send(message).is_err() {
            debug!("Controller gone, dropping session report");
        }
    }

    // ===== Configuration =====

    fn configure(&mut self) {
        if self.setup != SetupResult::Success {
            debug!(setup = %self.setup, "Skipping session configuration");
            return;
        }

        self.pipeline.begin_configuration();
        let bound = self.bind_photo_session();
        if bound.is_err() {
            self.unbind_all();
        }
        let committed = self.pipeline.commit_configuration().map_err(AppError::from);

        match bound.and(committed) {
            Ok(()) => {
                info!(
                    camera = self.bindings.video_input.as_ref().map(|d| d.name.as_str()),
                    "Capture session configured"
                );
            }
            Err(e) => {
                error!(error = %e, "Capture session configuration failed");
                self.bindings = DeviceBindings::default();
                self.setup = SetupResult::ConfigurationFailed;
            }
        }
    }

    fn bind_photo_session(&mut self) -> AppResult<()> {
        let camera = self
            .devices
            .default_device(DeviceType::WideAngleCamera, MediaKind::Video, DevicePosition::Back)
            .ok_or_else(|| {
                AppError::NoDeviceAvailable("no back wide-angle camera".to_string())
            })?;

        if !self.pipeline.can_add_input(&camera) {
            return Err(AppError::Attach(format!("cannot add input {}", camera.name)));
        }
        self.pipeline.add_input(&camera)?;
        self.bindings.video_input = Some(camera);

        self.attach_output(OutputKind::Photo)?;
        self.bindings.output = Some(OutputKind::Photo);

        if let Some(preview) = self.preview.take() {
            self.pipeline.attach_preview(preview);
        }
        self.pipeline.set_preset(ShootingMode::Photo.preset());
        self.mode = ShootingMode::Photo;
        Ok(())
    }

    fn unbind_all(&mut self) {
        if let Some(device) = self.bindings.video_input.take() {
            self.pipeline.remove_input(&device);
        }
        if let Some(output) = self.bindings.output.take() {
            self.pipeline.remove_output(output);
        }
    }

    fn attach_output(&mut self, output: OutputKind) -> AppResult<()> {
        if !self.pipeline.can_add_output(output) {
            return Err(AppError::Attach(format!("cannot add {} output", output)));
        }
        self.pipeline.add_output(output)?;
        Ok(())
    }

    // ===== Lifecycle =====

    fn start(&mut self) {
        if self.setup != SetupResult::Success {
            self.report(Message::SessionUnavailable(self.setup));
            return;
        }

        match self.pipeline.start_running() {
            Ok(()) => {
                info!("Capture session running");
                self.report(Message::SessionRunning);
            }
            Err(e) => {
                error!(error = %e, "Failed to start capture session");
                self.setup = SetupResult::ConfigurationFailed;
                self.report(Message::SessionUnavailable(self.setup));
            }
        }
    }

    // ===== Mode switching =====

    fn switch_mode(&mut self, target: ShootingMode) {
        if self.setup != SetupResult::Success {
            self.report(Message::ModeSwitchFailed {
                mode: self.mode,
                error: AppError::Capture(format!("session unavailable ({})", self.setup)),
            });
            return;
        }

        if self.mode == target && self.bindings.is_consistent_with(target) {
            debug!(mode = %target, "Already in requested mode");
            self.report(Message::ModeSwitched {
                mode: target,
                bindings: self.bindings.clone(),
            });
            return;
        }

        let previous = self.bindings.clone();
        self.pipeline.begin_configuration();

        // New output first so a failure leaves the old one bound
        let new_output = target.output();
        let attached = if self.bindings.output == Some(new_output) {
            Ok(())
        } else {
            self.attach_output(new_output)
        };

        if let Err(error) = attached {
            if let Err(e) = self.pipeline.commit_configuration() {
                warn!(error = %e, "Failed to close configuration after mode switch failure");
            }
            warn!(mode = %target, error = %error, "Mode switch failed, keeping current output");
            self.report(Message::ModeSwitchFailed {
                mode: self.mode,
                error,
            });
            return;
        }

        if let Some(old) = self.bindings.output.replace(new_output)
            && old != new_output
        {
            self.pipeline.remove_output(old);
        }

        match target {
            ShootingMode::Photo => {
                if let Some(microphone) = self.bindings.audio_input.take() {
                    self.pipeline.remove_input(&microphone);
                }
            }
            ShootingMode::Video => {
                if self.bindings.audio_input.is_none() {
                    self.bindings.audio_input = self.attach_microphone();
                }
            }
        }
        self.pipeline.set_preset(target.preset());

        if let Err(e) = self.pipeline.commit_configuration() {
            warn!(error = %e, mode = %target, "Mode switch commit failed, keeping current mode");
            self.bindings = previous;
            self.pipeline.set_preset(self.mode.preset());
            self.report(Message::ModeSwitchFailed {
                mode: self.mode,
                error: e.into(),
            });
            return;
        }

        self.mode = target;
        info!(
            mode = %target,
            audio = self.bindings.audio_input.is_some(),
            "Shooting mode switched"
        );
        self.report(Message::ModeSwitched {
            mode: target,
            bindings: self.bindings.clone(),
        });
    }

    /// Attach the default audio input; failures leave the session silent
    fn attach_microphone(&mut self) -> Option<CaptureDevice> {
        let Some(microphone) = self.devices.default_device(
            DeviceType::Microphone,
            MediaKind::Audio,
            DevicePosition::Unspecified,
        ) else {
            warn!("No audio input available, recording without sound");
            return None;
        };

        if !self.pipeline.can_add_input(&microphone) {
            warn!(device = %microphone.name, "Audio input rejected, recording without sound");
            return None;
        }
        match self.pipeline.add_input(&microphone) {
            Ok(()) => Some(microphone),
            Err(e) => {
                warn!(device = %microphone.name, error = %e, "Failed to attach audio input");
                None
            }
        }
    }
}
