// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic camera backend
//!
//! Provides a back-facing wide-angle camera and a microphone that exist on
//! every machine, so the capture controller can run without hardware.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ Frame thread     │  ← renders the test pattern every FRAME_INTERVAL
//! └──────────────────┘
//!        │
//!        ├──▶ latest frame ──▶ capture_photo ──▶ encode thread ──▶ CaptureSink
//!        ├──▶ preview sender (try_send, drops when full)
//!        └──▶ recording sender ──▶ recorder thread ──▶ Motion-JPEG temp file
//! ```
//!
//! Input and output changes made inside a configuration transaction are
//! staged and only become visible at commit.

mod pattern;

pub use pattern::render_frame;

use crate::backends::camera::types::*;
use crate::backends::camera::{CapturePipeline, DeviceDirectory};
use crate::constants::virtual_camera::{
    FRAME_INTERVAL, HIGH_FRAME_SIZE, PHOTO_FRAME_SIZE, RECORDING_QUALITY,
};
use crate::pipelines::photo::encode_still;
use crate::pipelines::video::{MJPEG_EXTENSION, MjpegWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread::JoinHandle;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Identifier of the synthetic camera
pub const VIRTUAL_CAMERA_ID: &str = "virtual:camera:back";

/// Identifier of the synthetic microphone
pub const VIRTUAL_MICROPHONE_ID: &str = "virtual:microphone";

/// Frame sender shared between the frame thread and recording start/stop
type SharedRecordingSender = Arc<Mutex<Option<mpsc::Sender<PreviewFrame>>>>;

/// Directory of synthetic devices
pub struct VirtualDirectory {
    devices: Vec<CaptureDevice>,
}

impl VirtualDirectory {
    /// Camera and microphone
    pub fn new() -> Self {
        Self {
            devices: vec![Self::camera(), Self::microphone()],
        }
    }

    /// Microphone only, as on a machine without a back camera
    pub fn without_camera() -> Self {
        Self {
            devices: vec![Self::microphone()],
        }
    }

    /// Camera only, as on a machine without audio capture
    pub fn without_microphone() -> Self {
        Self {
            devices: vec![Self::camera()],
        }
    }

    fn camera() -> CaptureDevice {
        CaptureDevice {
            id: VIRTUAL_CAMERA_ID.to_string(),
            name: "Virtual Back Camera".to_string(),
            device_type: DeviceType::WideAngleCamera,
            media_kind: MediaKind::Video,
            position: DevicePosition::Back,
        }
    }

    fn microphone() -> CaptureDevice {
        CaptureDevice {
            id: VIRTUAL_MICROPHONE_ID.to_string(),
            name: "Virtual Microphone".to_string(),
            device_type: DeviceType::Microphone,
            media_kind: MediaKind::Audio,
            position: DevicePosition::Unspecified,
        }
    }
}

impl Default for VirtualDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceDirectory for VirtualDirectory {
    fn devices(&self) -> Vec<CaptureDevice> {
        self.devices.clone()
    }
}

/// Inputs, outputs and preset of a session
#[derive(Debug, Clone, Default)]
struct Bindings {
    inputs: Vec<CaptureDevice>,
    outputs: Vec<OutputKind>,
    preset: SessionPreset,
}

impl Bindings {
    fn has_input_kind(&self, kind: MediaKind) -> bool {
        self.inputs.iter().any(|d| d.media_kind == kind)
    }

    fn frame_size(&self) -> (u32, u32) {
        match self.preset {
            SessionPreset::Photo => PHOTO_FRAME_SIZE,
            SessionPreset::High => HIGH_FRAME_SIZE,
        }
    }
}

/// Capture pipeline over the synthetic devices
pub struct VirtualPipeline {
    committed: Bindings,
    /// Staged bindings while a configuration transaction is open
    pending: Option<Bindings>,
    frame_size: Arc<Mutex<(u32, u32)>>,
    latest_frame: Arc<Mutex<Option<PreviewFrame>>>,
    preview: Arc<Mutex<Option<PreviewSender>>>,
    recording_sender: SharedRecordingSender,
    running: Arc<AtomicBool>,
    frame_thread: Option<JoinHandle<()>>,
}

impl VirtualPipeline {
    pub fn new() -> Self {
        let committed = Bindings::default();
        let frame_size = committed.frame_size();
        Self {
            committed,
            pending: None,
            frame_size: Arc::new(Mutex::new(frame_size)),
            latest_frame: Arc::new(Mutex::new(None)),
            preview: Arc::new(Mutex::new(None)),
            recording_sender: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            frame_thread: None,
        }
    }

    /// Outputs visible outside the configuration transaction
    pub fn committed_outputs(&self) -> Vec<OutputKind> {
        self.committed.outputs.clone()
    }

    /// Inputs visible outside the configuration transaction
    pub fn committed_inputs(&self) -> Vec<CaptureDevice> {
        self.committed.inputs.clone()
    }

    /// Whether a recording is in progress
    pub fn is_recording(&self) -> bool {
        self.recording_sender.lock().unwrap().is_some()
    }

    fn staged(&self) -> &Bindings {
        self.pending.as_ref().unwrap_or(&self.committed)
    }

    fn staged_mut(&mut self) -> &mut Bindings {
        match self.pending {
            Some(ref mut pending) => pending,
            None => &mut self.committed,
        }
    }

    /// Apply the committed preset to the frame thread
    fn sync_frame_size(&self) {
        *self.frame_size.lock().unwrap() = self.committed.frame_size();
    }

    /// Current frame, rendering one on demand when the frame thread has
    /// not produced any yet
    fn snapshot(&self) -> PreviewFrame {
        if let Some(frame) = self.latest_frame.lock().unwrap().clone() {
            return frame;
        }
        let (width, height) = *self.frame_size.lock().unwrap();
        PreviewFrame {
            width,
            height,
            data: Arc::from(render_frame(width, height, 0).into_boxed_slice()),
            captured_at: Instant::now(),
        }
    }
}

impl Default for VirtualPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl CapturePipeline for VirtualPipeline {
    fn begin_configuration(&mut self) {
        if self.pending.is_none() {
            self.pending = Some(self.committed.clone());
        }
    }

    fn commit_configuration(&mut self) -> BackendResult<()> {
        if let Some(pending) = self.pending.take() {
            self.committed = pending;
            self.sync_frame_size();
            debug!(
                inputs = self.committed.inputs.len(),
                outputs = ?self.committed.outputs,
                preset = ?self.committed.preset,
                "Virtual session configuration committed"
            );
        }
        Ok(())
    }

    fn can_add_input(&self, device: &CaptureDevice) -> bool {
        let known = device.id == VIRTUAL_CAMERA_ID || device.id == VIRTUAL_MICROPHONE_ID;
        known && !self.staged().has_input_kind(device.media_kind)
    }

    fn add_input(&mut self, device: &CaptureDevice) -> BackendResult<()> {
        if !self.can_add_input(device) {
            return Err(BackendError::AttachFailed(format!(
                "cannot attach {} ({})",
                device.name, device.id
            )));
        }
        self.staged_mut().inputs.push(device.clone());
        Ok(())
    }

    fn remove_input(&mut self, device: &CaptureDevice) {
        self.staged_mut().inputs.retain(|d| d.id != device.id);
    }

    fn can_add_output(&self, output: OutputKind) -> bool {
        !self.staged().outputs.contains(&output)
    }

    fn add_output(&mut self, output: OutputKind) -> BackendResult<()> {
        if !self.can_add_output(output) {
            return Err(BackendError::AttachFailed(format!(
                "{} output already attached",
                output
            )));
        }
        self.staged_mut().outputs.push(output);
        Ok(())
    }

    fn remove_output(&mut self, output: OutputKind) {
        self.staged_mut().outputs.retain(|o| *o != output);
    }

    fn set_preset(&mut self, preset: SessionPreset) {
        self.staged_mut().preset = preset;
        if self.pending.is_none() {
            self.sync_frame_size();
        }
    }

    fn attach_preview(&mut self, sink: PreviewSender) {
        *self.preview.lock().unwrap() = Some(sink);
    }

    fn start_running(&mut self) -> BackendResult<()> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }
        if !self.committed.has_input_kind(MediaKind::Video) {
            return Err(BackendError::DeviceNotFound(
                "no video input attached".to_string(),
            ));
        }

        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let frame_size = Arc::clone(&self.frame_size);
        let latest_frame = Arc::clone(&self.latest_frame);
        let preview = Arc::clone(&self.preview);
        let recording_sender = Arc::clone(&self.recording_sender);

        let handle = std::thread::Builder::new()
            .name("virtual-camera".to_string())
            .spawn(move || {
                let mut tick: u64 = 0;
                while running.load(Ordering::SeqCst) {
                    let (width, height) = *frame_size.lock().unwrap();
                    let frame = PreviewFrame {
                        width,
                        height,
                        data: Arc::from(render_frame(width, height, tick).into_boxed_slice()),
                        captured_at: Instant::now(),
                    };

                    *latest_frame.lock().unwrap() = Some(frame.clone());

                    {
                        let mut guard = preview.lock().unwrap();
                        if let Some(sender) = guard.as_mut()
                            && let Err(e) = sender.try_send(frame.clone())
                            && e.is_disconnected()
                        {
                            debug!("Preview receiver dropped");
                            *guard = None;
                        }
                    }

                    {
                        let mut guard = recording_sender.lock().unwrap();
                        if let Some(sender) = guard.as_ref()
                            && sender.send(frame).is_err()
                        {
                            *guard = None;
                        }
                    }

                    tick = tick.wrapping_add(1);
                    std::thread::sleep(FRAME_INTERVAL);
                }
                debug!(frames = tick, "Virtual camera frame thread exiting");
            })
            .map_err(|e| BackendError::Other(format!("failed to spawn frame thread: {}", e)))?;

        self.frame_thread = Some(handle);
        info!("Virtual camera running");
        Ok(())
    }

    fn stop_running(&mut self) {
        self.stop_recording();
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.frame_thread.take()
            && handle.join().is_err()
        {
            error!("Virtual camera frame thread panicked");
        }
        *self.latest_frame.lock().unwrap() = None;
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn capture_photo(&mut self, settings: PhotoSettings, sink: CaptureSink) {
        let refusal = if !self.is_running() {
            Some(BackendError::NotRunning)
        } else if !self.committed.outputs.contains(&OutputKind::Photo) {
            Some(BackendError::OutputNotBound(OutputKind::Photo))
        } else {
            None
        };

        if let Some(err) = refusal {
            warn!(error = %err, "Photo capture refused");
            let _ = sink.send(CaptureEvent::PhotoProcessed(Err(err.clone())));
            let _ = sink.send(CaptureEvent::PhotoCaptureFinished(Err(err)));
            return;
        }

        let frame = self.snapshot();
        let spawned = std::thread::Builder::new()
            .name("virtual-photo".to_string())
            .spawn({
                let sink = sink.clone();
                move || {
                    let result = encode_still(&frame, &settings);
                    let finished = result.as_ref().map(|_| ()).map_err(Clone::clone);
                    let _ = sink.send(CaptureEvent::PhotoProcessed(result));
                    let _ = sink.send(CaptureEvent::PhotoCaptureFinished(finished));
                }
            });

        if let Err(e) = spawned {
            let err = BackendError::Other(format!("failed to spawn encoder: {}", e));
            let _ = sink.send(CaptureEvent::PhotoProcessed(Err(err.clone())));
            let _ = sink.send(CaptureEvent::PhotoCaptureFinished(Err(err)));
        }
    }

    fn start_recording(&mut self, path: &Path, sink: CaptureSink) {
        let path = path.to_path_buf();
        let refusal = if !self.is_running() {
            Some(BackendError::NotRunning)
        } else if !self.committed.outputs.contains(&OutputKind::Movie) {
            Some(BackendError::OutputNotBound(OutputKind::Movie))
        } else if self.is_recording() {
            Some(BackendError::RecordingInProgress)
        } else {
            None
        };

        if let Some(err) = refusal {
            warn!(error = %err, path = %path.display(), "Recording refused");
            let _ = sink.send(CaptureEvent::RecordingFinished {
                path,
                result: Err(err),
            });
            return;
        }

        let (tx, rx) = mpsc::channel::<PreviewFrame>();
        *self.recording_sender.lock().unwrap() = Some(tx);

        let with_audio = self.committed.has_input_kind(MediaKind::Audio);
        info!(path = %path.display(), with_audio, "Starting virtual recording");

        let spawned = std::thread::Builder::new()
            .name("virtual-recorder".to_string())
            .spawn({
                let path = path.clone();
                let sink = sink.clone();
                move || {
                    let result = record(&path, rx);
                    let _ = sink.send(CaptureEvent::RecordingFinished { path, result });
                }
            });

        if let Err(e) = spawned {
            *self.recording_sender.lock().unwrap() = None;
            let _ = sink.send(CaptureEvent::RecordingFinished {
                path,
                result: Err(BackendError::Other(format!(
                    "failed to spawn recorder: {}",
                    e
                ))),
            });
        }
    }

    fn stop_recording(&mut self) {
        // Dropping the sender ends the recorder loop
        if self.recording_sender.lock().unwrap().take().is_some() {
            info!("Stopping virtual recording");
        }
    }

    fn movie_extension(&self) -> &'static str {
        MJPEG_EXTENSION
    }
}

impl Drop for VirtualPipeline {
    fn drop(&mut self) {
        self.stop_running();
    }
}

/// Write frames until the sender is dropped
fn record(path: &Path, frames: mpsc::Receiver<PreviewFrame>) -> BackendResult<()> {
    let mut writer = MjpegWriter::create(path, RECORDING_QUALITY)?;
    let mut first_error: Option<BackendError> = None;

    for frame in frames {
        if let Err(e) = writer.write_frame(&frame) {
            if first_error.is_none() {
                error!(error = %e, "Failed to write recording frame");
                first_error = Some(e);
            }
        }
    }

    let written: PathBuf = writer.finish()?;
    match first_error {
        Some(e) => Err(e),
        None => {
            debug!(path = %written.display(), "Virtual recording finalized");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc::unbounded_channel;

    fn configured_pipeline(output: OutputKind) -> VirtualPipeline {
        let directory = VirtualDirectory::new();
        let mut pipeline = VirtualPipeline::new();
        pipeline.begin_configuration();
        for device in directory.devices() {
            pipeline.add_input(&device).unwrap();
        }
        pipeline.add_output(output).unwrap();
        pipeline.commit_configuration().unwrap();
        pipeline
    }

    #[test]
    fn test_default_devices() {
        let directory = VirtualDirectory::new();
        let camera = directory
            .default_device(DeviceType::WideAngleCamera, MediaKind::Video, DevicePosition::Back)
            .unwrap();
        assert_eq!(camera.id, VIRTUAL_CAMERA_ID);
        assert!(
            VirtualDirectory::without_camera()
                .default_device(DeviceType::WideAngleCamera, MediaKind::Video, DevicePosition::Back)
                .is_none()
        );
        assert!(
            VirtualDirectory::without_microphone()
                .default_device(DeviceType::Microphone, MediaKind::Audio, DevicePosition::Unspecified)
                .is_none()
        );
    }

    #[test]
    fn test_changes_apply_at_commit() {
        let mut pipeline = VirtualPipeline::new();
        pipeline.begin_configuration();
        pipeline.add_output(OutputKind::Photo).unwrap();
        assert!(pipeline.committed_outputs().is_empty());
        pipeline.commit_configuration().unwrap();
        assert_eq!(pipeline.committed_outputs(), vec![OutputKind::Photo]);
    }

    #[test]
    fn test_duplicate_input_rejected() {
        let camera = VirtualDirectory::camera();
        let mut pipeline = VirtualPipeline::new();
        pipeline.add_input(&camera).unwrap();
        assert!(!pipeline.can_add_input(&camera));
        assert!(matches!(
            pipeline.add_input(&camera),
            Err(BackendError::AttachFailed(_))
        ));
    }

    #[test]
    fn test_start_requires_video_input() {
        let mut pipeline = VirtualPipeline::new();
        assert!(pipeline.start_running().is_err());
        assert!(!pipeline.is_running());
    }

    #[test]
    fn test_photo_events_in_order() {
        let mut pipeline = configured_pipeline(OutputKind::Photo);
        pipeline.start_running().unwrap();

        let (tx, mut rx) = unbounded_channel();
        pipeline.capture_photo(PhotoSettings::still(80), tx);

        match rx.blocking_recv() {
            Some(CaptureEvent::PhotoProcessed(Ok(photo))) => {
                assert_eq!(&photo.data[..2], &[0xFF, 0xD8]);
                assert!(photo.thumbnail.is_some());
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(
            rx.blocking_recv(),
            Some(CaptureEvent::PhotoCaptureFinished(Ok(())))
        ));
        pipeline.stop_running();
    }

    #[test]
    fn test_photo_without_output_fails_both_phases() {
        let mut pipeline = configured_pipeline(OutputKind::Movie);
        pipeline.start_running().unwrap();

        let (tx, mut rx) = unbounded_channel();
        pipeline.capture_photo(PhotoSettings::still(80), tx);

        assert!(matches!(
            rx.blocking_recv(),
            Some(CaptureEvent::PhotoProcessed(Err(BackendError::OutputNotBound(
                OutputKind::Photo
            ))))
        ));
        assert!(matches!(
            rx.blocking_recv(),
            Some(CaptureEvent::PhotoCaptureFinished(Err(_)))
        ));
    }

    #[test]
    fn test_recording_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mjpeg");

        let mut pipeline = configured_pipeline(OutputKind::Movie);
        pipeline.start_running().unwrap();

        let (tx, mut rx) = unbounded_channel();
        pipeline.start_recording(&path, tx);
        assert!(pipeline.is_recording());
        std::thread::sleep(Duration::from_millis(250));
        pipeline.stop_recording();

        match rx.blocking_recv() {
            Some(CaptureEvent::RecordingFinished { path: finished, result }) => {
                assert_eq!(finished, path);
                assert!(result.is_ok());
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(path.exists());
        assert!(!pipeline.is_recording());
    }

    #[test]
    fn test_recording_refused_when_not_running() {
        let mut pipeline = configured_pipeline(OutputKind::Movie);
        let (tx, mut rx) = unbounded_channel();
        pipeline.start_recording(Path::new("/nonexistent/clip.mjpeg"), tx);
        assert!(matches!(
            rx.blocking_recv(),
            Some(CaptureEvent::RecordingFinished {
                result: Err(BackendError::NotRunning),
                ..
            })
        ));
    }
}
