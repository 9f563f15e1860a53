// SPDX-License-Identifier: MPL-2.0

//! Scripted collaborators for controller integration tests

#![allow(dead_code)]

use futures::FutureExt;
use futures::future::BoxFuture;
use snapcam::app::{
    CaptureController, CaptureState, Collaborators, ControllerHandle, ControllerSettings, Controls,
    SetupNotice, SetupResult, ShootingMode, UiUpdate,
};
use snapcam::backends::camera::{
    BackendError, BackendResult, CaptureDevice, CaptureEvent, CapturePipeline, CaptureSink,
    CapturedPhoto, DeviceDirectory, DevicePosition, DeviceType, MediaKind, OutputKind,
    PhotoSettings, PreviewSender, SessionPreset,
};
use snapcam::backends::cues::{Cue, CuePlayer};
use snapcam::backends::permissions::{
    AuthorizationStatus, GrantStore, PermissionAuthority, PermissionScope,
};
use snapcam::pipelines::photo::EncodingQuality;
use snapcam::storage::{AssetChange, AssetKind, AssetStore, LibraryStore, SavedAsset};
use snapcam::{AppError, AppResult};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

pub const PHOTO_BYTES: &[u8] = &[0xFF, 0xD8, 0x01, 0x02, 0xFF, 0xD9];
pub const MOVIE_EXTENSION: &str = "mov";
const WAIT: Duration = Duration::from_secs(5);

// ===== Devices =====

pub fn back_camera() -> CaptureDevice {
    CaptureDevice {
        id: "cam-back".to_string(),
        name: "Back Camera".to_string(),
        device_type: DeviceType::WideAngleCamera,
        media_kind: MediaKind::Video,
        position: DevicePosition::Back,
    }
}

pub fn front_camera() -> CaptureDevice {
    CaptureDevice {
        id: "cam-front".to_string(),
        name: "Front Camera".to_string(),
        device_type: DeviceType::WideAngleCamera,
        media_kind: MediaKind::Video,
        position: DevicePosition::Front,
    }
}

pub fn microphone() -> CaptureDevice {
    CaptureDevice {
        id: "mic".to_string(),
        name: "Microphone".to_string(),
        device_type: DeviceType::Microphone,
        media_kind: MediaKind::Audio,
        position: DevicePosition::Unspecified,
    }
}

pub struct FakeDirectory {
    pub devices: Vec<CaptureDevice>,
}

impl DeviceDirectory for FakeDirectory {
    fn devices(&self) -> Vec<CaptureDevice> {
        self.devices.clone()
    }
}

// ===== Pipeline =====

/// Failure injection for the fake pipeline
#[derive(Debug, Clone, Default)]
pub struct FakeBehavior {
    /// `add_output` fails for this output
    pub fail_output: Option<OutputKind>,
    /// `can_add_input` refuses audio devices
    pub reject_audio: bool,
    pub fail_start: bool,
    /// Phase 1 of every photo reports an error
    pub photo_data_error: bool,
    /// Phase 2 of every photo reports an error
    pub photo_finish_error: bool,
    /// Recordings fail without producing a file
    pub recording_error_without_file: bool,
    /// Every commit after the initial configuration fails and drops its changes
    pub fail_later_commits: bool,
}

/// Journal and committed state of the fake pipeline
#[derive(Debug, Default)]
pub struct PipelineLog {
    pub calls: Vec<String>,
    pub inputs: Vec<CaptureDevice>,
    pub outputs: Vec<OutputKind>,
    pub preset: Option<SessionPreset>,
    pub preview_attached: bool,
    pub running: bool,
    pub recordings: Vec<PathBuf>,
    /// Settings of every still capture, in order
    pub photo_settings: Vec<PhotoSettings>,
}

impl PipelineLog {
    pub fn count(&self, call: &str) -> usize {
        self.calls.iter().filter(|c| c.as_str() == call).count()
    }

    pub fn has_audio_input(&self) -> bool {
        self.inputs.iter().any(|d| d.media_kind == MediaKind::Audio)
    }
}

pub struct FakePipeline {
    log: Arc<Mutex<PipelineLog>>,
    behavior: FakeBehavior,
    staged: Option<(Vec<CaptureDevice>, Vec<OutputKind>)>,
    recording: Option<(PathBuf, CaptureSink)>,
    commits: usize,
}

impl FakePipeline {
    pub fn new(behavior: FakeBehavior) -> (Self, Arc<Mutex<PipelineLog>>) {
        let log = Arc::new(Mutex::new(PipelineLog::default()));
        let pipeline = Self {
            log: Arc::clone(&log),
            behavior,
            staged: None,
            recording: None,
            commits: 0,
        };
        (pipeline, log)
    }

    fn record(&self, call: impl Into<String>) {
        self.log.lock().unwrap().calls.push(call.into());
    }

    fn with_bindings<R>(
        &mut self,
        f: impl FnOnce(&mut Vec<CaptureDevice>, &mut Vec<OutputKind>) -> R,
    ) -> R {
        match self.staged.as_mut() {
            Some((inputs, outputs)) => f(inputs, outputs),
            None => {
                let mut log = self.log.lock().unwrap();
                let log = &mut *log;
                f(&mut log.inputs, &mut log.outputs)
            }
        }
    }
}

impl CapturePipeline for FakePipeline {
    fn begin_configuration(&mut self) {
        self.record("begin_configuration");
        let log = self.log.lock().unwrap();
        self.staged = Some((log.inputs.clone(), log.outputs.clone()));
    }

    fn commit_configuration(&mut self) -> BackendResult<()> {
        self.record("commit_configuration");
        self.commits += 1;
        if self.behavior.fail_later_commits && self.commits > 1 {
            self.staged = None;
            return Err(BackendError::Other("commit rejected".to_string()));
        }
        if let Some((inputs, outputs)) = self.staged.take() {
            let mut log = self.log.lock().unwrap();
            log.inputs = inputs;
            log.outputs = outputs;
        }
        Ok(())
    }

    fn can_add_input(&self, device: &CaptureDevice) -> bool {
        if self.behavior.reject_audio && device.media_kind == MediaKind::Audio {
            return false;
        }
        let inputs = match &self.staged {
            Some((inputs, _)) => inputs.clone(),
            None => self.log.lock().unwrap().inputs.clone(),
        };
        !inputs.iter().any(|d| d.id == device.id)
    }

    fn add_input(&mut self, device: &CaptureDevice) -> BackendResult<()> {
        self.record(format!("add_input:{}", device.id));
        let device = device.clone();
        self.with_bindings(|inputs, _| inputs.push(device));
        Ok(())
    }

    fn remove_input(&mut self, device: &CaptureDevice) {
        self.record(format!("remove_input:{}", device.id));
        let id = device.id.clone();
        self.with_bindings(|inputs, _| inputs.retain(|d| d.id != id));
    }

    fn can_add_output(&self, _output: OutputKind) -> bool {
        true
    }

    fn add_output(&mut self, output: OutputKind) -> BackendResult<()> {
        self.record(format!("add_output:{}", output));
        if self.behavior.fail_output == Some(output) {
            return Err(BackendError::AttachFailed(format!("{} output", output)));
        }
        self.with_bindings(|_, outputs| outputs.push(output));
        Ok(())
    }

    fn remove_output(&mut self, output: OutputKind) {
        self.record(format!("remove_output:{}", output));
        self.with_bindings(|_, outputs| outputs.retain(|o| *o != output));
    }

    fn set_preset(&mut self, preset: SessionPreset) {
        self.record(format!("set_preset:{:?}", preset));
        self.log.lock().unwrap().preset = Some(preset);
    }

    fn attach_preview(&mut self, _sink: PreviewSender) {
        self.record("attach_preview");
        self.log.lock().unwrap().preview_attached = true;
    }

    fn start_running(&mut self) -> BackendResult<()> {
        self.record("start_running");
        if self.behavior.fail_start {
            return Err(BackendError::Other("start failed".to_string()));
        }
        self.log.lock().unwrap().running = true;
        Ok(())
    }

    fn stop_running(&mut self) {
        self.record("stop_running");
        self.stop_recording();
        self.log.lock().unwrap().running = false;
    }

    fn is_running(&self) -> bool {
        self.log.lock().unwrap().running
    }

    fn capture_photo(&mut self, settings: PhotoSettings, sink: CaptureSink) {
        self.record("capture_photo");
        self.log.lock().unwrap().photo_settings.push(settings);
        let processed = if self.behavior.photo_data_error {
            Err(BackendError::EncodingFailed("sensor glitch".to_string()))
        } else {
            Ok(CapturedPhoto {
                data: PHOTO_BYTES.to_vec(),
                thumbnail: None,
                width: 4,
                height: 3,
            })
        };
        let finished = if self.behavior.photo_finish_error {
            Err(BackendError::Other("capture aborted".to_string()))
        } else {
            Ok(())
        };
        let _ = sink.send(CaptureEvent::PhotoProcessed(processed));
        let _ = sink.send(CaptureEvent::PhotoCaptureFinished(finished));
    }

    fn start_recording(&mut self, path: &Path, sink: CaptureSink) {
        self.record("start_recording");
        if !self.behavior.recording_error_without_file {
            std::fs::write(path, b"movie").unwrap();
        }
        self.log.lock().unwrap().recordings.push(path.to_path_buf());
        self.recording = Some((path.to_path_buf(), sink));
    }

    fn stop_recording(&mut self) {
        if let Some((path, sink)) = self.recording.take() {
            self.record("stop_recording");
            let result = if self.behavior.recording_error_without_file {
                Err(BackendError::IoError("disk full".to_string()))
            } else {
                Ok(())
            };
            let _ = sink.send(CaptureEvent::RecordingFinished { path, result });
        }
    }

    fn movie_extension(&self) -> &'static str {
        MOVIE_EXTENSION
    }
}

// ===== Permissions =====

pub struct ScriptedPermissions {
    pub camera: AuthorizationStatus,
    pub library: AuthorizationStatus,
    /// Answer to the camera prompt; a missing answer denies
    pub camera_answer: Mutex<Option<oneshot::Receiver<bool>>>,
    pub requests: Mutex<Vec<PermissionScope>>,
}

impl PermissionAuthority for ScriptedPermissions {
    fn authorization_status(&self, scope: PermissionScope) -> AuthorizationStatus {
        match scope {
            PermissionScope::Camera => self.camera,
            PermissionScope::PhotoLibrary => self.library,
        }
    }

    fn request_access(&self, scope: PermissionScope) -> BoxFuture<'static, bool> {
        self.requests.lock().unwrap().push(scope);
        match scope {
            PermissionScope::Camera => {
                let answer = self.camera_answer.lock().unwrap().take();
                async move {
                    match answer {
                        Some(answer) => answer.await.unwrap_or(false),
                        None => false,
                    }
                }
                .boxed()
            }
            PermissionScope::PhotoLibrary => futures::future::ready(true).boxed(),
        }
    }
}

// ===== Asset store =====

pub struct FakeStore {
    pub status: AuthorizationStatus,
    pub fail_writes: bool,
    pub writes: Mutex<Vec<AssetChange>>,
    /// Whether each video file existed when it was written
    pub video_file_present: Mutex<Vec<bool>>,
}

impl AssetStore for FakeStore {
    fn request_add_only_authorization(&self) -> BoxFuture<'static, AuthorizationStatus> {
        futures::future::ready(self.status).boxed()
    }

    fn perform_changes(&self, change: AssetChange) -> BoxFuture<'static, AppResult<SavedAsset>> {
        let kind = match &change {
            AssetChange::Photo(_) => AssetKind::Photo,
            AssetChange::Video(path) => {
                self.video_file_present.lock().unwrap().push(path.exists());
                AssetKind::Video
            }
        };
        self.writes.lock().unwrap().push(change);

        let result = if self.fail_writes {
            Err(AppError::Write("library full".to_string()))
        } else {
            Ok(SavedAsset {
                path: PathBuf::from(format!("/library/{}", kind)),
                kind,
            })
        };
        futures::future::ready(result).boxed()
    }
}

// ===== Cues =====

#[derive(Default)]
pub struct RecordingCues {
    pub played: Mutex<Vec<Cue>>,
}

impl CuePlayer for RecordingCues {
    fn play(&self, cue: Cue) {
        self.played.lock().unwrap().push(cue);
    }
}

// ===== Harness =====

pub struct HarnessOptions {
    pub camera: AuthorizationStatus,
    pub library: AuthorizationStatus,
    pub camera_answer: Option<oneshot::Receiver<bool>>,
    pub devices: Vec<CaptureDevice>,
    pub behavior: FakeBehavior,
    pub library_status: AuthorizationStatus,
    pub fail_writes: bool,
    /// Use these grants and a directory library instead of the scripted fakes
    pub grants: Option<Arc<GrantStore>>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            camera: AuthorizationStatus::Authorized,
            library: AuthorizationStatus::Authorized,
            camera_answer: None,
            devices: vec![back_camera(), microphone()],
            behavior: FakeBehavior::default(),
            library_status: AuthorizationStatus::Authorized,
            fail_writes: false,
            grants: None,
        }
    }
}

/// Everything the UI has been told so far
#[derive(Debug, Default)]
pub struct Observed {
    pub controls: Controls,
    pub mode: ShootingMode,
    pub mode_updates: Vec<ShootingMode>,
    pub capture_states: Vec<CaptureState>,
    pub setup: Vec<SetupResult>,
    pub notices: Vec<SetupNotice>,
    pub photos: Vec<AppResult<SavedAsset>>,
    pub videos: Vec<AppResult<SavedAsset>>,
    pub skipped_photos: usize,
    pub capture_failures: Vec<AppError>,
}

impl Observed {
    fn apply(&mut self, update: UiUpdate) {
        match update {
            UiUpdate::Controls(controls) => self.controls = controls,
            UiUpdate::Mode(mode) => {
                self.mode = mode;
                self.mode_updates.push(mode);
            }
            UiUpdate::CaptureState(state) => self.capture_states.push(state),
            UiUpdate::SetupResolved(result) => self.setup.push(result),
            UiUpdate::Notice(notice) => self.notices.push(notice),
            UiUpdate::PhotoSaved(result) => self.photos.push(result),
            UiUpdate::PhotoSaveSkipped => self.skipped_photos += 1,
            UiUpdate::VideoSaved(result) => self.videos.push(result),
            UiUpdate::CaptureFailed(error) => self.capture_failures.push(error),
        }
    }
}

pub struct Harness {
    pub handle: ControllerHandle,
    pub observed: Observed,
    pub pipeline: Arc<Mutex<PipelineLog>>,
    pub store: Arc<FakeStore>,
    pub cues: Arc<RecordingCues>,
    pub permissions: Arc<ScriptedPermissions>,
    pub temp_dir: PathBuf,
    /// Root of the directory library when running with real grants
    pub library_root: PathBuf,
    updates: mpsc::UnboundedReceiver<UiUpdate>,
    task: tokio::task::JoinHandle<()>,
    _scratch: tempfile::TempDir,
}

impl Harness {
    /// Build the controller and spawn it on the current runtime
    pub fn start(options: HarnessOptions) -> Self {
        let scratch = tempfile::tempdir().unwrap();
        let temp_dir = scratch.path().join("recordings");
        let library_root = scratch.path().join("library");

        let (pipeline, log) = FakePipeline::new(options.behavior);
        let permissions = Arc::new(ScriptedPermissions {
            camera: options.camera,
            library: options.library,
            camera_answer: Mutex::new(options.camera_answer),
            requests: Mutex::new(Vec::new()),
        });
        let store = Arc::new(FakeStore {
            status: options.library_status,
            fail_writes: options.fail_writes,
            writes: Mutex::new(Vec::new()),
            video_file_present: Mutex::new(Vec::new()),
        });
        let cues = Arc::new(RecordingCues::default());
        let (preview, _preview_rx) = futures::channel::mpsc::channel(1);

        let (authority, asset_store): (Arc<dyn PermissionAuthority>, Arc<dyn AssetStore>) =
            match options.grants {
                Some(grants) => (
                    grants.clone(),
                    Arc::new(LibraryStore::new(
                        library_root.join("Pictures"),
                        library_root.join("Videos"),
                        grants,
                    )),
                ),
                None => (permissions.clone(), store.clone()),
            };

        let collaborators = Collaborators {
            permissions: authority,
            devices: Arc::new(FakeDirectory {
                devices: options.devices,
            }),
            pipeline: Box::new(pipeline),
            store: asset_store,
            cues: cues.clone(),
            preview: Some(preview),
        };
        let settings = ControllerSettings {
            temp_dir: temp_dir.clone(),
            photo_quality: EncodingQuality::default(),
        };

        let (ui_tx, updates) = mpsc::unbounded_channel();
        let controller = CaptureController::new(collaborators, settings, ui_tx).unwrap();
        let handle = controller.handle();
        let task = tokio::spawn(controller.run());

        Self {
            handle,
            observed: Observed::default(),
            pipeline: log,
            store,
            cues,
            permissions,
            temp_dir,
            library_root,
            updates,
            task,
            _scratch: scratch,
        }
    }

    pub fn log(&self) -> MutexGuard<'_, PipelineLog> {
        self.pipeline.lock().unwrap()
    }

    /// Process updates until `condition` holds
    pub async fn until(&mut self, what: &str, condition: impl Fn(&Observed) -> bool) {
        let wait = async {
            while !condition(&self.observed) {
                match self.updates.recv().await {
                    Some(update) => self.observed.apply(update),
                    None => panic!("controller exited while waiting for {}", what),
                }
            }
        };
        if tokio::time::timeout(WAIT, wait).await.is_err() {
            panic!("timed out waiting for {}: {:#?}", what, self.observed);
        }
    }

    /// Process whatever arrives within `duration`
    pub async fn settle(&mut self, duration: Duration) {
        let deadline = tokio::time::Instant::now() + duration;
        while let Ok(Some(update)) = tokio::time::timeout_at(deadline, self.updates.recv()).await
        {
            self.observed.apply(update);
        }
    }

    pub async fn wait_ready(&mut self) {
        self.until("controls enabled", |o| {
            o.controls.shutter_enabled && o.controls.mode_switch_enabled
        })
        .await;
    }

    /// Switch mode and wait for the controls to come back
    pub async fn switch_mode(&mut self, mode: ShootingMode) {
        let before = self.observed.mode_updates.len();
        self.handle.select_mode(mode);
        self.until("mode update", |o| o.mode_updates.len() > before)
            .await;
        self.wait_ready().await;
    }

    pub fn photo_writes(&self) -> usize {
        self.store
            .writes
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, AssetChange::Photo(_)))
            .count()
    }

    pub fn video_writes(&self) -> usize {
        self.store
            .writes
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, AssetChange::Video(_)))
            .count()
    }

    /// Files written to the directory library
    pub fn library_files(&self) -> Vec<PathBuf> {
        ["Pictures", "Videos"]
            .iter()
            .filter_map(|dir| std::fs::read_dir(self.library_root.join(dir)).ok())
            .flatten()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    /// Shut down and wait for the controller to exit
    pub async fn shutdown(mut self) -> Observed {
        self.handle.shutdown();
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            tokio::select! {
                result = &mut self.task => {
                    result.unwrap();
                    break;
                }
                Some(update) = self.updates.recv() => self.observed.apply(update),
                _ = tokio::time::sleep_until(deadline) => panic!("controller did not exit"),
            }
        }
        while let Ok(update) = self.updates.try_recv() {
            self.observed.apply(update);
        }
        self.observed
    }
}
