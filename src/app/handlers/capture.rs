// SPDX-License-Identifier: GPL-3.0-only

//! Capture operations handlers
//!
//! Handles the shutter in both modes, the two-phase photo callback, the
//! recording callback, and the resulting library writes.

use crate::app::state::{CaptureState, Message, ShootingMode, UiUpdate};
use crate::app::{CaptureController, SessionCommand};
use crate::backends::camera::{BackendResult, CaptureEvent, CapturedPhoto, PhotoSettings};
use crate::backends::cues::Cue;
use crate::errors::{AppError, AppResult};
use crate::storage::{AssetChange, SavedAsset};
use std::path::PathBuf;
use tracing::{debug, info, warn};

impl CaptureController {
    // =========================================================================
    // Shutter
    // =========================================================================

    pub(crate) fn handle_shutter(&mut self) {
        if !self.controls.shutter_enabled {
            debug!("Ignoring shutter, control disabled");
            return;
        }

        match (self.mode, self.capture_state) {
            (ShootingMode::Photo, _) => self.capture_photo(),
            (ShootingMode::Video, CaptureState::Idle) => self.start_recording(),
            (ShootingMode::Video, CaptureState::Capturing) => self.stop_recording(),
        }
    }

    /// Issue one still capture; the shutter stays disabled until it completes
    fn capture_photo(&mut self) {
        let settings = PhotoSettings::still(self.settings.photo_quality.jpeg_quality());
        info!(quality = settings.jpeg_quality, "Capturing photo");

        self.set_shutter_enabled(false);
        self.pending_photo = None;
        self.photo_in_flight = true;
        self.queue.enqueue(SessionCommand::CapturePhoto {
            settings,
            sink: self.capture_tx.clone(),
        });
    }

    fn start_recording(&mut self) {
        self.cues.play(Cue::RecordingStarted);

        let path = self.settings.temp_dir.join(format!(
            "{}.{}",
            uuid::Uuid::new_v4(),
            self.movie_extension
        ));
        info!(path = %path.display(), "Starting recording");

        self.active_recording = Some(path.clone());
        self.queue.enqueue(SessionCommand::StartRecording {
            path,
            sink: self.capture_tx.clone(),
        });

        self.set_capture_state(CaptureState::Capturing);
        let mut controls = self.controls;
        controls.mode_switch_enabled = false;
        self.set_controls(controls);
    }

    /// Request stop; the shutter stays disabled until the movie is saved
    fn stop_recording(&mut self) {
        self.cues.play(Cue::RecordingStopped);
        info!("Stopping recording");

        self.queue.enqueue(SessionCommand::StopRecording);
        self.set_capture_state(CaptureState::Idle);
        self.set_shutter_enabled(false);
    }

    fn set_capture_state(&mut self, state: CaptureState) {
        debug_assert_eq!(self.capture_state.toggled(), state);
        self.capture_state = state;
        self.notify(UiUpdate::CaptureState(state));
    }

    pub(crate) fn handle_shutdown(&mut self) {
        self.exit_requested = true;
        if self.capture_state.is_capturing() {
            self.stop_recording();
        }
        self.set_controls(Default::default());
    }

    // =========================================================================
    // Pipeline callbacks
    // =========================================================================

    pub(crate) fn handle_capture_event(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::PhotoProcessed(result) => self.handle_photo_processed(result),
            CaptureEvent::PhotoCaptureFinished(result) => self.handle_photo_finished(result),
            CaptureEvent::RecordingFinished { path, result } => {
                self.handle_recording_finished(path, result)
            }
        }
    }

    /// Phase 1: keep the encoded bytes for the finish callback
    fn handle_photo_processed(&mut self, result: BackendResult<CapturedPhoto>) {
        match result {
            Ok(photo) => {
                debug!(
                    bytes = photo.data.len(),
                    width = photo.width,
                    height = photo.height,
                    "Photo data received"
                );
                self.pending_photo = Some(photo.data);
            }
            Err(e) => {
                warn!(error = %e, "Error capturing photo");
                self.pending_photo = None;
            }
        }
    }

    /// Phase 2: hand the bytes to the library, or give the shutter back
    fn handle_photo_finished(&mut self, result: BackendResult<()>) {
        if let Err(e) = result {
            warn!(error = %e, "Error finishing photo capture");
            self.pending_photo = None;
            self.finish_photo();
            self.notify(UiUpdate::CaptureFailed(e.into()));
            return;
        }

        let Some(data) = self.pending_photo.take() else {
            warn!("The expected photo data isn't available");
            self.finish_photo();
            self.notify(UiUpdate::CaptureFailed(AppError::Capture(
                "no photo data produced".to_string(),
            )));
            return;
        };

        let store = self.store.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let status = store.request_add_only_authorization().await;
            let message = if status.is_authorized() {
                Message::PhotoSaved(store.perform_changes(AssetChange::Photo(data)).await)
            } else {
                info!(%status, "Library access not granted, photo discarded");
                Message::PhotoSaveDenied
            };
            if tx.send(message).is_err() {
                debug!("Controller gone before the photo was saved");
            }
        });
    }

    fn finish_photo(&mut self) {
        self.photo_in_flight = false;
        if !self.exit_requested {
            self.set_shutter_enabled(true);
        }
    }

    fn handle_recording_finished(&mut self, path: PathBuf, result: BackendResult<()>) {
        match &result {
            Ok(()) => info!(path = %path.display(), "Recording finished"),
            Err(e) => warn!(path = %path.display(), error = %e, "Recording finished with error"),
        }
        if self.active_recording.as_ref() != Some(&path) {
            debug!(path = %path.display(), "Recording was not started by this controller");
        }
        if self.capture_state.is_capturing() {
            // Pipeline ended the recording on its own (refused or failed)
            warn!("Recording ended before stop was requested");
            self.set_capture_state(CaptureState::Idle);
            self.set_shutter_enabled(false);
        }

        let store = self.store.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let file_exists = tokio::fs::try_exists(&path).await.unwrap_or(false);
            let saved: AppResult<SavedAsset> = match result {
                Err(e) if !file_exists => {
                    warn!(path = %path.display(), "No recorded file, skipping library write");
                    Err(e.into())
                }
                _ => store.perform_changes(AssetChange::Video(path.clone())).await,
            };

            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "Temporary recording removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    let err = AppError::Cleanup(format!("{}: {}", path.display(), e));
                    warn!(error = %err, "Failed to remove temporary recording");
                }
            }

            if tx.send(Message::VideoSaved(saved)).is_err() {
                debug!("Controller gone before the video was saved");
            }
        });
    }

    // =========================================================================
    // Library results
    // =========================================================================

    pub(crate) fn handle_photo_saved(&mut self, result: AppResult<SavedAsset>) {
        match &result {
            Ok(asset) => info!(path = %asset.path.display(), "Photo added to library"),
            Err(e) => warn!(error = %e, "Failed to add photo to library"),
        }
        self.finish_photo();
        self.notify(UiUpdate::PhotoSaved(result));
    }

    pub(crate) fn handle_photo_save_denied(&mut self) {
        self.finish_photo();
        self.notify(UiUpdate::PhotoSaveSkipped);
    }

    pub(crate) fn handle_video_saved(&mut self, result: AppResult<SavedAsset>) {
        match &result {
            Ok(asset) => info!(path = %asset.path.display(), "Video added to library"),
            Err(e) => warn!(error = %e, "Failed to add video to library"),
        }
        self.active_recording = None;
        self.enable_controls();
        self.notify(UiUpdate::VideoSaved(result));
    }
}
