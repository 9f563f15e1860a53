// SPDX-License-Identifier: GPL-3.0-only

//! Message update handling
//!
//! The `update()` function acts as a dispatcher, while specific handlers are
//! implemented in the `handlers` submodules organized by functional domain.
//!
//! # Handler Modules
//!
//! - `handlers::permissions`: Camera access answers and session start outcome
//! - `handlers::mode`: Photo/video mode switching
//! - `handlers::capture`: Shutter, photo callbacks, recording, library writes

use super::CaptureController;
use super::state::Message;
use tracing::info;

impl CaptureController {
    /// Route a message to its handler
    pub(super) fn update(&mut self, message: Message) {
        match message {
            // ===== User actions =====
            Message::Shutter => self.handle_shutter(),
            Message::SelectMode(mode) => self.handle_select_mode(mode),
            Message::Shutdown => {
                info!("Shutdown requested");
                self.handle_shutdown();
            }

            // ===== Permissions =====
            Message::CameraAccessResolved(granted) => self.handle_camera_access_resolved(granted),

            // ===== Session worker =====
            Message::SessionRunning => self.handle_session_running(),
            Message::SessionUnavailable(result) => self.handle_session_unavailable(result),
            Message::ModeSwitched { mode, bindings } => self.handle_mode_switched(mode, bindings),
            Message::ModeSwitchFailed { mode, error } => self.handle_mode_switch_failed(mode, error),

            // ===== Pipeline callbacks =====
            Message::Capture(event) => self.handle_capture_event(event),

            // ===== Asset store =====
            Message::PhotoSaved(result) => self.handle_photo_saved(result),
            Message::PhotoSaveDenied => self.handle_photo_save_denied(),
            Message::VideoSaved(result) => self.handle_video_saved(result),
        }
    }
}
