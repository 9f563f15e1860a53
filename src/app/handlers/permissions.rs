// SPDX-License-Identifier: GPL-3.0-only

//! Permission and session start handlers
//!
//! Resolves the setup gate from the camera authorization outcome and reacts
//! to the session worker reporting whether the pipeline started.

use crate::app::CaptureController;
use crate::app::state::{Controls, Message, SetupResult, UiUpdate};
use crate::backends::permissions::{AuthorizationStatus, PermissionScope};
use tracing::{debug, error, info, warn};

impl CaptureController {
    /// Query camera and library access, prompting where undetermined
    ///
    /// The camera answer is posted back as [`Message::CameraAccessResolved`].
    /// The library prompt follows it and its answer is only logged.
    pub(crate) fn check_permissions(&mut self) {
        let camera = self.permissions.authorization_status(PermissionScope::Camera);
        let library = self
            .permissions
            .authorization_status(PermissionScope::PhotoLibrary);
        info!(%camera, %library, "Authorization status");

        let camera_request = match camera {
            AuthorizationStatus::Authorized => {
                self.resolve_setup(SetupResult::Success);
                None
            }
            AuthorizationStatus::NotDetermined => {
                info!("Camera access not determined, session suspended until answered");
                Some(self.permissions.request_access(PermissionScope::Camera))
            }
            AuthorizationStatus::Denied | AuthorizationStatus::Restricted => {
                self.resolve_setup(SetupResult::NotAuthorized);
                None
            }
        };

        let library_request = (library == AuthorizationStatus::NotDetermined)
            .then(|| self.permissions.request_access(PermissionScope::PhotoLibrary));

        if camera_request.is_none() && library_request.is_none() {
            return;
        }

        // One task so prompts are asked one at a time
        let tx = self.tx.clone();
        tokio::spawn(async move {
            if let Some(request) = camera_request {
                let granted = request.await;
                if tx.send(Message::CameraAccessResolved(granted)).is_err() {
                    debug!("Controller gone before camera access was answered");
                }
            }
            if let Some(request) = library_request {
                let granted = request.await;
                info!(granted, "Photo library access answered");
            }
        });
    }

    pub(crate) fn handle_camera_access_resolved(&mut self, granted: bool) {
        info!(granted, "Camera access answered");
        let result = if granted {
            SetupResult::Success
        } else {
            SetupResult::NotAuthorized
        };
        self.resolve_setup(result);
    }

    fn resolve_setup(&mut self, result: SetupResult) {
        if self.gate.resolve(result) {
            info!(%result, "Setup gate resolved");
        } else {
            warn!(
                %result,
                current = ?self.gate.current(),
                "Setup already resolved, ignoring"
            );
        }
    }

    pub(crate) fn handle_session_running(&mut self) {
        self.setup_result = Some(SetupResult::Success);
        self.notify(UiUpdate::SetupResolved(SetupResult::Success));
        self.enable_controls();
    }

    pub(crate) fn handle_session_unavailable(&mut self, result: SetupResult) {
        error!(%result, "Capture session unavailable");
        self.setup_result = Some(result);
        self.set_controls(Controls::default());
        self.notify(UiUpdate::SetupResolved(result));
        if let Some(notice) = result.notice() {
            self.notify(UiUpdate::Notice(notice));
        }
    }
}
