// SPDX-License-Identifier: GPL-3.0-only

//! Shooting mode handlers

use crate::app::state::{Controls, DeviceBindings, ShootingMode, UiUpdate};
use crate::app::{CaptureController, SessionCommand};
use crate::errors::AppError;
use tracing::{debug, info, warn};

impl CaptureController {
    pub(crate) fn handle_select_mode(&mut self, mode: ShootingMode) {
        if self.capture_state.is_capturing() {
            debug!(%mode, "Ignoring mode switch while recording");
            return;
        }
        if !self.controls.mode_switch_enabled {
            debug!(%mode, "Ignoring mode switch, control disabled");
            return;
        }
        if mode == self.mode {
            debug!(%mode, "Already in requested mode");
            return;
        }

        info!(from = %self.mode, to = %mode, "Switching shooting mode");
        self.set_controls(Controls::default());
        self.queue.enqueue(SessionCommand::SwitchMode(mode));
    }

    pub(crate) fn handle_mode_switched(&mut self, mode: ShootingMode, bindings: DeviceBindings) {
        debug_assert!(bindings.is_consistent_with(mode));
        debug!(
            %mode,
            output = ?bindings.output,
            audio = bindings.audio_input.is_some(),
            "Mode switch committed"
        );
        self.mode = mode;
        self.notify(UiUpdate::Mode(mode));
        self.enable_controls();
    }

    pub(crate) fn handle_mode_switch_failed(&mut self, mode: ShootingMode, error: AppError) {
        warn!(%mode, error = %error, "Mode switch failed");
        self.mode = mode;
        self.notify(UiUpdate::Mode(mode));
        self.enable_controls();
    }
}
