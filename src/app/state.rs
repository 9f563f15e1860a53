// SPDX-License-Identifier: GPL-3.0-only

//! Controller state types
//!
//! Contains the setup outcome, shooting mode and capture state machines,
//! control enablement, and the messages exchanged between the controller
//! task, the session worker, and the UI.

use crate::backends::camera::{CaptureDevice, CaptureEvent, OutputKind, SessionPreset};
use crate::errors::{AppError, AppResult};
use crate::storage::SavedAsset;
use std::fmt;

/// Outcome of permission checks and session configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupResult {
    Success,
    NotAuthorized,
    ConfigurationFailed,
}

impl SetupResult {
    /// Notice to present when the session cannot run
    pub fn notice(&self) -> Option<SetupNotice> {
        match self {
            SetupResult::Success => None,
            SetupResult::NotAuthorized => Some(SetupNotice::CameraNotAuthorized),
            SetupResult::ConfigurationFailed => Some(SetupNotice::ConfigurationFailed),
        }
    }
}

impl fmt::Display for SetupResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupResult::Success => write!(f, "success"),
            SetupResult::NotAuthorized => write!(f, "not authorized"),
            SetupResult::ConfigurationFailed => write!(f, "configuration failed"),
        }
    }
}

/// Photo or video capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShootingMode {
    #[default]
    Photo,
    Video,
}

impl ShootingMode {
    /// The visual output bound in this mode
    pub fn output(&self) -> OutputKind {
        match self {
            ShootingMode::Photo => OutputKind::Photo,
            ShootingMode::Video => OutputKind::Movie,
        }
    }

    /// Session preset used in this mode
    pub fn preset(&self) -> SessionPreset {
        match self {
            ShootingMode::Photo => SessionPreset::Photo,
            ShootingMode::Video => SessionPreset::High,
        }
    }

    /// The other mode
    pub fn toggled(&self) -> Self {
        match self {
            ShootingMode::Photo => ShootingMode::Video,
            ShootingMode::Video => ShootingMode::Photo,
        }
    }
}

impl fmt::Display for ShootingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShootingMode::Photo => write!(f, "Photo"),
            ShootingMode::Video => write!(f, "Video"),
        }
    }
}

/// Video recording state machine
///
/// `Idle --shutter--> Capturing --shutter--> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Capturing,
}

impl CaptureState {
    /// Check if currently recording
    pub fn is_capturing(&self) -> bool {
        matches!(self, CaptureState::Capturing)
    }

    /// State after a shutter press
    pub fn toggled(&self) -> Self {
        match self {
            CaptureState::Idle => CaptureState::Capturing,
            CaptureState::Capturing => CaptureState::Idle,
        }
    }
}

/// Enablement of the user controls
///
/// Both start disabled until the session is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Controls {
    pub shutter_enabled: bool,
    pub mode_switch_enabled: bool,
}

impl Controls {
    pub fn enabled() -> Self {
        Self {
            shutter_enabled: true,
            mode_switch_enabled: true,
        }
    }
}

/// Devices and output attached to the session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceBindings {
    pub video_input: Option<CaptureDevice>,
    pub audio_input: Option<CaptureDevice>,
    /// Exactly one visual output once configured
    pub output: Option<OutputKind>,
}

impl DeviceBindings {
    /// Whether the bindings match `mode`
    ///
    /// The audio input is only required in video mode when a microphone
    /// could be attached.
    pub fn is_consistent_with(&self, mode: ShootingMode) -> bool {
        let output_matches = self.output == Some(mode.output());
        let audio_matches = match mode {
            ShootingMode::Photo => self.audio_input.is_none(),
            ShootingMode::Video => true,
        };
        output_matches && audio_matches
    }
}

/// Dismissable notice shown when the session cannot run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupNotice {
    CameraNotAuthorized,
    ConfigurationFailed,
}

impl SetupNotice {
    pub fn title(&self) -> &'static str {
        match self {
            SetupNotice::CameraNotAuthorized => "Camera access denied",
            SetupNotice::ConfigurationFailed => "Camera unavailable",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            SetupNotice::CameraNotAuthorized => {
                "snapcam doesn't have permission to use the camera. \
                 Run `snapcam permissions reset` to be asked again."
            }
            SetupNotice::ConfigurationFailed => "Unable to capture media.",
        }
    }
}

/// Updates published to the UI context
#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    /// Control enablement changed
    Controls(Controls),
    /// Shooting mode changed
    Mode(ShootingMode),
    /// Recording started or stopped
    CaptureState(CaptureState),
    /// Final setup outcome once the session has started or failed to
    SetupResolved(SetupResult),
    /// Session cannot run
    Notice(SetupNotice),
    /// Photo written to the library (or failed to be)
    PhotoSaved(AppResult<SavedAsset>),
    /// Photo discarded because library access was refused
    PhotoSaveSkipped,
    /// Video written to the library (or failed to be)
    VideoSaved(AppResult<SavedAsset>),
    /// Capture or recording failed before anything could be saved
    CaptureFailed(AppError),
}

/// Messages processed by the controller task
#[derive(Debug)]
pub enum Message {
    // ===== User actions =====
    /// Shutter pressed
    Shutter,
    /// Mode switch toggled
    SelectMode(ShootingMode),
    /// Stop the session and exit once in-flight work is done
    Shutdown,

    // ===== Permissions =====
    /// Answer to the camera access prompt
    CameraAccessResolved(bool),

    // ===== Session worker =====
    /// Pipeline started
    SessionRunning,
    /// Pipeline not started
    SessionUnavailable(SetupResult),
    /// Mode switch committed
    ModeSwitched {
        mode: ShootingMode,
        bindings: DeviceBindings,
    },
    /// Mode switch failed; `mode` is still active
    ModeSwitchFailed { mode: ShootingMode, error: AppError },

    // ===== Pipeline callbacks =====
    Capture(CaptureEvent),

    // ===== Asset store =====
    PhotoSaved(AppResult<SavedAsset>),
    /// Add-only library access refused
    PhotoSaveDenied,
    VideoSaved(AppResult<SavedAsset>),
}
