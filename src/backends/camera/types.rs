// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Camera backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CameraBackendType {
    /// Synthetic camera and microphone (always available)
    #[default]
    Virtual,
    /// GStreamer device monitor and pipelines
    GStreamer,
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::Virtual => write!(f, "virtual"),
            CameraBackendType::GStreamer => write!(f, "GStreamer"),
        }
    }
}

/// Kind of media a device produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
}

/// Hardware class of a capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    /// Built-in wide-angle camera
    WideAngleCamera,
    /// Built-in or default microphone
    Microphone,
    /// Externally attached device (USB webcam, audio interface)
    External,
}

/// Physical position of a camera relative to the display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DevicePosition {
    Back,
    Front,
    #[default]
    Unspecified,
}

impl DevicePosition {
    /// Parse a location string as reported by libcamera/PipeWire ("back", "front", "external")
    pub fn from_location(location: &str) -> Self {
        match location.trim().to_ascii_lowercase().as_str() {
            "back" | "rear" => DevicePosition::Back,
            "front" => DevicePosition::Front,
            _ => DevicePosition::Unspecified,
        }
    }
}

impl std::fmt::Display for DevicePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DevicePosition::Back => write!(f, "back"),
            DevicePosition::Front => write!(f, "front"),
            DevicePosition::Unspecified => write!(f, "unspecified"),
        }
    }
}

/// Represents a capture device (camera or microphone)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureDevice {
    /// Backend-specific identifier, stable for the lifetime of the directory
    pub id: String,
    pub name: String,
    pub device_type: DeviceType,
    pub media_kind: MediaKind,
    pub position: DevicePosition,
}

/// Visual outputs a session can bind; exactly one is active at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    /// Still photo output
    Photo,
    /// Movie file output
    Movie,
}

impl std::fmt::Display for OutputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputKind::Photo => write!(f, "photo"),
            OutputKind::Movie => write!(f, "movie"),
        }
    }
}

/// Session quality preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPreset {
    /// Full sensor resolution suited for stills
    Photo,
    /// Highest video-friendly resolution
    #[default]
    High,
}

/// Thumbnail encoding embedded alongside a still photo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailFormat {
    Jpeg,
}

/// Settings for a single still capture
///
/// A fresh value is built for every shutter press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoSettings {
    /// Produce an embedded thumbnail in this format
    pub embedded_thumbnail: Option<ThumbnailFormat>,
    /// Capture at full sensor resolution instead of the bounded standard size
    pub high_resolution: bool,
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
}

impl PhotoSettings {
    /// Settings used by the shutter: JPEG thumbnail, standard resolution
    pub fn still(jpeg_quality: u8) -> Self {
        Self {
            embedded_thumbnail: Some(ThumbnailFormat::Jpeg),
            high_resolution: false,
            jpeg_quality,
        }
    }
}

/// Encoded result of a still capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPhoto {
    /// Encoded file representation (JPEG)
    pub data: Vec<u8>,
    /// Encoded thumbnail, when requested; also embedded in `data`
    pub thumbnail: Option<Vec<u8>>,
    pub width: u32,
    pub height: u32,
}

/// Callback events emitted by a capture pipeline
///
/// Photo events arrive in order: `PhotoProcessed` strictly precedes
/// `PhotoCaptureFinished` for the same request.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// Phase 1: photo data produced (or failed)
    PhotoProcessed(BackendResult<CapturedPhoto>),
    /// Phase 2: capture request finished
    PhotoCaptureFinished(BackendResult<()>),
    /// Recording stopped and the movie file was finalized
    RecordingFinished {
        path: PathBuf,
        result: BackendResult<()>,
    },
}

/// Result recipient handed to capture and record requests
pub type CaptureSink = tokio::sync::mpsc::UnboundedSender<CaptureEvent>;

/// A single RGBA preview frame
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA pixels (stride = width * 4)
    pub data: Arc<[u8]>,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
}

impl PreviewFrame {
    /// RGB triple at the given pixel, clamped to the frame bounds
    pub fn rgb_at(&self, x: u32, y: u32) -> (u8, u8, u8) {
        if self.width == 0 || self.height == 0 {
            return (0, 0, 0);
        }
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        let idx = ((y * self.width + x) * 4) as usize;
        match self.data.get(idx..idx + 3) {
            Some(px) => (px[0], px[1], px[2]),
            None => (0, 0, 0),
        }
    }
}

/// Frame receiver type for preview streams
pub type PreviewReceiver = futures::channel::mpsc::Receiver<PreviewFrame>;

/// Frame sender type for preview streams
pub type PreviewSender = futures::channel::mpsc::Sender<PreviewFrame>;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Capture device not found
    DeviceNotFound(String),
    /// Input or output could not be attached
    AttachFailed(String),
    /// Operation requires a running session
    NotRunning,
    /// Operation requires an output that is not bound
    OutputNotBound(OutputKind),
    /// Recording already in progress
    RecordingInProgress,
    /// No recording in progress
    NoRecordingInProgress,
    /// Encoding a photo or movie failed
    EncodingFailed(String),
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::AttachFailed(msg) => write!(f, "Attach failed: {}", msg),
            BackendError::NotRunning => write!(f, "Capture session is not running"),
            BackendError::OutputNotBound(kind) => write!(f, "No {} output bound", kind),
            BackendError::RecordingInProgress => write!(f, "Recording already in progress"),
            BackendError::NoRecordingInProgress => write!(f, "No recording in progress"),
            BackendError::EncodingFailed(msg) => write!(f, "Encoding failed: {}", msg),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_from_location() {
        assert_eq!(DevicePosition::from_location("back"), DevicePosition::Back);
        assert_eq!(DevicePosition::from_location(" Front "), DevicePosition::Front);
        assert_eq!(
            DevicePosition::from_location("external"),
            DevicePosition::Unspecified
        );
    }

    #[test]
    fn still_settings_disable_high_resolution() {
        let settings = PhotoSettings::still(92);
        assert_eq!(settings.embedded_thumbnail, Some(ThumbnailFormat::Jpeg));
        assert!(!settings.high_resolution);
    }

    #[test]
    fn rgb_at_clamps_to_bounds() {
        let frame = PreviewFrame {
            width: 2,
            height: 1,
            data: Arc::from(vec![1, 2, 3, 255, 4, 5, 6, 255].into_boxed_slice()),
            captured_at: Instant::now(),
        };
        assert_eq!(frame.rgb_at(0, 0), (1, 2, 3));
        assert_eq!(frame.rgb_at(10, 10), (4, 5, 6));
    }
}
