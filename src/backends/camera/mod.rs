// SPDX-License-Identifier: MPL-2.0

//! Camera backend abstraction
//!
//! A backend provides two collaborators of the capture controller:
//!
//! ```text
//! ┌──────────────────────┐
//! │  CaptureController   │
//! └──────┬────────┬──────┘
//!        │        │
//!        ▼        ▼
//! ┌────────────┐ ┌─────────────────┐
//! │ Device     │ │ CapturePipeline │  ← owned by the session worker
//! │ Directory  │ │ (transactional) │
//! └────────────┘ └─────────────────┘
//!        │        │
//!        ▼        ▼
//!   ┌─────────┐ ┌───────────┐
//!   │ Virtual │ │ GStreamer │
//!   └─────────┘ └───────────┘
//! ```

#[cfg(feature = "gstreamer")]
pub mod gstreamer;
pub mod types;

pub use types::*;

use crate::constants::BitratePreset;
use std::path::Path;
use std::sync::Arc;

/// Enumerates capture hardware
pub trait DeviceDirectory: Send + Sync {
    /// All devices known to this directory
    fn devices(&self) -> Vec<CaptureDevice>;

    /// The default device matching type, media kind and position
    fn default_device(
        &self,
        device_type: DeviceType,
        media_kind: MediaKind,
        position: DevicePosition,
    ) -> Option<CaptureDevice> {
        self.devices().into_iter().find(|device| {
            device.device_type == device_type
                && device.media_kind == media_kind
                && device.position == position
        })
    }
}

/// Capture session binding inputs to outputs
///
/// Input and output changes made between [`begin_configuration`] and
/// [`commit_configuration`] are applied together at commit. Capture and
/// record requests report their results asynchronously through the
/// [`CaptureSink`] they are given, never through the return value.
///
/// [`begin_configuration`]: CapturePipeline::begin_configuration
/// [`commit_configuration`]: CapturePipeline::commit_configuration
pub trait CapturePipeline: Send {
    // ===== Configuration =====

    /// Open a configuration transaction
    fn begin_configuration(&mut self);

    /// Apply all changes made since [`CapturePipeline::begin_configuration`]
    fn commit_configuration(&mut self) -> BackendResult<()>;

    /// Whether the device can be attached as an input
    fn can_add_input(&self, device: &CaptureDevice) -> bool;

    /// Attach a device as an input
    fn add_input(&mut self, device: &CaptureDevice) -> BackendResult<()>;

    /// Detach an input (no-op if not attached)
    fn remove_input(&mut self, device: &CaptureDevice);

    /// Whether the output can be attached
    fn can_add_output(&self, output: OutputKind) -> bool;

    /// Attach an output
    fn add_output(&mut self, output: OutputKind) -> BackendResult<()>;

    /// Detach an output (no-op if not attached)
    fn remove_output(&mut self, output: OutputKind);

    /// Set the capture quality preset
    fn set_preset(&mut self, preset: SessionPreset);

    /// Route preview frames to a display surface
    fn attach_preview(&mut self, sink: PreviewSender);

    // ===== Lifecycle =====

    /// Start delivering frames
    fn start_running(&mut self) -> BackendResult<()>;

    /// Stop delivering frames and end any active recording
    fn stop_running(&mut self);

    /// Check if the session is running
    fn is_running(&self) -> bool;

    // ===== Capture =====

    /// Capture a single still; emits `PhotoProcessed` then `PhotoCaptureFinished`
    fn capture_photo(&mut self, settings: PhotoSettings, sink: CaptureSink);

    /// Start recording to `path`; emits `RecordingFinished` once stopped
    fn start_recording(&mut self, path: &Path, sink: CaptureSink);

    /// Stop the active recording
    fn stop_recording(&mut self);

    /// File extension of the movies this pipeline writes
    fn movie_extension(&self) -> &'static str;
}

/// A device directory paired with a pipeline that can open its devices
pub struct CameraBackend {
    pub directory: Arc<dyn DeviceDirectory>,
    pub pipeline: Box<dyn CapturePipeline>,
}

/// Create the collaborators for a backend type
///
/// `bitrate` applies to backends that encode with a target bitrate.
pub fn get_backend(
    backend_type: CameraBackendType,
    bitrate: BitratePreset,
) -> BackendResult<CameraBackend> {
    match backend_type {
        CameraBackendType::Virtual => {
            let directory = Arc::new(crate::backends::virtual_camera::VirtualDirectory::new());
            Ok(CameraBackend {
                directory,
                pipeline: Box::new(crate::backends::virtual_camera::VirtualPipeline::new()),
            })
        }
        #[cfg(feature = "gstreamer")]
        CameraBackendType::GStreamer => {
            let directory = Arc::new(gstreamer::GstDeviceDirectory::new()?);
            let pipeline = gstreamer::GstPipeline::new(Arc::clone(&directory), bitrate);
            Ok(CameraBackend {
                directory,
                pipeline: Box::new(pipeline),
            })
        }
        #[cfg(not(feature = "gstreamer"))]
        CameraBackendType::GStreamer => {
            let _ = bitrate;
            Err(BackendError::NotAvailable(
                "built without the `gstreamer` feature".to_string(),
            ))
        }
    }
}
