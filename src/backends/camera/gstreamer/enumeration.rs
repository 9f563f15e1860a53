// SPDX-License-Identifier: MPL-2.0

//! Device discovery via the GStreamer device monitor

use super::init;
use crate::backends::camera::types::*;
use crate::backends::camera::DeviceDirectory;
use ::gstreamer as gst;
use gst::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Property carrying the mounting position reported by libcamera
const LOCATION_PROPERTY: &str = "api.libcamera.location";

/// Properties tried, in order, for a stable device identifier
const ID_PROPERTIES: [&str; 3] = ["object.path", "device.path", "api.v4l2.path"];

/// Cameras and microphones found at construction
pub struct GstDeviceDirectory {
    devices: Vec<CaptureDevice>,
    handles: HashMap<String, gst::Device>,
}

impl GstDeviceDirectory {
    /// Probe video and audio sources once
    pub fn new() -> BackendResult<Self> {
        init()?;

        let monitor = gst::DeviceMonitor::new();
        monitor.add_filter(Some("Video/Source"), None);
        monitor.add_filter(Some("Audio/Source"), None);
        monitor
            .start()
            .map_err(|e| BackendError::NotAvailable(format!("device monitor: {}", e)))?;
        let found = monitor.devices();
        monitor.stop();

        let mut devices = Vec::new();
        let mut handles = HashMap::new();
        for (index, device) in found.into_iter().enumerate() {
            let Some(info) = describe(&device, index) else {
                continue;
            };
            debug!(
                id = %info.id,
                name = %info.name,
                kind = ?info.media_kind,
                position = %info.position,
                "Found device"
            );
            handles.insert(info.id.clone(), device);
            devices.push(info);
        }

        info!(count = devices.len(), "GStreamer devices enumerated");
        Ok(Self { devices, handles })
    }

    /// Source element reading from the device
    pub fn create_element(&self, device: &CaptureDevice) -> BackendResult<gst::Element> {
        let handle = self
            .handles
            .get(&device.id)
            .ok_or_else(|| BackendError::DeviceNotFound(device.id.clone()))?;
        handle.create_element(None).map_err(|e| {
            BackendError::AttachFailed(format!("{}: {}", device.name, e))
        })
    }

    /// Whether the device came from this directory
    pub fn contains(&self, device: &CaptureDevice) -> bool {
        self.handles.contains_key(&device.id)
    }
}

impl DeviceDirectory for GstDeviceDirectory {
    fn devices(&self) -> Vec<CaptureDevice> {
        self.devices.clone()
    }
}

fn describe(device: &gst::Device, index: usize) -> Option<CaptureDevice> {
    let class = device.device_class();
    let media_kind = media_kind_for_class(&class)?;
    let properties = device.properties();

    let id = properties
        .as_ref()
        .and_then(|p| {
            ID_PROPERTIES
                .iter()
                .find_map(|key| p.get::<String>(*key).ok())
        })
        .unwrap_or_else(|| format!("gst:{}", index));

    let (device_type, position) = match media_kind {
        MediaKind::Video => {
            let location = properties
                .as_ref()
                .and_then(|p| p.get::<String>(LOCATION_PROPERTY).ok());
            (DeviceType::WideAngleCamera, position_for_location(location.as_deref()))
        }
        MediaKind::Audio => (DeviceType::Microphone, DevicePosition::Unspecified),
    };

    Some(CaptureDevice {
        id,
        name: device.display_name().to_string(),
        device_type,
        media_kind,
        position,
    })
}

fn media_kind_for_class(class: &str) -> Option<MediaKind> {
    if class.starts_with("Video/Source") {
        Some(MediaKind::Video)
    } else if class.starts_with("Audio/Source") {
        Some(MediaKind::Audio)
    } else {
        warn!(class, "Ignoring device of unexpected class");
        None
    }
}

/// Front cameras are only those reported as such; everything else is
/// treated as the back camera
fn position_for_location(location: Option<&str>) -> DevicePosition {
    match location {
        Some("front") => DevicePosition::Front,
        _ => DevicePosition::Back,
    }
}
