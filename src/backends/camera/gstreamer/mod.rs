// SPDX-License-Identifier: MPL-2.0

//! GStreamer camera backend
//!
//! Devices are discovered through a `DeviceMonitor` and opened with the
//! source element each device provides.
//!
//! ```text
//! camera src ─▶ videoconvert ─▶ videoscale ─▶ capsfilter (RGBA) ─▶ appsink
//!                                                                    │
//!                                 preview sender ◀── latest frame ◀──┤
//!                                                                    ▼
//! appsrc ─▶ videoconvert ─▶ x264enc ─▶ h264parse ─▶ mp4mux ─▶ filesink
//! mic src ─▶ audioconvert ─▶ audioresample ─▶ AAC encoder ──┘
//! ```

mod enumeration;
mod pipeline;

pub use enumeration::GstDeviceDirectory;
pub use pipeline::GstPipeline;

use super::{BackendError, BackendResult};
use ::gstreamer as gst;

/// Initialize GStreamer (idempotent)
fn init() -> BackendResult<()> {
    gst::init().map_err(|e| BackendError::NotAvailable(format!("GStreamer: {}", e)))
}

/// Create an element from a factory name
fn make_element(factory: &str) -> BackendResult<gst::Element> {
    gst::ElementFactory::make(factory)
        .build()
        .map_err(|e| BackendError::NotAvailable(format!("Failed to create {}: {}", factory, e)))
}
