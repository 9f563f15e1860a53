// SPDX-License-Identifier: MPL-2.0

//! snapcam - a camera with a photo/video capture controller
//!
//! This library provides a capture controller that previews a live camera
//! feed, captures still photos and records video clips, and saves the
//! results to the user's media library.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`app`]: Capture controller, session worker and state machines
//! - [`backends`]: Camera devices and pipelines, permissions, cues
//! - [`pipelines`]: Photo and video encoding
//! - [`config`]: User configuration handling
//! - [`storage`]: Media library writes
//! - [`terminal`]: Terminal viewfinder
//!
//! # Example
//!
//! ```ignore
//! let (ui_tx, mut ui_rx) = tokio::sync::mpsc::unbounded_channel();
//! let controller = CaptureController::new(collaborators, settings, ui_tx)?;
//! let handle = controller.handle();
//! tokio::spawn(controller.run());
//! handle.shutter();
//! ```

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod pipelines;
pub mod storage;
pub mod terminal;

// Re-export commonly used types
pub use app::{
    CaptureController, CaptureState, Collaborators, ControllerHandle, ControllerSettings,
    SetupResult, ShootingMode, UiUpdate,
};
pub use config::Config;
pub use constants::BitratePreset;
pub use errors::{AppError, AppResult};
