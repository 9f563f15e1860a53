// SPDX-License-Identifier: MPL-2.0

//! Collaborators of the capture controller
//!
//! This module provides the platform-facing implementations for:
//! - Capture devices and sessions (virtual or GStreamer)
//! - Camera and photo library permissions
//! - Audible recording cues
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              CaptureController               │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌─────────────┐    ┌──────────────────┐   │
//! │  │ Permissions │    │     Camera       │   │
//! │  │ (GrantStore)│    │ (Virtual / Gst)  │   │
//! │  └─────────────┘    └──────────────────┘   │
//! │  ┌─────────────┐                            │
//! │  │    Cues     │                            │
//! │  └─────────────┘                            │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Device directory and capture pipeline traits, backend selection
//! - [`cues`]: Recording start/stop cues
//! - [`permissions`]: Authorization status and access prompts
//! - [`virtual_camera`]: Synthetic camera and microphone

pub mod camera;
pub mod cues;
pub mod permissions;
pub mod virtual_camera;
