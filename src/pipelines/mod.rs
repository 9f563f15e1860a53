// SPDX-License-Identifier: MPL-2.0

//! Encoding pipelines shared by the camera backends
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ RGBA Frame   │ ──▶ │  Photo Pipeline   │ ──▶ │  JPEG bytes  │
//! │              │     │  - bound size     │     │  + thumbnail │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//!
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ RGBA Frames  │ ──▶ │  Video Pipeline   │ ──▶ │ Motion-JPEG  │
//! │              │     │  - per-frame JPEG │     │  temp file   │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! - [`photo`]: JPEG encoding of still captures
//! - [`video`]: Motion-JPEG movie writer used by the virtual backend

pub mod photo;
pub mod video;
