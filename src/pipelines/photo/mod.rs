// SPDX-License-Identifier: MPL-2.0

//! Still photo pipeline
//!
//! ```text
//! Latest RGBA frame → bound to standard size → JPEG (+ EXIF thumbnail)
//! ```
//!
//! Encoding runs on the backend's capture thread so the session worker and
//! the preview are never blocked by a shutter press.

pub mod encoding;

pub use encoding::{EncodingQuality, embed_thumbnail, encode_jpeg, encode_still};
