// SPDX-License-Identifier: MPL-2.0

//! Motion-JPEG movie writer
//!
//! Writes each frame as a complete JPEG image, back to back, into a single
//! file. The result plays in GStreamer (`jpegparse`), ffmpeg and mpv.

use crate::backends::camera::{BackendError, BackendResult, PreviewFrame};
use crate::pipelines::photo::encode_jpeg;
use image::{DynamicImage, RgbaImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File extension of Motion-JPEG streams
pub const MJPEG_EXTENSION: &str = "mjpeg";

/// Streaming Motion-JPEG writer
pub struct MjpegWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    quality: u8,
    frames: u64,
}

impl MjpegWriter {
    /// Create (or truncate) the output file
    pub fn create(path: &Path, quality: u8) -> BackendResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        info!(path = %path.display(), "Motion-JPEG recording opened");
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            quality,
            frames: 0,
        })
    }

    /// Append one frame
    pub fn write_frame(&mut self, frame: &PreviewFrame) -> BackendResult<()> {
        let rgba = RgbaImage::from_raw(frame.width, frame.height, frame.data.to_vec())
            .ok_or_else(|| BackendError::EncodingFailed("frame size mismatch".to_string()))?;
        let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();
        let jpeg = encode_jpeg(&rgb, self.quality)?;
        self.writer.write_all(&jpeg)?;
        self.frames += 1;
        Ok(())
    }

    /// Number of frames written so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Flush and close the file
    pub fn finish(mut self) -> BackendResult<PathBuf> {
        self.writer.flush()?;
        debug!(path = %self.path.display(), frames = self.frames, "Motion-JPEG recording finalized");
        Ok(self.path)
    }
}
