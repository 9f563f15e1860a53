// SPDX-License-Identifier: GPL-3.0-only

//! Still photo encoding
//!
//! Converts an RGBA preview frame into the JPEG file representation handed
//! to the asset store. A requested thumbnail is stored in the file's EXIF
//! block (IFD1), where viewers look for a quick preview.

use crate::backends::camera::{
    BackendError, BackendResult, CapturedPhoto, PhotoSettings, PreviewFrame, ThumbnailFormat,
};
use crate::constants::photo::{STANDARD_MAX_EDGE, THUMBNAIL_EDGE, THUMBNAIL_QUALITY};
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage, RgbaImage};
use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Encoding quality settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EncodingQuality {
    /// Low quality (high compression)
    Low,
    /// Medium quality (balanced)
    Medium,
    /// High quality (low compression)
    #[default]
    High,
    /// Maximum quality (minimal compression)
    Maximum,
}

impl EncodingQuality {
    /// Get JPEG quality value (0-100)
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            EncodingQuality::Low => 60,
            EncodingQuality::Medium => 80,
            EncodingQuality::High => 92,
            EncodingQuality::Maximum => 98,
        }
    }
}

/// Encode a frame according to the capture settings
pub fn encode_still(frame: &PreviewFrame, settings: &PhotoSettings) -> BackendResult<CapturedPhoto> {
    let rgba = RgbaImage::from_raw(frame.width, frame.height, frame.data.to_vec()).ok_or_else(
        || {
            BackendError::EncodingFailed(format!(
                "frame buffer does not match {}x{} RGBA",
                frame.width, frame.height
            ))
        },
    )?;
    let mut rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();

    if !settings.high_resolution {
        let (width, height) = bounded_size(rgb.width(), rgb.height(), STANDARD_MAX_EDGE);
        if (width, height) != rgb.dimensions() {
            debug!(width, height, "Bounding still to standard resolution");
            rgb = image::imageops::resize(&rgb, width, height, FilterType::Triangle);
        }
    }

    let mut data = encode_jpeg(&rgb, settings.jpeg_quality)?;

    let thumbnail = match settings.embedded_thumbnail {
        Some(ThumbnailFormat::Jpeg) => {
            let (width, height) = bounded_size(rgb.width(), rgb.height(), THUMBNAIL_EDGE);
            let small = image::imageops::thumbnail(&rgb, width, height);
            Some(encode_jpeg(&small, THUMBNAIL_QUALITY)?)
        }
        None => None,
    };
    if let Some(thumbnail) = &thumbnail {
        data = embed_thumbnail(data, thumbnail)?;
    }

    debug!(
        width = rgb.width(),
        height = rgb.height(),
        bytes = data.len(),
        thumbnail = thumbnail.is_some(),
        "Encoded still photo"
    );

    Ok(CapturedPhoto {
        data,
        thumbnail,
        width: rgb.width(),
        height: rgb.height(),
    })
}

/// Encode an RGB image as JPEG
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> BackendResult<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
        encoder
            .encode_image(image)
            .map_err(|e| BackendError::EncodingFailed(e.to_string()))?;
    }
    Ok(out)
}

/// Largest EXIF payload that fits one APP1 segment
const MAX_EXIF_LEN: usize = 65_533 - 6;

/// Store a JPEG thumbnail in the EXIF block of `photo`
///
/// Oversized thumbnails are left out rather than failing the capture.
pub fn embed_thumbnail(photo: Vec<u8>, thumbnail: &[u8]) -> BackendResult<Vec<u8>> {
    let exif = exif_with_thumbnail(thumbnail);
    if exif.len() > MAX_EXIF_LEN {
        warn!(bytes = thumbnail.len(), "Thumbnail too large for EXIF, not embedding");
        return Ok(photo);
    }

    let mut jpeg = Jpeg::from_bytes(Bytes::from(photo))
        .map_err(|e| BackendError::EncodingFailed(format!("JPEG structure: {}", e)))?;
    jpeg.set_exif(Some(Bytes::from(exif)));

    let mut out = Vec::new();
    jpeg.encoder()
        .write_to(&mut out)
        .map_err(|e| BackendError::EncodingFailed(e.to_string()))?;
    Ok(out)
}

/// Little-endian TIFF with an empty IFD0 and a JPEG thumbnail IFD1
fn exif_with_thumbnail(thumbnail: &[u8]) -> Vec<u8> {
    const TYPE_SHORT: u16 = 3;
    const TYPE_LONG: u16 = 4;
    const TAG_COMPRESSION: u16 = 0x0103;
    const TAG_THUMBNAIL_OFFSET: u16 = 0x0201;
    const TAG_THUMBNAIL_LENGTH: u16 = 0x0202;
    const COMPRESSION_JPEG: u32 = 6;

    // header (8) + IFD0 (2 + 4) + IFD1 (2 + 3 * 12 + 4)
    const IFD0_OFFSET: u32 = 8;
    const IFD1_OFFSET: u32 = IFD0_OFFSET + 6;
    const THUMBNAIL_OFFSET: u32 = IFD1_OFFSET + 42;

    fn entry(out: &mut Vec<u8>, tag: u16, kind: u16, value: u32) {
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&value.to_le_bytes());
    }

    let mut out = Vec::with_capacity(THUMBNAIL_OFFSET as usize + thumbnail.len());
    out.extend_from_slice(b"II");
    out.extend_from_slice(&42u16.to_le_bytes());
    out.extend_from_slice(&IFD0_OFFSET.to_le_bytes());

    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&IFD1_OFFSET.to_le_bytes());

    out.extend_from_slice(&3u16.to_le_bytes());
    entry(&mut out, TAG_COMPRESSION, TYPE_SHORT, COMPRESSION_JPEG);
    entry(&mut out, TAG_THUMBNAIL_OFFSET, TYPE_LONG, THUMBNAIL_OFFSET);
    entry(&mut out, TAG_THUMBNAIL_LENGTH, TYPE_LONG, thumbnail.len() as u32);
    out.extend_from_slice(&0u32.to_le_bytes());

    debug_assert_eq!(out.len(), THUMBNAIL_OFFSET as usize);
    out.extend_from_slice(thumbnail);
    out
}

/// Scale dimensions down so the long edge is at most `max_edge`
fn bounded_size(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let long_edge = width.max(height);
    if long_edge <= max_edge || long_edge == 0 {
        return (width, height);
    }
    let scale = max_edge as f64 / long_edge as f64;
    (
        ((width as f64 * scale).round() as u32).max(1),
        ((height as f64 * scale).round() as u32).max(1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    fn solid_frame(width: u32, height: u32) -> PreviewFrame {
        let data: Vec<u8> = std::iter::repeat([200u8, 40, 40, 255])
            .take((width * height) as usize)
            .flatten()
            .collect();
        PreviewFrame {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn test_jpeg_quality_values() {
        assert_eq!(EncodingQuality::Low.jpeg_quality(), 60);
        assert_eq!(EncodingQuality::Medium.jpeg_quality(), 80);
        assert_eq!(EncodingQuality::High.jpeg_quality(), 92);
        assert_eq!(EncodingQuality::Maximum.jpeg_quality(), 98);
    }

    #[test]
    fn test_bounded_size() {
        assert_eq!(bounded_size(640, 480, 1920), (640, 480));
        assert_eq!(bounded_size(3840, 2160, 1920), (1920, 1080));
        assert_eq!(bounded_size(1000, 4000, 160), (40, 160));
    }

    #[test]
    fn test_still_is_jpeg_with_thumbnail() {
        let photo = encode_still(&solid_frame(64, 48), &PhotoSettings::still(90)).unwrap();
        assert_eq!(&photo.data[..2], &[0xFF, 0xD8]);
        assert_eq!((photo.width, photo.height), (64, 48));

        let thumbnail = photo.thumbnail.expect("thumbnail requested");
        let decoded = image::load_from_memory(&thumbnail).unwrap();
        assert!(decoded.width() <= THUMBNAIL_EDGE && decoded.height() <= THUMBNAIL_EDGE);
    }

    /// Thumbnail bytes referenced by the IFD1 offset and length tags
    fn exif_thumbnail(exif: &[u8]) -> &[u8] {
        let u16_at = |at: usize| u16::from_le_bytes([exif[at], exif[at + 1]]);
        let u32_at = |at: usize| {
            u32::from_le_bytes([exif[at], exif[at + 1], exif[at + 2], exif[at + 3]]) as usize
        };
        assert_eq!(&exif[..4], b"II*\0");

        let ifd0 = u32_at(4);
        let ifd1 = u32_at(ifd0 + 2 + 12 * u16_at(ifd0) as usize);
        let (mut offset, mut length) = (None, None);
        for i in 0..u16_at(ifd1) as usize {
            let entry = ifd1 + 2 + 12 * i;
            match u16_at(entry) {
                0x0201 => offset = Some(u32_at(entry + 8)),
                0x0202 => length = Some(u32_at(entry + 8)),
                _ => {}
            }
        }
        let offset = offset.expect("thumbnail offset tag");
        &exif[offset..offset + length.expect("thumbnail length tag")]
    }

    #[test]
    fn test_thumbnail_is_embedded_in_exif() {
        let photo = encode_still(&solid_frame(640, 480), &PhotoSettings::still(90)).unwrap();
        let thumbnail = photo.thumbnail.clone().unwrap();

        let jpeg = Jpeg::from_bytes(Bytes::from(photo.data.clone())).unwrap();
        let exif = jpeg.exif().expect("EXIF block");
        assert_eq!(exif_thumbnail(&exif), thumbnail.as_slice());

        // The photo itself still decodes at full size
        let decoded = image::load_from_memory(&photo.data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (640, 480));
    }

    #[test]
    fn test_no_exif_without_thumbnail() {
        let settings = PhotoSettings {
            embedded_thumbnail: None,
            ..PhotoSettings::still(80)
        };
        let photo = encode_still(&solid_frame(32, 24), &settings).unwrap();
        let jpeg = Jpeg::from_bytes(Bytes::from(photo.data)).unwrap();
        assert!(jpeg.exif().is_none());
    }

    #[test]
    fn test_oversized_thumbnail_is_skipped() {
        let rgb = RgbImage::from_pixel(8, 8, image::Rgb([10, 20, 30]));
        let photo = encode_jpeg(&rgb, 80).unwrap();
        let huge = vec![0u8; MAX_EXIF_LEN];
        assert_eq!(embed_thumbnail(photo.clone(), &huge).unwrap(), photo);
    }

    #[test]
    fn test_standard_resolution_is_bounded() {
        let settings = PhotoSettings::still(80);
        let photo = encode_still(&solid_frame(2400, 1200), &settings).unwrap();
        assert_eq!((photo.width, photo.height), (1920, 960));

        let settings = PhotoSettings {
            high_resolution: true,
            embedded_thumbnail: None,
            ..settings
        };
        let photo = encode_still(&solid_frame(2400, 1200), &settings).unwrap();
        assert_eq!((photo.width, photo.height), (2400, 1200));
        assert!(photo.thumbnail.is_none());
    }

    #[test]
    fn test_mismatched_buffer_is_rejected() {
        let mut frame = solid_frame(4, 4);
        frame.width = 8;
        assert!(matches!(
            encode_still(&frame, &PhotoSettings::still(80)),
            Err(BackendError::EncodingFailed(_))
        ));
    }
}
