// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};

/// Video encoder bitrate presets
///
/// These presets define the target bitrate for video encoding based on resolution.
/// Used by the GStreamer recorder; the Motion-JPEG writer is quality driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BitratePreset {
    /// Low bitrate - smaller files, reduced quality
    Low,
    /// Medium bitrate - balanced quality and file size (default)
    #[default]
    Medium,
    /// High bitrate - larger files, better quality
    High,
}

impl BitratePreset {
    /// Get all preset variants for UI iteration
    pub const ALL: [BitratePreset; 3] = [
        BitratePreset::Low,
        BitratePreset::Medium,
        BitratePreset::High,
    ];

    /// Get display name for the preset
    pub fn display_name(&self) -> &'static str {
        match self {
            BitratePreset::Low => "Low",
            BitratePreset::Medium => "Medium",
            BitratePreset::High => "High",
        }
    }

    /// Get bitrate in kbps for a given frame width
    ///
    /// - SD (640x480): Low=1, Medium=2, High=4 Mbps
    /// - HD (1280x720): Low=2.5, Medium=5, High=10 Mbps
    /// - Full HD (1920x1080): Low=4, Medium=8, High=16 Mbps
    /// - 4K (3840x2160): Low=15, Medium=30, High=50 Mbps
    pub fn bitrate_kbps(&self, width: u32) -> u32 {
        match (get_resolution_tier(width), self) {
            (ResolutionTier::SD, BitratePreset::Low) => 1_000,
            (ResolutionTier::SD, BitratePreset::Medium) => 2_000,
            (ResolutionTier::SD, BitratePreset::High) => 4_000,
            (ResolutionTier::HD, BitratePreset::Low) => 2_500,
            (ResolutionTier::HD, BitratePreset::Medium) => 5_000,
            (ResolutionTier::HD, BitratePreset::High) => 10_000,
            (ResolutionTier::FullHD, BitratePreset::Low) => 4_000,
            (ResolutionTier::FullHD, BitratePreset::Medium) => 8_000,
            (ResolutionTier::FullHD, BitratePreset::High) => 16_000,
            (ResolutionTier::FourK, BitratePreset::Low) => 15_000,
            (ResolutionTier::FourK, BitratePreset::Medium) => 30_000,
            (ResolutionTier::FourK, BitratePreset::High) => 50_000,
        }
    }
}

/// Resolution tiers for bitrate calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    /// SD: 640x480 and below
    SD,
    /// HD: 1280x720
    HD,
    /// Full HD: 1920x1080 up to 2K
    FullHD,
    /// 4K: 3840x2160 and above
    FourK,
}

/// Get the resolution tier for a given width
pub fn get_resolution_tier(width: u32) -> ResolutionTier {
    match width {
        w if w >= 3840 => ResolutionTier::FourK,
        w if w >= 1920 => ResolutionTier::FullHD,
        w if w >= 1280 => ResolutionTier::HD,
        _ => ResolutionTier::SD,
    }
}

/// Format bitrate for display (e.g., "8 Mbps" or "2.5 Mbps")
pub fn format_bitrate(kbps: u32) -> String {
    let mbps = kbps as f64 / 1000.0;
    if mbps == mbps.floor() {
        format!("{} Mbps", mbps as u32)
    } else {
        format!("{:.1} Mbps", mbps)
    }
}

/// Still photo encoding limits
pub mod photo {
    /// Long edge of a still when high-resolution capture is disabled
    pub const STANDARD_MAX_EDGE: u32 = 1920;

    /// Long edge of the embedded thumbnail
    pub const THUMBNAIL_EDGE: u32 = 160;

    /// JPEG quality of the embedded thumbnail
    pub const THUMBNAIL_QUALITY: u8 = 80;
}

/// Library and temporary file naming
pub mod storage {
    /// Default folder name for saving photos and videos
    pub const DEFAULT_SAVE_FOLDER: &str = "Camera";

    /// File name prefix of photo assets
    pub const PHOTO_PREFIX: &str = "IMG";

    /// File name prefix of video assets
    pub const VIDEO_PREFIX: &str = "VID";

    /// Directory under the system temp dir holding in-progress recordings
    pub const TEMP_DIR_NAME: &str = "snapcam";

    /// Application directory under the user config dir
    pub const CONFIG_DIR_NAME: &str = "snapcam";

    /// Configuration file name
    pub const CONFIG_FILE: &str = "config.json";

    /// Permission grants file name
    pub const PERMISSIONS_FILE: &str = "permissions.json";
}

/// Virtual camera constants
pub mod virtual_camera {
    use std::time::Duration;

    /// Frame interval of the synthetic camera (~15fps)
    pub const FRAME_INTERVAL: Duration = Duration::from_millis(66);

    /// Frame size under the photo preset
    pub const PHOTO_FRAME_SIZE: (u32, u32) = (640, 480);

    /// Frame size under the high preset
    pub const HIGH_FRAME_SIZE: (u32, u32) = (640, 360);

    /// JPEG quality of recorded Motion-JPEG frames
    pub const RECORDING_QUALITY: u8 = 85;
}

/// GStreamer pipeline constants
pub mod pipeline {
    /// Maximum buffer queue size (keep small for low latency)
    pub const MAX_BUFFERS: u32 = 2;

    /// Output pixel format for appsink
    pub const OUTPUT_FORMAT: &str = "RGBA";

    /// Movie container extension written by the recorder
    pub const MOVIE_EXTENSION: &str = "mp4";

    /// Preview and still size under the photo preset
    pub const PHOTO_FRAME_SIZE: (u32, u32) = (1920, 1080);

    /// Preview and recording size under the high preset
    pub const HIGH_FRAME_SIZE: (u32, u32) = (1280, 720);

    /// Nominal framerate advertised to the recorder
    pub const RECORDING_FRAMERATE: i32 = 30;

    /// Audio encoders in order of preference (AAC for MP4)
    pub const AUDIO_ENCODERS: [&str; 2] = ["avenc_aac", "voaacenc"];
}

/// Timing constants
pub mod timing {
    /// Wait for EOS to drain through the recorder on stop
    pub const EOS_TIMEOUT_SECS: u64 = 5;

    /// CLI wait for a capture to be written to the library
    pub const SAVE_TIMEOUT_SECS: u64 = 30;

    /// Terminal input poll interval
    pub const UI_POLL_MS: u64 = 16;
}
