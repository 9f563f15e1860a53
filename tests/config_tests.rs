// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use snapcam::Config;
use snapcam::backends::camera::CameraBackendType;
use snapcam::pipelines::photo::EncodingQuality;
use std::path::PathBuf;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.backend, CameraBackendType::Virtual);
    assert_eq!(config.library_folder, "Camera");
    assert!(config.recording_cues, "Recording cues should be on by default");
}

#[test]
fn test_config_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let config = Config {
        photo_quality: EncodingQuality::Maximum,
        recording_cues: false,
        ..Config::default()
    };
    config.save_to(&path).unwrap();

    assert_eq!(Config::load_from(&path).unwrap(), config);
}

#[test]
fn test_config_partial_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "backend": "GStreamer" }"#).unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.backend, CameraBackendType::GStreamer);
    assert_eq!(config.photo_quality, EncodingQuality::High);
}

#[test]
fn test_config_invalid_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "not json").unwrap();

    assert!(Config::load_from(&path).is_err());
}

#[test]
fn test_directory_overrides() {
    let config = Config {
        photo_directory: Some(PathBuf::from("/data/photos")),
        temp_directory: Some(PathBuf::from("/scratch")),
        ..Config::default()
    };

    assert_eq!(config.photo_dir(), PathBuf::from("/data/photos"));
    assert_eq!(config.temp_dir(), PathBuf::from("/scratch"));
    assert!(config.video_dir().ends_with("Camera"));
}
