// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for camera operations
//!
//! This module provides command-line functionality for:
//! - Listing available cameras and microphones
//! - Taking photos and recording videos through the capture controller
//! - Managing permission grants and the configuration file

use snapcam::app::{
    CaptureController, Collaborators, ControllerHandle, ControllerSettings, ShootingMode,
    UiUpdate,
};
use snapcam::backends::camera::get_backend;
use snapcam::backends::permissions::{
    AccessPrompter, AutoGrant, GrantStore, PermissionAuthority, PermissionScope, StdinPrompter,
};
use snapcam::constants::pipeline::HIGH_FRAME_SIZE;
use snapcam::constants::timing::SAVE_TIMEOUT_SECS;
use snapcam::constants::{BitratePreset, format_bitrate};
use snapcam::storage::SavedAsset;
use snapcam::{AppResult, Config};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// List all available devices
pub fn list_devices(config: &Config) -> CliResult {
    let backend = get_backend(config.backend, config.bitrate_preset)?;
    let devices = backend.directory.devices();

    if devices.is_empty() {
        println!("No devices found.");
        return Ok(());
    }

    println!("Available devices ({} backend):", config.backend);
    println!();
    for (index, device) in devices.iter().enumerate() {
        println!("  [{}] {}", index, device.name);
        println!(
            "      {:?} {:?}, position: {}",
            device.media_kind, device.device_type, device.position
        );
        println!("      id: {}", device.id);
    }

    Ok(())
}

/// Take a photo through the controller
pub fn take_photo(config: &Config, auto_grant: bool) -> CliResult {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let mut session = HeadlessSession::start(config, auto_grant)?;
        session.wait_until_ready().await?;

        println!("Capturing...");
        session.handle.shutter();
        let saved = session
            .wait_for(|update| match update {
                UiUpdate::PhotoSaved(result) => Some(result),
                UiUpdate::PhotoSaveSkipped => Some(Err(snapcam::AppError::PermissionDenied(
                    "photo library access not granted".to_string(),
                ))),
                UiUpdate::CaptureFailed(e) => Some(Err(e)),
                _ => None,
            })
            .await?;

        session.stop().await;
        report_saved(saved)
    })
}

/// Record a video through the controller
pub fn record_video(config: &Config, auto_grant: bool, duration: u64) -> CliResult {
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = Arc::clone(&stop_flag);
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let mut session = HeadlessSession::start(config, auto_grant)?;
        session.wait_until_ready().await?;

        session.handle.select_mode(ShootingMode::Video);
        let mode = session
            .wait_for(|update| match update {
                UiUpdate::Mode(mode) => Some(mode),
                _ => None,
            })
            .await?;
        if mode != ShootingMode::Video {
            session.stop().await;
            return Err("failed to switch to video mode".into());
        }
        session.wait_until_ready().await?;

        println!("Duration: {} seconds", duration);
        session.handle.shutter();
        println!("Recording... (Ctrl+C to stop)");

        let start = Instant::now();
        let target_duration = Duration::from_secs(duration);
        while start.elapsed() < target_duration {
            if stop_flag.load(Ordering::SeqCst) {
                println!();
                println!("Stopping early...");
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        session.handle.shutter();
        println!("Saving...");
        let saved = session
            .wait_for(|update| match update {
                UiUpdate::VideoSaved(result) => Some(result),
                _ => None,
            })
            .await?;

        session.stop().await;
        report_saved(saved)
    })
}

/// Show camera and library access decisions
pub fn show_permissions() -> CliResult {
    let store = GrantStore::open_default(Arc::new(AutoGrant));
    for scope in [PermissionScope::Camera, PermissionScope::PhotoLibrary] {
        println!("{}: {}", scope, store.authorization_status(scope));
    }
    Ok(())
}

/// Forget access decisions
pub fn reset_permissions() -> CliResult {
    GrantStore::open_default(Arc::new(AutoGrant)).reset()?;
    println!("Permissions reset. You will be asked again on next launch.");
    Ok(())
}

/// Write the default configuration file if none exists
pub fn init_config() -> CliResult {
    let path = Config::default_path().ok_or("no config directory")?;
    if path.exists() {
        println!("Config already exists: {}", path.display());
        return Ok(());
    }
    Config::default().save_to(&path)?;
    println!("Config written: {}", path.display());
    Ok(())
}

/// Print the effective configuration
pub fn show_config(config: &Config) -> CliResult {
    println!("{}", serde_json::to_string_pretty(config)?);
    println!();
    println!("Photos: {}", config.photo_dir().display());
    println!("Videos: {}", config.video_dir().display());
    println!("Temp:   {}", config.temp_dir().display());

    let (width, _) = HIGH_FRAME_SIZE;
    println!(
        "Bitrate: {} ({} at {}px wide)",
        config.bitrate_preset.display_name(),
        format_bitrate(config.bitrate_preset.bitrate_kbps(width)),
        width
    );
    let presets: Vec<&str> = BitratePreset::ALL.iter().map(|p| p.display_name()).collect();
    println!("         available: {}", presets.join(", "));
    Ok(())
}

fn report_saved(saved: AppResult<SavedAsset>) -> CliResult {
    let asset = saved?;
    println!("{} saved: {}", asset.kind, asset.path.display());
    Ok(())
}

/// Controller running without a viewfinder
struct HeadlessSession {
    handle: ControllerHandle,
    updates: UnboundedReceiver<UiUpdate>,
    task: tokio::task::JoinHandle<()>,
}

impl HeadlessSession {
    fn start(config: &Config, auto_grant: bool) -> Result<Self, Box<dyn std::error::Error>> {
        let prompter: Arc<dyn AccessPrompter> = if auto_grant {
            Arc::new(AutoGrant)
        } else {
            Arc::new(StdinPrompter)
        };
        let permissions = Arc::new(GrantStore::open_default(prompter));
        let collaborators = Collaborators::from_config(config, permissions, None)?;

        let (ui_tx, updates) = tokio::sync::mpsc::unbounded_channel();
        let controller = CaptureController::new(
            collaborators,
            ControllerSettings::from_config(config),
            ui_tx,
        )?;
        let handle = controller.handle();
        let task = tokio::spawn(controller.run());

        Ok(Self {
            handle,
            updates,
            task,
        })
    }

    /// Wait until the shutter is usable, or report why the session is not
    ///
    /// Not bounded by a timeout: the user may be answering an access prompt.
    async fn wait_until_ready(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let ready = self
            .next_matching(|update| match update {
                UiUpdate::Controls(controls) if controls.shutter_enabled => Some(Ok(())),
                UiUpdate::Notice(notice) => {
                    Some(Err(format!("{}: {}", notice.title(), notice.message())))
                }
                _ => None,
            })
            .await;
        match ready {
            Some(Ok(())) => Ok(()),
            Some(Err(msg)) => Err(msg.into()),
            None => Err("capture controller exited".into()),
        }
    }

    /// Wait for a matching update, bounded by the save timeout
    async fn wait_for<T>(
        &mut self,
        matcher: impl FnMut(UiUpdate) -> Option<T>,
    ) -> Result<T, Box<dyn std::error::Error>> {
        let timeout = Duration::from_secs(SAVE_TIMEOUT_SECS);
        match tokio::time::timeout(timeout, self.next_matching(matcher)).await {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err("capture controller exited".into()),
            Err(_) => Err("timed out waiting for the capture".into()),
        }
    }

    async fn next_matching<T>(
        &mut self,
        mut matcher: impl FnMut(UiUpdate) -> Option<T>,
    ) -> Option<T> {
        while let Some(update) = self.updates.recv().await {
            if let Some(value) = matcher(update) {
                return Some(value);
            }
        }
        None
    }

    async fn stop(self) {
        self.handle.shutdown();
        let timeout = Duration::from_secs(SAVE_TIMEOUT_SECS);
        if tokio::time::timeout(timeout, self.task).await.is_err() {
            eprintln!("Controller did not stop in time");
        }
    }
}
