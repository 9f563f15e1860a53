// SPDX-License-Identifier: MPL-2.0

//! Media library writes
//!
//! Photos are written as `IMG_<timestamp>.jpg` and movies copied as
//! `VID_<timestamp>.<ext>` into the configured library directories.
//! Adding is allowed only while the photo library grant is authorized and
//! both directories are writable.

use crate::backends::permissions::{AuthorizationStatus, PermissionAuthority, PermissionScope};
use crate::constants::storage::{PHOTO_PREFIX, VIDEO_PREFIX};
use crate::errors::{AppError, AppResult};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A single change to the library
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetChange {
    /// Encoded still photo bytes
    Photo(Vec<u8>),
    /// Finalized movie file; the file itself is left in place
    Video(PathBuf),
}

/// Kind of library asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Photo,
    Video,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Photo => write!(f, "photo"),
            AssetKind::Video => write!(f, "video"),
        }
    }
}

/// An asset written to the library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedAsset {
    pub path: PathBuf,
    pub kind: AssetKind,
}

/// Persists photos and movies as library assets
pub trait AssetStore: Send + Sync {
    /// Ask for permission to add (but not read) assets
    fn request_add_only_authorization(&self) -> BoxFuture<'static, AuthorizationStatus>;

    /// Apply one change
    fn perform_changes(&self, change: AssetChange) -> BoxFuture<'static, AppResult<SavedAsset>>;
}

/// Library of plain directories
#[derive(Clone)]
pub struct LibraryStore {
    photo_dir: PathBuf,
    video_dir: PathBuf,
    permissions: Arc<dyn PermissionAuthority>,
}

impl LibraryStore {
    pub fn new(
        photo_dir: PathBuf,
        video_dir: PathBuf,
        permissions: Arc<dyn PermissionAuthority>,
    ) -> Self {
        Self {
            photo_dir,
            video_dir,
            permissions,
        }
    }

    pub fn photo_dir(&self) -> &Path {
        &self.photo_dir
    }

    pub fn video_dir(&self) -> &Path {
        &self.video_dir
    }
}

impl AssetStore for LibraryStore {
    fn request_add_only_authorization(&self) -> BoxFuture<'static, AuthorizationStatus> {
        let dirs = [self.photo_dir.clone(), self.video_dir.clone()];
        let granted = match self
            .permissions
            .authorization_status(PermissionScope::PhotoLibrary)
        {
            AuthorizationStatus::Authorized => futures::future::ready(true).boxed(),
            AuthorizationStatus::NotDetermined => self
                .permissions
                .request_access(PermissionScope::PhotoLibrary),
            status => return futures::future::ready(status).boxed(),
        };
        async move {
            if !granted.await {
                return AuthorizationStatus::Denied;
            }
            let status = tokio::task::spawn_blocking(move || {
                for dir in &dirs {
                    if let Err(e) = ensure_writable(dir) {
                        warn!(dir = %dir.display(), error = %e, "Library directory not writable");
                        return AuthorizationStatus::Denied;
                    }
                }
                AuthorizationStatus::Authorized
            })
            .await;
            status.unwrap_or(AuthorizationStatus::Denied)
        }
        .boxed()
    }

    fn perform_changes(&self, change: AssetChange) -> BoxFuture<'static, AppResult<SavedAsset>> {
        let store = self.clone();
        async move {
            tokio::task::spawn_blocking(move || store.apply(change))
                .await
                .map_err(|e| AppError::Write(format!("save task failed: {}", e)))?
        }
        .boxed()
    }
}

impl LibraryStore {
    fn apply(&self, change: AssetChange) -> AppResult<SavedAsset> {
        match change {
            AssetChange::Photo(data) => {
                let path = unique_path(&self.photo_dir, PHOTO_PREFIX, "jpg");
                info!(path = %path.display(), bytes = data.len(), "Saving photo");
                write_asset(&self.photo_dir, &path, |path| std::fs::write(path, &data))?;
                info!(path = %path.display(), "Photo saved successfully");
                Ok(SavedAsset {
                    path,
                    kind: AssetKind::Photo,
                })
            }
            AssetChange::Video(source) => {
                let ext = source
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("mp4")
                    .to_string();
                let path = unique_path(&self.video_dir, VIDEO_PREFIX, &ext);
                info!(source = %source.display(), path = %path.display(), "Saving video");
                write_asset(&self.video_dir, &path, |path| {
                    std::fs::copy(&source, path).map(|_| ())
                })?;
                info!(path = %path.display(), "Video saved successfully");
                Ok(SavedAsset {
                    path,
                    kind: AssetKind::Video,
                })
            }
        }
    }
}

fn write_asset(
    dir: &Path,
    path: &Path,
    write: impl FnOnce(&Path) -> std::io::Result<()>,
) -> AppResult<()> {
    std::fs::create_dir_all(dir)
        .and_then(|_| write(path))
        .map_err(|e| AppError::Write(format!("{}: {}", path.display(), e)))
}

fn ensure_writable(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    if std::fs::metadata(dir)?.permissions().readonly() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "directory is read-only",
        ));
    }
    Ok(())
}

/// `<prefix>_<timestamp>.<ext>`, with a numeric suffix when taken
fn unique_path(dir: &Path, prefix: &str, ext: &str) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let base = format!("{}_{}", prefix, timestamp);

    let mut path = dir.join(format!("{}.{}", base, ext));
    let mut suffix = 1;
    while path.exists() {
        path = dir.join(format!("{}_{}.{}", base, suffix, ext));
        suffix += 1;
    }
    debug!(path = %path.display(), "Asset path chosen");
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::permissions::{AccessPrompter, GrantStore};

    struct Answer(bool);

    impl AccessPrompter for Answer {
        fn prompt(&self, _scope: PermissionScope) -> BoxFuture<'static, bool> {
            futures::future::ready(self.0).boxed()
        }
    }

    fn store_with(root: &Path, grants: Arc<GrantStore>) -> LibraryStore {
        LibraryStore::new(root.join("Pictures"), root.join("Videos"), grants)
    }

    fn store(root: &Path) -> LibraryStore {
        let grants = GrantStore::in_memory(Arc::new(Answer(false)));
        grants
            .set_status(PermissionScope::PhotoLibrary, AuthorizationStatus::Authorized)
            .unwrap();
        store_with(root, Arc::new(grants))
    }

    #[test]
    fn test_unique_path_adds_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let first = unique_path(dir.path(), "IMG", "jpg");
        std::fs::write(&first, b"x").unwrap();
        let second = unique_path(dir.path(), "IMG", "jpg");
        assert_ne!(first, second);
        let name = second.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("IMG_"));
        assert!(name.ends_with(".jpg"));
    }

    #[tokio::test]
    async fn test_photo_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert_eq!(
            store.request_add_only_authorization().await,
            AuthorizationStatus::Authorized
        );

        let saved = store
            .perform_changes(AssetChange::Photo(vec![0xFF, 0xD8, 0xFF, 0xD9]))
            .await
            .unwrap();
        assert_eq!(saved.kind, AssetKind::Photo);
        assert!(saved.path.starts_with(store.photo_dir()));
        assert_eq!(std::fs::read(saved.path).unwrap(), vec![0xFF, 0xD8, 0xFF, 0xD9]);
    }

    #[tokio::test]
    async fn test_stored_photo_keeps_embedded_thumbnail() {
        use crate::pipelines::photo::{embed_thumbnail, encode_jpeg};
        use img_parts::jpeg::Jpeg;
        use img_parts::{Bytes, ImageEXIF};

        let rgb = image::RgbImage::from_pixel(320, 240, image::Rgb([90, 120, 200]));
        let thumbnail = encode_jpeg(&image::imageops::thumbnail(&rgb, 160, 120), 80).unwrap();
        let data = embed_thumbnail(encode_jpeg(&rgb, 85).unwrap(), &thumbnail).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let saved = store(dir.path())
            .perform_changes(AssetChange::Photo(data))
            .await
            .unwrap();

        let written = std::fs::read(&saved.path).unwrap();
        let exif = Jpeg::from_bytes(Bytes::from(written))
            .unwrap()
            .exif()
            .expect("EXIF block");
        assert!(exif.ends_with(&thumbnail));
    }

    #[tokio::test]
    async fn test_denied_library_grant_blocks_adds() {
        let dir = tempfile::tempdir().unwrap();
        let grants = GrantStore::in_memory(Arc::new(Answer(true)));
        grants
            .set_status(PermissionScope::PhotoLibrary, AuthorizationStatus::Denied)
            .unwrap();
        let store = store_with(dir.path(), Arc::new(grants));

        assert_eq!(
            store.request_add_only_authorization().await,
            AuthorizationStatus::Denied
        );
        assert!(!store.photo_dir().exists());
    }

    #[tokio::test]
    async fn test_restricted_library_grant_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let grants = GrantStore::in_memory(Arc::new(Answer(true)));
        grants
            .set_status(PermissionScope::PhotoLibrary, AuthorizationStatus::Restricted)
            .unwrap();
        let store = store_with(dir.path(), Arc::new(grants));

        assert_eq!(
            store.request_add_only_authorization().await,
            AuthorizationStatus::Restricted
        );
    }

    #[tokio::test]
    async fn test_undetermined_library_grant_prompts() {
        let dir = tempfile::tempdir().unwrap();
        let grants = Arc::new(GrantStore::in_memory(Arc::new(Answer(false))));
        let store = store_with(dir.path(), grants.clone());

        assert_eq!(
            store.request_add_only_authorization().await,
            AuthorizationStatus::Denied
        );
        assert_eq!(
            grants.authorization_status(PermissionScope::PhotoLibrary),
            AuthorizationStatus::Denied
        );

        let grants = Arc::new(GrantStore::in_memory(Arc::new(Answer(true))));
        let store = store_with(dir.path(), grants);
        assert_eq!(
            store.request_add_only_authorization().await,
            AuthorizationStatus::Authorized
        );
    }

    #[tokio::test]
    async fn test_video_copied_keeps_extension() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("recording.mjpeg");
        std::fs::write(&source, b"frames").unwrap();

        let store = store(dir.path());
        let saved = store
            .perform_changes(AssetChange::Video(source.clone()))
            .await
            .unwrap();
        assert_eq!(saved.kind, AssetKind::Video);
        assert_eq!(saved.path.extension().unwrap(), "mjpeg");
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_missing_video_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let result = store
            .perform_changes(AssetChange::Video(dir.path().join("missing.mp4")))
            .await;
        assert!(matches!(result, Err(AppError::Write(_))));
    }
}
