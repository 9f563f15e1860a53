// SPDX-License-Identifier: MPL-2.0

//! Camera and photo library permissions
//!
//! Grants are kept per scope in a small JSON file so the user is asked once.
//! Undetermined scopes are resolved by an [`AccessPrompter`]: the terminal
//! viewfinder dialog, a stdin question, or automatic approval (`--yes`).

use crate::constants::storage::{CONFIG_DIR_NAME, PERMISSIONS_FILE};
use crate::errors::AppResult;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Authorization state of a permission scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AuthorizationStatus {
    Authorized,
    /// The user has not been asked yet
    #[default]
    NotDetermined,
    Denied,
    /// Access blocked by policy; the user cannot grant it
    Restricted,
}

impl AuthorizationStatus {
    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthorizationStatus::Authorized)
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorizationStatus::Authorized => write!(f, "authorized"),
            AuthorizationStatus::NotDetermined => write!(f, "not determined"),
            AuthorizationStatus::Denied => write!(f, "denied"),
            AuthorizationStatus::Restricted => write!(f, "restricted"),
        }
    }
}

/// What access is being asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionScope {
    Camera,
    PhotoLibrary,
}

impl fmt::Display for PermissionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionScope::Camera => write!(f, "camera"),
            PermissionScope::PhotoLibrary => write!(f, "photo library"),
        }
    }
}

/// Answers authorization queries and prompts the user
pub trait PermissionAuthority: Send + Sync {
    /// Current status, without prompting
    fn authorization_status(&self, scope: PermissionScope) -> AuthorizationStatus;

    /// Prompt if undetermined; resolves to whether access is granted
    fn request_access(&self, scope: PermissionScope) -> BoxFuture<'static, bool>;
}

/// Asks the user a yes/no access question
pub trait AccessPrompter: Send + Sync {
    fn prompt(&self, scope: PermissionScope) -> BoxFuture<'static, bool>;
}

/// Grants every request without asking
pub struct AutoGrant;

impl AccessPrompter for AutoGrant {
    fn prompt(&self, scope: PermissionScope) -> BoxFuture<'static, bool> {
        debug!(%scope, "Auto-granting access");
        futures::future::ready(true).boxed()
    }
}

/// Asks on stderr and reads the answer from stdin
pub struct StdinPrompter;

impl AccessPrompter for StdinPrompter {
    fn prompt(&self, scope: PermissionScope) -> BoxFuture<'static, bool> {
        async move {
            let answer = tokio::task::spawn_blocking(move || {
                let mut stderr = std::io::stderr();
                let _ = write!(stderr, "Allow snapcam to access the {}? [y/N] ", scope);
                let _ = stderr.flush();

                let mut line = String::new();
                match std::io::stdin().lock().read_line(&mut line) {
                    Ok(_) => is_yes(&line),
                    Err(e) => {
                        warn!(error = %e, "Failed to read access answer");
                        false
                    }
                }
            })
            .await;
            answer.unwrap_or(false)
        }
        .boxed()
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// An access question waiting for the user
#[derive(Debug)]
pub struct AccessRequest {
    pub scope: PermissionScope,
    pub reply: oneshot::Sender<bool>,
}

/// Forwards questions to an interactive UI over a channel
///
/// A dropped request or a closed UI counts as denial.
pub struct ChannelPrompter {
    requests: mpsc::UnboundedSender<AccessRequest>,
}

impl ChannelPrompter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AccessRequest>) {
        let (requests, rx) = mpsc::unbounded_channel();
        (Self { requests }, rx)
    }
}

impl AccessPrompter for ChannelPrompter {
    fn prompt(&self, scope: PermissionScope) -> BoxFuture<'static, bool> {
        let (reply, answer) = oneshot::channel();
        let sent = self.requests.send(AccessRequest { scope, reply }).is_ok();
        async move {
            if !sent {
                warn!(%scope, "No UI to ask for access");
                return false;
            }
            answer.await.unwrap_or(false)
        }
        .boxed()
    }
}

/// Persisted per-scope grants
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
struct Grants {
    camera: AuthorizationStatus,
    photo_library: AuthorizationStatus,
}

impl Grants {
    fn get(&self, scope: PermissionScope) -> AuthorizationStatus {
        match scope {
            PermissionScope::Camera => self.camera,
            PermissionScope::PhotoLibrary => self.photo_library,
        }
    }

    fn set(&mut self, scope: PermissionScope, status: AuthorizationStatus) {
        match scope {
            PermissionScope::Camera => self.camera = status,
            PermissionScope::PhotoLibrary => self.photo_library = status,
        }
    }
}

/// Permission authority backed by a grant file
pub struct GrantStore {
    /// `None` keeps grants in memory only
    path: Option<PathBuf>,
    grants: Arc<Mutex<Grants>>,
    prompter: Arc<dyn AccessPrompter>,
}

impl GrantStore {
    /// Default grant file: `<config_dir>/snapcam/permissions.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(PERMISSIONS_FILE))
    }

    /// Load grants from `path`; missing or unreadable files start undetermined
    pub fn open(path: PathBuf, prompter: Arc<dyn AccessPrompter>) -> Self {
        let grants = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable permission grants");
                Grants::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Grants::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read permission grants");
                Grants::default()
            }
        };
        debug!(path = %path.display(), ?grants, "Permission grants loaded");

        Self {
            path: Some(path),
            grants: Arc::new(Mutex::new(grants)),
            prompter,
        }
    }

    /// Open the default grant file, or keep grants in memory without a config dir
    pub fn open_default(prompter: Arc<dyn AccessPrompter>) -> Self {
        match Self::default_path() {
            Some(path) => Self::open(path, prompter),
            None => {
                warn!("No config directory, permission grants will not persist");
                Self::in_memory(prompter)
            }
        }
    }

    /// Grants that are never written to disk
    pub fn in_memory(prompter: Arc<dyn AccessPrompter>) -> Self {
        Self {
            path: None,
            grants: Arc::new(Mutex::new(Grants::default())),
            prompter,
        }
    }

    /// Record a decision and persist it
    pub fn set_status(&self, scope: PermissionScope, status: AuthorizationStatus) -> AppResult<()> {
        let grants = {
            let mut grants = self.grants.lock().unwrap();
            grants.set(scope, status);
            *grants
        };
        persist(self.path.as_deref(), &grants)
    }

    /// Forget all decisions so the next launch asks again
    pub fn reset(&self) -> AppResult<()> {
        *self.grants.lock().unwrap() = Grants::default();
        if let Some(path) = &self.path {
            match std::fs::remove_file(path) {
                Ok(()) => info!(path = %path.display(), "Permission grants reset"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

fn persist(path: Option<&Path>, grants: &Grants) -> AppResult<()> {
    let Some(path) = path else {
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(grants)?)?;
    debug!(path = %path.display(), "Permission grants saved");
    Ok(())
}

impl PermissionAuthority for GrantStore {
    fn authorization_status(&self, scope: PermissionScope) -> AuthorizationStatus {
        self.grants.lock().unwrap().get(scope)
    }

    fn request_access(&self, scope: PermissionScope) -> BoxFuture<'static, bool> {
        match self.authorization_status(scope) {
            AuthorizationStatus::Authorized => return futures::future::ready(true).boxed(),
            AuthorizationStatus::Denied | AuthorizationStatus::Restricted => {
                return futures::future::ready(false).boxed();
            }
            AuthorizationStatus::NotDetermined => {}
        }

        let prompt = self.prompter.prompt(scope);
        let grants = Arc::clone(&self.grants);
        let path = self.path.clone();

        async move {
            let granted = prompt.await;
            let status = if granted {
                AuthorizationStatus::Authorized
            } else {
                AuthorizationStatus::Denied
            };
            info!(%scope, %status, "Access decision recorded");

            let snapshot = {
                let mut grants = grants.lock().unwrap();
                grants.set(scope, status);
                *grants
            };
            if let Err(e) = persist(path.as_deref(), &snapshot) {
                warn!(error = %e, "Failed to save permission grants");
            }
            granted
        }
        .boxed()
    }
}
