//! Hot-reload for the band policy.
//!
//! Readers take an `Arc` snapshot per request; a reload builds a complete new
//! store and publishes it with a single atomic swap. A file that fails to load
//! leaves the current store in place.

use super::config::{BandPolicyStore, ConfigError};
use arc_swap::ArcSwap;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared, atomically swappable band policy.
#[derive(Debug)]
pub struct PolicyHandle {
    current: ArcSwap<BandPolicyStore>,
}

impl PolicyHandle {
    /// Wraps an initial store.
    #[must_use]
    pub fn new(store: BandPolicyStore) -> Self {
        Self { current: ArcSwap::from_pointee(store) }
    }

    /// Loads the initial store from `path`.
    ///
    /// # Errors
    /// Returns the load error; callers treat it as fatal at startup.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Ok(Self::new(BandPolicyStore::load(path)?))
    }

    /// The current store. Hold the returned `Arc` for the whole request.
    #[must_use]
    pub fn snapshot(&self) -> Arc<BandPolicyStore> {
        self.current.load_full()
    }

    /// Publishes `store`, replacing the current one.
    pub fn replace(&self, store: BandPolicyStore) {
        self.current.store(Arc::new(store));
    }

    /// Reloads from `path`, keeping the current store if the file is invalid.
    ///
    /// # Errors
    /// Returns the load error; the previous store stays active.
    pub fn reload_from(&self, path: &Path) -> Result<Arc<BandPolicyStore>, ConfigError> {
        match BandPolicyStore::load(path) {
            Ok(store) => {
                let store = Arc::new(store);
                self.current.store(Arc::clone(&store));
                info!(
                    path = %path.display(),
                    bands = store.bands().len(),
                    version = ?store.version(),
                    "Band policy reloaded"
                );
                Ok(store)
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Band policy reload failed, keeping previous policy");
                Err(e)
            }
        }
    }
}

/// Watches the policy file and reloads it into a [`PolicyHandle`] on change.
///
/// The parent directory is watched so that editors replacing the file by rename
/// are picked up. Dropping the watcher stops reloading.
pub struct PolicyWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
}

impl PolicyWatcher {
    /// Starts watching `path`.
    ///
    /// # Errors
    /// Returns `ConfigError::Watch` if the watcher cannot be created.
    pub fn new(path: impl AsRef<Path>, handle: Arc<PolicyHandle>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        let mut watcher = notify::recommended_watcher(Self::create_event_handler(handle, path.clone()))?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        info!(path = %path.display(), "Watching band policy for changes");
        Ok(Self { path, _watcher: watcher })
    }

    /// The watched file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn create_event_handler(
        handle: Arc<PolicyHandle>,
        policy_file: PathBuf,
    ) -> impl Fn(Result<Event, notify::Error>) + Send + Sync + 'static {
        let file_name = policy_file.file_name().map(ToOwned::to_owned);
        move |result: Result<Event, notify::Error>| match result {
            Ok(event) => {
                if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    return;
                }
                let touches_policy = event.paths.iter().any(|p| p.file_name().map(ToOwned::to_owned) == file_name);
                if touches_policy {
                    // Errors are logged inside reload_from; the old policy stays active.
                    let _ = handle.reload_from(&policy_file);
                }
            }
            Err(e) => warn!(error = %e, "Band policy watcher error"),
        }
    }
}
