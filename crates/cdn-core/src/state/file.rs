// # File State Store
//
// File-based implementation of StateStore with crash recovery.
//
// ## Crash Recovery
//
// - Atomic writes: write to `<path>.tmp`, then rename over `<path>`
// - Backup: the previous file is copied to `<path>.backup` before each rename
// - Recovery: a file that fails to parse is replaced by its backup on load
//
// ## File Format
//
// ```json
// {
//   "version": "1",
//   "distributions": {
//     "website": {
//       "id": "E2QWRUHEXAMPLE",
//       "arn": "arn:aws:cloudfront::123456789012:distribution/E2QWRUHEXAMPLE",
//       "url": "https://d111111abcdef8.cloudfront.net",
//       "region": "us-east-1",
//       "enabled": true,
//       "origins": ["https://mybucket.s3.amazonaws.com"],
//       "defaults": null,
//       "comment": "",
//       "lastApplied": "2026-01-09T12:00:00Z"
//     }
//   }
// }
// ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, error, info, trace, warn};

use crate::Error;
use crate::config::StateStoreConfig;
use crate::traits::{DistributionState, StateStore, StateStoreFactory};

/// State file format version
const STATE_FILE_VERSION: &str = "1";

/// File-based state store with crash recovery
///
/// Every mutation is written through to disk immediately; `flush()` only
/// writes when an earlier write failed and left the store dirty.
///
/// # Example
///
/// ```rust,no_run
/// use cdn_core::state::FileStateStore;
/// use cdn_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("/var/lib/cdnctl/state.json").await?;
///     if let Some(state) = store.get_state("website").await? {
///         println!("{}", state.url);
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

#[derive(Debug)]
struct FileState {
    distributions: BTreeMap<String, DistributionState>,
    dirty: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateFileFormat {
    version: String,
    distributions: BTreeMap<String, DistributionState>,
}

/// Why a state file could not be loaded
enum LoadError {
    /// The file exists but is not a valid state document
    Corrupt(serde_json::Error),
    /// Anything else (permissions, I/O)
    Fatal(Error),
}

impl FileStateStore {
    /// Create or load a file state store
    ///
    /// Creates missing parent directories. A corrupted file is recovered from
    /// its backup; with no usable backup the store starts empty.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create state directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let distributions = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                distributions,
                dirty: false,
            })),
        })
    }

    async fn load_with_recovery(path: &Path) -> Result<BTreeMap<String, DistributionState>, Error> {
        let err = match Self::load(path).await {
            Ok(distributions) => {
                debug!("Loaded state for {} distribution(s)", distributions.len());
                return Ok(distributions);
            }
            Err(LoadError::Fatal(e)) => return Err(e),
            Err(LoadError::Corrupt(e)) => e,
        };

        warn!(
            "State file {} is corrupted: {}. Attempting recovery from backup.",
            path.display(),
            err
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            warn!("No backup file found. Starting with empty state.");
            return Ok(BTreeMap::new());
        }

        match Self::load(&backup_path).await {
            Ok(distributions) => {
                info!(
                    "Recovered state for {} distribution(s) from backup",
                    distributions.len()
                );
                if let Err(e) = fs::copy(&backup_path, path).await {
                    error!("Failed to restore state file from backup: {}", e);
                }
                Ok(distributions)
            }
            Err(LoadError::Corrupt(e)) => {
                error!("Backup is corrupted too: {}. Starting with empty state.", e);
                Ok(BTreeMap::new())
            }
            Err(LoadError::Fatal(e)) => Err(e),
        }
    }

    async fn load(path: &Path) -> Result<BTreeMap<String, DistributionState>, LoadError> {
        if !path.exists() {
            debug!("State file does not exist: {}", path.display());
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            LoadError::Fatal(Error::state_store(format!(
                "Failed to read state file {}: {}",
                path.display(),
                e
            )))
        })?;

        let state_file: StateFileFormat =
            serde_json::from_str(&content).map_err(LoadError::Corrupt)?;

        if state_file.version != STATE_FILE_VERSION {
            warn!(
                "State file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STATE_FILE_VERSION, state_file.version
            );
        }

        Ok(state_file.distributions)
    }

    /// Write the current state to disk atomically
    async fn write_state(&self) -> Result<(), Error> {
        let mut guard = self.state.write().await;

        let state_file = StateFileFormat {
            version: STATE_FILE_VERSION.to_string(),
            distributions: guard.distributions.clone(),
        };
        let json = serde_json::to_string_pretty(&state_file)?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.write_all(json.as_bytes()).await?;
            file.flush().await?;
        }

        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await {
                warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        guard.dirty = false;
        trace!("State written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        with_suffix(&self.path, "tmp")
    }

    fn backup_path(path: &Path) -> PathBuf {
        with_suffix(path, "backup")
    }
}

/// `state.json` -> `state.json.<suffix>`
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get_state(&self, name: &str) -> Result<Option<DistributionState>, Error> {
        let guard = self.state.read().await;
        Ok(guard.distributions.get(name).cloned())
    }

    async fn set_state(&self, name: &str, state: &DistributionState) -> Result<(), Error> {
        {
            let mut guard = self.state.write().await;
            guard.distributions.insert(name.to_string(), state.clone());
            guard.dirty = true;
        }
        self.write_state().await
    }

    async fn delete_state(&self, name: &str) -> Result<(), Error> {
        {
            let mut guard = self.state.write().await;
            if guard.distributions.remove(name).is_none() {
                return Ok(());
            }
            guard.dirty = true;
        }
        self.write_state().await
    }

    async fn list_states(&self) -> Result<Vec<String>, Error> {
        let guard = self.state.read().await;
        Ok(guard.distributions.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        let dirty = self.state.read().await.dirty;
        if dirty {
            self.write_state().await
        } else {
            Ok(())
        }
    }
}

/// Factory for `StateStoreConfig::File`
pub struct FileStateStoreFactory;

#[async_trait]
impl StateStoreFactory for FileStateStoreFactory {
    async fn create(&self, config: &StateStoreConfig) -> Result<Box<dyn StateStore>, Error> {
        match config {
            StateStoreConfig::File { path } => Ok(Box::new(FileStateStore::new(path).await?)),
            other => Err(Error::config(format!(
                "File state store cannot be created from a {} config",
                other.type_name()
            ))),
        }
    }
}
