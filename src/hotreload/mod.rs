//! Balance config hot-reload.
//!
//! Watches a `.json`/`.ron` balance file with `notify`. On modification the
//! file is parsed and validated into a full [`GameBalanceConfig`] and swapped
//! into the [`BalanceManager`]; a file that fails to load leaves the running
//! snapshot untouched.

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::balance::{validate_grouping_distribution, BalanceManager, ConfigError, GameBalanceConfig};

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("config file not found: {0}")]
    MissingFile(PathBuf),
    #[error("file watcher error: {0}")]
    Notify(#[from] notify::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HotReloadStatus {
    pub enabled: bool,
    pub watched_file: Option<String>,
    pub reload_count: u32,
    pub last_reload_success: bool,
    /// Unix millis of the last reload attempt
    pub last_reload_time: u64,
    pub last_error: Option<String>,
}

impl HotReloadStatus {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Option<Self> {
        serde_json::from_str(json).ok()
    }
}

/// Load `path` and apply it to `manager`. On error the manager is unchanged.
pub fn reload_into(path: &Path, manager: &mut BalanceManager) -> Result<(), ConfigError> {
    let config = GameBalanceConfig::from_file(path)?;
    if !validate_grouping_distribution(&config.grouping.distribution) {
        warn!(path = %path.display(), "reloaded grouping distribution does not sum to 1.0");
    }
    manager.import_config(config);
    Ok(())
}

pub struct BalanceConfigWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
    receiver: Receiver<notify::Result<Event>>,
    status: HotReloadStatus,
}

impl BalanceConfigWatcher {
    /// Start watching the directory containing `path`
    pub fn watch(path: impl Into<PathBuf>) -> Result<Self, WatchError> {
        let path = path.into();
        if !path.exists() {
            return Err(WatchError::MissingFile(path));
        }

        let (tx, rx) = channel::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(tx)?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        info!("Hot-reload enabled for {:?}", path);
        let status = HotReloadStatus {
            enabled: true,
            watched_file: Some(path.display().to_string()),
            ..Default::default()
        };
        Ok(Self {
            path,
            _watcher: watcher,
            receiver: rx,
            status,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn status(&self) -> &HotReloadStatus {
        &self.status
    }

    /// Drain pending filesystem events; reload once if any touched the file.
    /// Returns whether a reload was attempted.
    pub fn poll(&mut self, manager: &mut BalanceManager) -> bool {
        let mut changed = false;
        while let Ok(result) = self.receiver.try_recv() {
            match result {
                Ok(event) => changed |= is_config_modify_event(&event, &self.path),
                Err(e) => warn!("File watcher error: {}", e),
            }
        }
        if changed {
            info!("Balance config modified, reloading...");
            // the error is recorded in the status
            let _ = self.reload_now(manager);
        }
        changed
    }

    /// Reload immediately regardless of pending events
    pub fn reload_now(&mut self, manager: &mut BalanceManager) -> Result<(), ConfigError> {
        self.status.last_reload_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        match reload_into(&self.path, manager) {
            Ok(()) => {
                self.status.reload_count += 1;
                self.status.last_reload_success = true;
                self.status.last_error = None;
                info!(
                    "Balance config reloaded successfully (count: {})",
                    self.status.reload_count
                );
                Ok(())
            }
            Err(e) => {
                self.status.last_reload_success = false;
                self.status.last_error = Some(e.to_string());
                error!("Balance config reload failed: {}", e);
                Err(e)
            }
        }
    }
}

/// Modification or creation of a file with the watched file's name
fn is_config_modify_event(event: &Event, watched: &Path) -> bool {
    let Some(name) = watched.file_name() else {
        return false;
    };
    let relevant_kind =
        event.kind.is_modify() || matches!(event.kind, notify::EventKind::Create(_));
    relevant_kind && event.paths.iter().any(|p| p.file_name() == Some(name))
}
