//! Hot reload of the configuration file.
//!
//! The file's directory is watched rather than the file itself, so editors
//! that save by writing a temporary file and renaming it over the original
//! are still seen. Bursts of events are collapsed into a single reload once
//! the directory has been quiet for [`DEBOUNCE`].
//!
//! A reload goes through the same steps as startup: parse, apply command
//! line overrides, validate. A file that is empty when the reload runs is
//! taken to be mid-rewrite and skipped, so a truncate followed by a write
//! never switches relays to the built-in defaults.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::cli::Overrides;
use crate::config::loader::{parse_config, ConfigError};
use crate::config::schema::RelayConfig;
use crate::config::validation::validate_config;

/// Quiet period after the last file event before reloading.
pub const DEBOUNCE: Duration = Duration::from_millis(100);

/// Watches a config file and emits validated configs when it changes.
pub struct ConfigWatcher {
    path: PathBuf,
    overrides: Overrides,
    update_tx: mpsc::UnboundedSender<RelayConfig>,
}

impl ConfigWatcher {
    /// `overrides` are re-applied to every reloaded file, so command line
    /// values keep winning after a reload.
    pub fn new(path: &Path, overrides: Overrides) -> (Self, mpsc::UnboundedReceiver<RelayConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                overrides,
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. Must be called from inside a tokio runtime.
    ///
    /// Updates stop once the returned watcher is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let file_name = self
            .path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| notify::Error::generic("config path has no file name"))?;
        let dir = watch_dir(&self.path);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches(&event, &file_name) => {
                    // closed once the debounce task has stopped
                    let _ = event_tx.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            notify::Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %self.path.display(), "Config watcher started");
        tokio::spawn(self.debounce(event_rx));

        Ok(watcher)
    }

    async fn debounce(self, mut events: mpsc::UnboundedReceiver<()>) {
        while events.recv().await.is_some() {
            loop {
                match tokio::time::timeout(DEBOUNCE, events.recv()).await {
                    Ok(Some(())) => continue,
                    Ok(None) => return,
                    Err(_) => break,
                }
            }

            match self.reload() {
                Ok(Some(config)) => {
                    tracing::info!(path = %self.path.display(), "Config file reloaded");
                    if self.update_tx.send(config).is_err() {
                        return;
                    }
                }
                Ok(None) => tracing::warn!(
                    path = %self.path.display(),
                    "Config file is empty, keeping current configuration"
                ),
                Err(e) => tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to reload config, keeping current configuration"
                ),
            }
        }
    }

    /// Build the config new connections should use from the file as it is now.
    ///
    /// Returns `Ok(None)` for an empty or whitespace-only file.
    fn reload(&self) -> Result<Option<RelayConfig>, ConfigError> {
        let content = fs::read_to_string(&self.path).map_err(ConfigError::Io)?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        let mut config = parse_config(&content)?;
        self.overrides.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;

        Ok(Some(config))
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn touches(event: &Event, file_name: &OsStr) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(file_name))
}
