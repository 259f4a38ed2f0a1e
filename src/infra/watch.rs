use notify::event::EventKind;
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::Path;
use std::sync::mpsc::{Receiver, channel};
use thiserror::Error;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WatchSignal {
    Changed,
    Error(String),
}

#[derive(Debug)]
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<WatchSignal>,
}

impl ConfigWatcher {
    pub fn try_recv(&self) -> Option<WatchSignal> {
        self.rx.try_recv().ok()
    }

    /// Drains queued signals. Editors tend to emit several events per save.
    pub fn drain(&self) -> Vec<WatchSignal> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

#[derive(Debug, Error)]
pub enum WatchConfigError {
    #[error("watch error: {0}")]
    Notify(#[from] notify::Error),

    #[error("config path {0} has no parent directory or file name")]
    InvalidPath(String),
}

/// Watches the directory holding `path` so atomic rename-on-save is seen too.
pub fn watch_config_file(path: &Path) -> Result<ConfigWatcher, WatchConfigError> {
    let invalid = || WatchConfigError::InvalidPath(path.display().to_string());
    let file_name = path.file_name().ok_or_else(invalid)?.to_os_string();
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    if !dir.is_dir() {
        return Err(invalid());
    }

    let (tx, rx) = channel::<WatchSignal>();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                if touches_config(&event, &file_name) {
                    let _ = tx.send(WatchSignal::Changed);
                }
            }
            Err(error) => {
                let _ = tx.send(WatchSignal::Error(error.to_string()));
            }
        },
        Config::default(),
    )?;

    watcher.watch(dir, RecursiveMode::NonRecursive)?;

    Ok(ConfigWatcher {
        _watcher: watcher,
        rx,
    })
}

fn touches_config(event: &notify::Event, file_name: &OsString) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    event
        .paths
        .iter()
        .any(|path| path.file_name() == Some(file_name.as_os_str()))
}
