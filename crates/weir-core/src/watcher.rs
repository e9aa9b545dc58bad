//! Debounced hot reload of the config file.
//!
//! A notify watcher on the config file's directory feeds a debounce thread;
//! bursts of editor-save events coalesce into a single reload per window.
//! Reloads run entirely off the response-handling path, and a failed reload
//! keeps the previous snapshot in effect.

use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigStore};
use crate::error::Result;

/// Window within which filesystem event bursts coalesce into one reload.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(250);

/// Handle to a running config watch. Dropping it stops the watch; the
/// debounce thread exits once its event channel disconnects.
pub struct ConfigWatcher {
    watcher: RecommendedWatcher,
    thread: Option<thread::JoinHandle<()>>,
}

impl ConfigWatcher {
    /// Stops the watch and waits for the debounce thread to finish.
    pub fn stop(self) {
        let Self { watcher, thread } = self;
        drop(watcher);
        if let Some(handle) = thread {
            let _ = handle.join();
        }
    }
}

impl ConfigStore {
    /// Starts watching the config file's directory and reloads on change.
    ///
    /// Events for other files in the directory are ignored. At most one
    /// reload runs per [`DEBOUNCE_WINDOW`] no matter how many events arrive
    /// inside it. `on_reload` receives each newly installed snapshot; a
    /// failed reload logs a warning and leaves the previous snapshot
    /// installed.
    pub fn watch<F>(self: &Arc<Self>, on_reload: F) -> Result<ConfigWatcher>
    where
        F: Fn(Arc<Config>) + Send + 'static,
    {
        let file_name = self.path().file_name().map(|name| name.to_os_string());
        let dir = match self.path().parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => Path::new(".").to_path_buf(),
        };
        // The directory must exist before it can be watched.
        std::fs::create_dir_all(&dir)?;

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            match event {
                Ok(event) => {
                    if event.paths.iter().any(|p| p.file_name() == file_name.as_deref()) {
                        let _ = tx.send(());
                    }
                }
                Err(error) => warn!(%error, "config watch event error"),
            }
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        info!(dir = %dir.display(), "watching config directory");

        let store = Arc::clone(self);
        let thread = thread::Builder::new()
            .name("weir-config-watch".to_string())
            .spawn(move || {
                run_debounced(rx, DEBOUNCE_WINDOW, move || match store.load() {
                    Ok(snapshot) => on_reload(snapshot),
                    Err(error) => {
                        warn!(%error, "config reload failed, keeping previous snapshot");
                    }
                });
            })?;

        Ok(ConfigWatcher {
            watcher,
            thread: Some(thread),
        })
    }
}

/// Trailing-edge debounce: once an event arrives, keeps absorbing further
/// events until `window` passes with none, then fires once. Disconnection
/// with events pending still fires, so no observed change is lost at
/// shutdown.
fn run_debounced<F: FnMut()>(rx: Receiver<()>, window: Duration, mut on_change: F) {
    while rx.recv().is_ok() {
        loop {
            match rx.recv_timeout(window) {
                Ok(()) => continue,
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    on_change();
                    return;
                }
            }
        }
        debug!("debounce window elapsed, reloading config");
        on_change();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn debounce_coalesces_bursts() {
        let (tx, rx) = mpsc::channel();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let handle = thread::spawn(move || {
            run_debounced(rx, Duration::from_millis(50), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        });

        for _ in 0..10 {
            tx.send(()).unwrap();
        }
        thread::sleep(Duration::from_millis(250));
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        tx.send(()).unwrap();
        thread::sleep(Duration::from_millis(250));
        assert_eq!(fired.load(Ordering::SeqCst), 2);

        drop(tx);
        handle.join().unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn debounce_fires_for_events_pending_at_disconnect() {
        let (tx, rx) = mpsc::channel();
        tx.send(()).unwrap();
        tx.send(()).unwrap();
        drop(tx);

        let mut fired = 0;
        run_debounced(rx, Duration::from_millis(10), || fired += 1);
        assert_eq!(fired, 1);
    }

    #[test]
    fn watch_reloads_on_file_change() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ConfigStore::new(dir.path().join("weir.yaml")));

        let reloads = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&reloads);
        let watcher = store
            .watch(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let mut config = Config {
            save_dir: dir.path().join("captures"),
            ..Config::default()
        };
        config.filter_file_size.min_bytes = 1;
        store.save(&config).unwrap();

        for _ in 0..50 {
            if reloads.load(Ordering::SeqCst) >= 1 {
                break;
            }
            thread::sleep(Duration::from_millis(100));
        }
        assert!(reloads.load(Ordering::SeqCst) >= 1, "no reload observed");
        assert_eq!(store.current().filter_file_size.min_bytes, 1);

        watcher.stop();
    }

    #[test]
    fn events_for_other_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ConfigStore::new(dir.path().join("weir.yaml")));

        let reloads = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&reloads);
        let watcher = store
            .watch(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        std::fs::write(dir.path().join("unrelated.txt"), "x").unwrap();
        thread::sleep(Duration::from_millis(600));
        assert_eq!(reloads.load(Ordering::SeqCst), 0);

        watcher.stop();
    }
}
