//! File-watch driven reloads.
//!
//! Watches the module file a loader has open and triggers the grace-period
//! reload variant when it changes, so deployments that overwrite a library
//! in place pick the new code up without anyone calling reload by hand.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::loader::Loader;

/// Reloads a [`Loader`] when its module file changes on disk.
///
/// Watches the path that was loaded at spawn time. Modify and create
/// events are debounced into one reload per burst, run on a dedicated
/// thread with the non-blocking (grace period) variant. Dropping the
/// watcher stops the thread.
pub struct ModuleWatcher {
    watcher: Option<RecommendedWatcher>,
    handle: Option<JoinHandle<()>>,
}

impl ModuleWatcher {
    /// Start watching the module file `loader` currently has loaded.
    ///
    /// Fails when nothing is loaded or the OS watch cannot be set up.
    pub fn spawn(loader: Arc<Loader>, debounce: Duration) -> Result<Self> {
        let path = loader
            .current_path()
            .ok_or_else(|| Error::Watch("no module loaded to watch".to_string()))?;

        let (tx, rx) = mpsc::channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        let _ = tx.send(());
                    }
                }
                Err(e) => warn!("Watch error: {}", e),
            },
            notify::Config::default(),
        )?;
        watcher.watch(&path, RecursiveMode::NonRecursive)?;
        info!("Watching {} for module changes", path.display());

        let handle = std::thread::spawn(move || {
            while rx.recv().is_ok() {
                // Collapse an event burst into one reload.
                while rx.recv_timeout(debounce).is_ok() {}
                debug!("Module file changed: {}", path.display());
                loader.reload(false);
            }
        });

        Ok(Self {
            watcher: Some(watcher),
            handle: Some(handle),
        })
    }
}

impl Drop for ModuleWatcher {
    fn drop(&mut self) {
        // Dropping the OS watcher disconnects the event channel, which
        // ends the thread's receive loop.
        self.watcher.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
