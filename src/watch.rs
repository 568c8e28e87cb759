//! Store change watching with debouncing
//!
//! A notify watcher feeds matching filesystem events into a channel; a
//! background task coalesces each burst into a single callback once a
//! quiet period passes with no further events. The producer and consumer
//! share nothing but that channel.

use std::path::PathBuf;
use std::time::Duration;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::Result;
use crate::store::is_tracked_name;

/// Watches a store directory for tracked-file changes
pub struct StoreWatcher {
    store_dir: PathBuf,
    debounce: Duration,
}

/// Handle to a running watcher. Dropping it (or calling [`stop`]) ends the
/// background task; no callbacks fire afterwards.
///
/// [`stop`]: WatcherHandle::stop
pub struct WatcherHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    _watcher: RecommendedWatcher,
}

impl StoreWatcher {
    pub fn new(store_dir: PathBuf, debounce: Duration) -> Self {
        Self {
            store_dir,
            debounce,
        }
    }

    /// Start watching. Must be called from within a tokio runtime; the
    /// debounce loop runs on its own task and never blocks the caller.
    pub fn start<F>(&self, on_change: F) -> Result<WatcherHandle>
    where
        F: Fn() + Send + 'static,
    {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut watcher = recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if is_store_event(&event) => {
                let _ = event_tx.send(());
            }
            Ok(_) => {}
            Err(e) => warn!("filesystem watch error: {}", e),
        })?;
        watcher.watch(&self.store_dir, RecursiveMode::NonRecursive)?;
        debug!("watching {}", self.store_dir.display());

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(debounce_loop(event_rx, stop_rx, self.debounce, on_change));

        Ok(WatcherHandle {
            stop_tx,
            task,
            _watcher: watcher,
        })
    }
}

impl WatcherHandle {
    /// Stop watching and wait for the background task to finish
    pub async fn stop(self) {
        // dropping the notify watcher ends the event stream
        drop(self._watcher);
        let _ = self.stop_tx.send(true);
        let _ = self.task.await;
    }
}

/// Whether a notify event is a modification or creation of a tracked file.
/// Deletions are not completed writes and never trigger a sync.
pub fn is_store_event(event: &Event) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
        && event.paths.iter().any(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(is_tracked_name)
                .unwrap_or(false)
        })
}

/// Idle -> pending -> idle. Each event re-arms the deadline; when the
/// quiet period elapses without another event the callback fires once.
async fn debounce_loop<F>(
    mut events: mpsc::UnboundedReceiver<()>,
    mut stop: watch::Receiver<bool>,
    debounce: Duration,
    on_change: F,
) where
    F: Fn() + Send + 'static,
{
    let mut deadline: Option<Instant> = None;
    loop {
        // placeholder deadline keeps the disabled branch's argument valid
        let quiet_over = deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(86_400));
        tokio::select! {
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
            event = events.recv() => match event {
                Some(()) => {
                    deadline = Some(Instant::now() + debounce);
                }
                None => break,
            },
            _ = tokio::time::sleep_until(quiet_over), if deadline.is_some() => {
                deadline = None;
                debug!("store change settled, notifying");
                on_change();
            }
        }
    }
    debug!("store watcher stopped");
}
