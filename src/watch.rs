//! Watching the script directory and delivering debounced reload triggers.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use crate::debounce::{Classifier, Debouncer, ReloadTrigger};
use crate::error::Error;

/// Watches a directory and delivers debounced [`ReloadTrigger`]s.
///
/// The watcher starts delivering as soon as it is created, so an edit made
/// while the initial load is still running is not lost. Dropping the
/// `ChangeWatcher` stops the watcher and, with it, the debouncing thread.
pub struct ChangeWatcher {
    root: PathBuf,
    triggers: Receiver<ReloadTrigger>,
    _watcher: RecommendedWatcher,
}

impl ChangeWatcher {
    /// Start watching `root` recursively.
    ///
    /// Fails if `root` does not exist or the platform watcher cannot be set up.
    pub fn spawn<P: AsRef<Path>>(
        root: P,
        classifier: Classifier,
        window: Duration,
    ) -> Result<Self, Error> {
        let root = root.as_ref().to_path_buf();
        let watch_error = |source| Error::Watch {
            path: root.clone(),
            source,
        };

        let (event_tx, event_rx) = unbounded();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let _ = event_tx.send(res);
        })
        .map_err(watch_error)?;
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(watch_error)?;

        let (trigger_tx, trigger_rx) = unbounded();
        thread::Builder::new()
            .name("reload-debounce".into())
            .spawn(move || debounce_loop(event_rx, trigger_tx, classifier, window))
            .map_err(|e| watch_error(notify::Error::io(e)))?;

        log::debug!("watching {}", root.display());
        Ok(ChangeWatcher {
            root,
            triggers: trigger_rx,
            _watcher: watcher,
        })
    }

    /// The watched directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The receiving end of the trigger channel, for the supervisor to drain.
    pub fn triggers(&self) -> Receiver<ReloadTrigger> {
        self.triggers.clone()
    }
}

/// Runs on the debouncing thread until the watcher is dropped.
fn debounce_loop(
    events: Receiver<notify::Result<notify::Event>>,
    triggers: Sender<ReloadTrigger>,
    classifier: Classifier,
    window: Duration,
) {
    let mut debouncer = Debouncer::new(window);
    loop {
        let received = match debouncer.sleep_duration(Instant::now()) {
            Some(timeout) => events.recv_timeout(timeout),
            None => events.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(Ok(event)) => debouncer.add_event(&event, Instant::now()),
            Ok(Err(err)) => log::warn!("watch error: {err}"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let Some(batch) = debouncer.take_if_ready(Instant::now()) else {
            continue;
        };
        match classifier.classify(&batch) {
            Some(trigger) => {
                log::debug!("batch of {} change(s) -> {:?}", batch.len(), trigger);
                if triggers.send(trigger).is_err() {
                    break;
                }
            }
            None => log::debug!("ignoring batch of {} unrelated change(s)", batch.len()),
        }
    }
    log::debug!("debouncer stopped");
}
