// src/watch/watcher.rs

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, trace, warn};

use crate::engine::cancel::{self, CancelHandle};
use crate::engine::BuildSession;
use crate::fs::FileSystem;
use crate::types::{ChangeEvent, ChangeKind, TaskId};
use crate::watch::debounce::Debouncer;
use crate::watch::dispatch::DispatchTarget;
use crate::watch::hash::HashGate;
use crate::watch::path_utils::{is_within, relative_str};
use crate::watch::patterns::TaskWatchProfile;

/// Watcher tuning.
#[derive(Debug, Clone)]
pub struct WatchSettings {
    /// Debounce window.
    pub debounce: Duration,
    /// Directories, relative to the root, whose events are ignored (the
    /// output root, so the build does not trigger itself).
    pub ignore: Vec<PathBuf>,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(100),
            ignore: Vec::new(),
        }
    }
}

/// Handle for a running watcher.
///
/// Dropping it stops the watcher as well; [`stop_and_wait`](Self::stop_and_wait)
/// additionally waits for an in-flight dispatch to finish.
pub struct WatcherHandle {
    stop_tx: watch::Sender<bool>,
    join: Option<JoinHandle<()>>,
    notify: Option<RecommendedWatcher>,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("subscribed", &self.notify.is_some())
            .finish_non_exhaustive()
    }
}

impl WatcherHandle {
    /// Stop receiving filesystem events. An in-flight dispatch runs to
    /// completion; no new dispatch is started.
    pub fn stop(&mut self) {
        // Dropping the notify watcher ends the subscription.
        self.notify.take();
        self.stop_tx.send_replace(true);
    }

    pub async fn stop_and_wait(mut self) {
        self.stop();
        if let Some(join) = self.join.take() {
            if let Err(err) = join.await {
                warn!(error = %err, "watcher event loop ended abnormally");
            }
        }
    }
}

fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(ChangeKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(ChangeKind::Created),
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        EventKind::Remove(_) => Some(ChangeKind::Deleted),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

/// Watch `root` recursively and dispatch affected tasks to `target`.
///
/// - `profiles` maps path patterns to task identifiers.
/// - `fs` is used for content hashing of `use_hash` tasks.
pub fn watch(
    root: impl Into<PathBuf>,
    profiles: Vec<TaskWatchProfile>,
    settings: WatchSettings,
    fs: Arc<dyn FileSystem>,
    target: Arc<dyn DispatchTarget>,
) -> Result<WatcherHandle> {
    let root = root.into();
    // Canonicalize once so we have a stable base path.
    let root = root.canonicalize().unwrap_or(root);

    let (event_tx, event_rx) = mpsc::unbounded_channel::<ChangeEvent>();

    // Called synchronously by notify on its own thread.
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let Some(kind) = change_kind(&event.kind) else {
                    return;
                };
                for path in event.paths {
                    if event_tx.send(ChangeEvent::new(path, kind)).is_err() {
                        return;
                    }
                }
            }
            Err(err) => warn!("file watch error: {err}"),
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;
    info!("file watcher started on {:?}", root);

    let mut handle = spawn_event_loop(root, profiles, settings, fs, target, event_rx);
    handle.notify = Some(watcher);
    Ok(handle)
}

/// Run the debounce/dispatch loop over an arbitrary event source.
///
/// [`watch`] feeds it from `notify`; tests feed it directly.
pub fn spawn_event_loop(
    root: impl Into<PathBuf>,
    profiles: Vec<TaskWatchProfile>,
    settings: WatchSettings,
    fs: Arc<dyn FileSystem>,
    target: Arc<dyn DispatchTarget>,
    events: mpsc::UnboundedReceiver<ChangeEvent>,
) -> WatcherHandle {
    let root = root.into();
    let (stop_tx, stop_rx) = watch::channel(false);

    let gate = HashGate::new(fs, root.clone(), settings.ignore.clone());
    let event_loop = EventLoop {
        root,
        debouncer: Debouncer::new(settings.debounce),
        settings,
        profiles: Arc::new(profiles),
        gate: Arc::new(Mutex::new(gate)),
        target,
        inflight: None,
    };

    let join = tokio::spawn(event_loop.run(events, stop_rx));

    WatcherHandle {
        stop_tx,
        join: Some(join),
        notify: None,
    }
}

struct InFlight {
    tasks: BTreeSet<TaskId>,
    cancel: CancelHandle,
    join: JoinHandle<BuildSession>,
}

struct EventLoop {
    root: PathBuf,
    settings: WatchSettings,
    profiles: Arc<Vec<TaskWatchProfile>>,
    gate: Arc<Mutex<HashGate>>,
    target: Arc<dyn DispatchTarget>,
    debouncer: Debouncer,
    inflight: Option<InFlight>,
}

impl EventLoop {
    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<ChangeEvent>,
        mut stop_rx: watch::Receiver<bool>,
    ) {
        self.prime_hashes().await;

        let mut events_open = true;
        loop {
            let deadline = self.debouncer.deadline();

            tokio::select! {
                biased;

                // Also fires when the handle is dropped.
                _ = stop_rx.changed() => {
                    debug!("watcher stop requested");
                    break;
                }

                maybe = events.recv(), if events_open => match maybe {
                    Some(event) => self.observe(event),
                    None => {
                        debug!("event source closed");
                        events_open = false;
                    }
                },

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some(batch) = self.debouncer.poll(Instant::now()) {
                        if self.dispatch(batch, &mut stop_rx).await == Dispatched::Stopped {
                            debug!("watcher stop requested during dispatch");
                            break;
                        }
                    }
                }

                finished = wait_inflight(&mut self.inflight), if self.inflight.is_some() => {
                    self.inflight = None;
                    if let Err(err) = finished {
                        warn!(error = %err, "dispatch ended abnormally");
                    }
                }
            }
        }

        // Let the current pass finish; pending events are dropped.
        if let Some(inflight) = self.inflight.take() {
            debug!(tasks = ?inflight.tasks, "waiting for in-flight pass before stopping");
            if let Err(err) = inflight.join.await {
                warn!(error = %err, "dispatch ended abnormally");
            }
        }
        self.debouncer.reset();
        debug!("watcher event loop finished");
    }

    async fn prime_hashes(&self) {
        if !self.profiles.iter().any(|p| p.use_hash()) {
            return;
        }
        let gate = Arc::clone(&self.gate);
        let profiles = Arc::clone(&self.profiles);
        let primed = tokio::task::spawn_blocking(move || {
            let mut gate = gate.lock().unwrap_or_else(|p| p.into_inner());
            gate.prime(&profiles);
        })
        .await;
        if let Err(err) = primed {
            warn!(error = %err, "failed to prime content hashes");
        }
    }

    fn observe(&mut self, event: ChangeEvent) {
        let Some(rel) = relative_str(&self.root, &event.path) else {
            debug!(path = ?event.path, "event outside watch root");
            return;
        };
        if self.settings.ignore.iter().any(|dir| is_within(&rel, dir)) {
            trace!(path = %rel, "ignoring event in output root");
            return;
        }
        if !self.profiles.iter().any(|p| p.matches(&rel)) {
            trace!(path = %rel, "no task watches this path");
            return;
        }
        debug!(path = %rel, kind = %event.kind, "change observed");
        self.debouncer.observe(event, Instant::now());
    }

    /// Tasks whose patterns match one of `batch`, after hash gating.
    async fn affected_tasks(&self, batch: &[ChangeEvent]) -> BTreeSet<TaskId> {
        let rels: Vec<String> = batch
            .iter()
            .filter_map(|e| relative_str(&self.root, &e.path))
            .collect();

        let candidates: Vec<usize> = self
            .profiles
            .iter()
            .enumerate()
            .filter(|(_, p)| rels.iter().any(|rel| p.matches(rel)))
            .map(|(i, _)| i)
            .collect();

        let fallback: BTreeSet<TaskId> = candidates
            .iter()
            .map(|i| self.profiles[*i].task().to_string())
            .collect();

        if !candidates.iter().any(|i| self.profiles[*i].use_hash()) {
            return fallback;
        }

        let gate = Arc::clone(&self.gate);
        let profiles = Arc::clone(&self.profiles);
        let changed: Vec<PathBuf> = batch.iter().map(|e| e.path.clone()).collect();

        tokio::task::spawn_blocking(move || {
            let mut gate = gate.lock().unwrap_or_else(|p| p.into_inner());
            gate.invalidate(&changed);
            candidates
                .into_iter()
                .filter(|i| gate.should_trigger(&profiles[*i]))
                .map(|i| profiles[i].task().to_string())
                .collect()
        })
        .await
        .unwrap_or_else(|err| {
            warn!(error = %err, "hash check failed; triggering all matching tasks");
            fallback
        })
    }

    /// Start a pass for `batch`, cancelling and folding in the previous one.
    ///
    /// Stop requests seen while waiting on the previous pass win: no new
    /// pass is spawned after the handle asked to stop.
    async fn dispatch(
        &mut self,
        batch: Vec<ChangeEvent>,
        stop_rx: &mut watch::Receiver<bool>,
    ) -> Dispatched {
        let mut tasks = self.affected_tasks(&batch).await;
        if tasks.is_empty() {
            debug!(events = batch.len(), "debounced batch affects no task");
            return Dispatched::Skipped;
        }

        if let Some(mut previous) = self.inflight.take() {
            if !previous.join.is_finished() {
                info!(tasks = ?previous.tasks, "cancelling in-flight pass");
            }
            previous.cancel.cancel();

            let finished = tokio::select! {
                biased;

                _ = stop_rx.changed() => None,
                finished = &mut previous.join => Some(finished),
            };
            match finished {
                None => {
                    self.inflight = Some(previous);
                    return Dispatched::Stopped;
                }
                Some(Ok(session)) if session.was_cancelled() => tasks.extend(previous.tasks),
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(error = %err, "previous dispatch ended abnormally");
                    tasks.extend(previous.tasks);
                }
            }
        }

        // A pending change or a dropped handle both mean stop.
        if stop_rx.has_changed().unwrap_or(true) {
            return Dispatched::Stopped;
        }

        info!(tasks = ?tasks, events = batch.len(), "dispatching affected tasks");
        let (cancel, signal) = cancel::pair();
        let target = Arc::clone(&self.target);
        let dispatched = tasks.clone();
        let join = tokio::spawn(async move { target.dispatch(dispatched, signal).await });

        self.inflight = Some(InFlight {
            tasks,
            cancel,
            join,
        });
        Dispatched::Started
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatched {
    Started,
    Skipped,
    Stopped,
}

async fn wait_inflight(
    inflight: &mut Option<InFlight>,
) -> std::result::Result<BuildSession, tokio::task::JoinError> {
    match inflight {
        Some(f) => (&mut f.join).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_kinds_map_to_change_kinds() {
        use notify::event::{AccessKind, CreateKind, DataChange, RemoveKind};

        assert_eq!(
            change_kind(&EventKind::Create(CreateKind::File)),
            Some(ChangeKind::Created)
        );
        assert_eq!(
            change_kind(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(ChangeKind::Modified)
        );
        assert_eq!(
            change_kind(&EventKind::Modify(ModifyKind::Name(RenameMode::From))),
            Some(ChangeKind::Deleted)
        );
        assert_eq!(
            change_kind(&EventKind::Remove(RemoveKind::File)),
            Some(ChangeKind::Deleted)
        );
        assert_eq!(change_kind(&EventKind::Access(AccessKind::Any)), None);
    }
}
