//! Scope watcher
//!
//! The store has no change feed, so each watcher polls the membership
//! markers under its prefix and diffs successive snapshots:
//!
//! ```text
//! tick:  scan_prefix(relation_refs, "<scope>#<role>#") -> unit names   (blocking pool)
//!          diff(known, current) -> departed(..), joined(..)
//!          send events (bounded channel, cancellable)
//!        sleep(poll_interval)
//! ```
//!
//! The first tick reports every unit already in scope as joined. Markers
//! that appear and disappear between two ticks are never reported, so the
//! events for a single unit always alternate joined / departed.
//!
//! Transient store errors are logged and retried on the next tick. Any other
//! error ends the watcher and is returned by [`RelationScopeWatcher::stop`].

use std::collections::BTreeSet;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;

use super::keys::unit_name_from_key;
use crate::metrics::SCOPE_EVENT_METRIC;
use crate::Collection;
use crate::Result;
use crate::State;
use crate::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeEventKind {
    Joined,
    Departed,
}

impl ScopeEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeEventKind::Joined => "joined",
            ScopeEventKind::Departed => "departed",
        }
    }
}

/// A counterpart unit entering or leaving the watched scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeEvent {
    pub kind: ScopeEventKind,
    pub unit_name: String,
}

impl ScopeEvent {
    pub fn joined(unit_name: impl Into<String>) -> Self {
        Self {
            kind: ScopeEventKind::Joined,
            unit_name: unit_name.into(),
        }
    }

    pub fn departed(unit_name: impl Into<String>) -> Self {
        Self {
            kind: ScopeEventKind::Departed,
            unit_name: unit_name.into(),
        }
    }
}

impl fmt::Display for ScopeEvent {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{} {}", self.unit_name, self.kind.as_str())
    }
}

/// Handle on a running scope watch.
///
/// Dropping the handle cancels the watch.
pub struct RelationScopeWatcher {
    id: u64,
    prefix: String,
    st: State,
    events: mpsc::Receiver<ScopeEvent>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<Result<()>>>,
}

impl fmt::Debug for RelationScopeWatcher {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("RelationScopeWatcher")
            .field("id", &self.id)
            .field("prefix", &self.prefix)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl RelationScopeWatcher {
    /// Starts watching markers under `prefix`, ignoring unit `ignore`.
    pub(crate) fn spawn(
        st: State,
        prefix: String,
        ignore: String,
    ) -> Self {
        let (id, cancel) = st.register_watcher(&prefix);
        let config = &st.config().watcher;
        let (tx, rx) = mpsc::channel(config.event_buffer_size);

        let scan = Arc::new(ScopeScan {
            store: st.shared_store(),
            prefix: prefix.clone(),
            ignore,
        });
        let handle = tokio::spawn(watch_loop(scan, config.poll_interval(), tx, cancel.clone()));
        debug!(watcher_id = id, %prefix, "scope watcher started");

        Self {
            id,
            prefix,
            st,
            events: rx,
            cancel,
            handle: Some(handle),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The membership key prefix being watched.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Waits for the next event; `None` once the watcher is cancelled or
    /// has stopped.
    pub async fn next(&mut self) -> Option<ScopeEvent> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    /// Stops event delivery. Safe to call while a poll is in flight.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancels the watch and waits for the polling task to finish,
    /// returning the error that ended it, if any.
    pub async fn stop(mut self) -> Result<()> {
        self.cancel.cancel();
        match self.handle.take() {
            Some(handle) => handle.await?,
            None => Ok(()),
        }
    }
}

impl Drop for RelationScopeWatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.st.unregister_watcher(self.id);
        trace!(watcher_id = self.id, "scope watcher dropped");
    }
}

impl Stream for RelationScopeWatcher {
    type Item = ScopeEvent;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        // the sender is dropped when the task exits, which wakes us on cancel
        this.events.poll_recv(cx)
    }
}

struct ScopeScan {
    store: Arc<dyn Store>,
    prefix: String,
    ignore: String,
}

impl ScopeScan {
    /// Names of the units currently in scope.
    fn units(&self) -> Result<BTreeSet<String>> {
        let keys = self.store.scan_prefix(Collection::RelationRefs, &self.prefix)?;
        Ok(keys
            .iter()
            .map(|key| unit_name_from_key(key))
            .filter(|name| *name != self.ignore)
            .map(str::to_string)
            .collect())
    }
}

async fn watch_loop(
    scan: Arc<ScopeScan>,
    poll_interval: Duration,
    tx: mpsc::Sender<ScopeEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut known: Option<BTreeSet<String>> = None;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let scan_task = scan.clone();
        let scanned = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            res = tokio::task::spawn_blocking(move || scan_task.units()) => res,
        };
        let scanned = match scanned {
            Ok(res) => res,
            Err(e) => Err(e.into()),
        };

        match scanned {
            Ok(current) => {
                for event in diff_scope(known.as_ref(), &current) {
                    let kind = event.kind;
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Ok(()),
                        sent = tx.send(event) => {
                            if sent.is_err() {
                                debug!(prefix = %scan.prefix, "scope event receiver dropped");
                                return Ok(());
                            }
                            SCOPE_EVENT_METRIC.with_label_values(&[kind.as_str()]).inc();
                        }
                    }
                }
                known = Some(current);
            }
            Err(e) if e.is_retryable() => {
                warn!(prefix = %scan.prefix, "scope scan failed, retrying: {}", e);
            }
            Err(e) => {
                error!(prefix = %scan.prefix, "scope watcher stopped: {}", e);
                return Err(e);
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }

    debug!(prefix = %scan.prefix, "scope watcher cancelled");
    Ok(())
}

/// Events turning `known` into `current`; departures first, each group in
/// unit name order. With no previous snapshot every unit has joined.
pub(crate) fn diff_scope(
    known: Option<&BTreeSet<String>>,
    current: &BTreeSet<String>,
) -> Vec<ScopeEvent> {
    let Some(known) = known else {
        return current.iter().map(ScopeEvent::joined).collect();
    };

    known
        .difference(current)
        .map(ScopeEvent::departed)
        .chain(current.difference(known).map(ScopeEvent::joined))
        .collect()
}
