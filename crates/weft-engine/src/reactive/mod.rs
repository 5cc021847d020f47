//! Fine-grained reactivity.
//!
//! While a node runs its own `setup` and `execute` hooks, a [`Tracker`]
//! records the context paths read from the node's context lineage. Once the
//! node is done the tracker is swapped for a one-shot write listener on those
//! paths. A matching write queues the node for re-rendering with the context
//! and state it was entered with; a background task debounces the queue and
//! drains it, unless [`Renderer::flush`] gets there first.

mod scheduler;

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use tokio::sync::Notify;
use weft_dom::NodeId;

use crate::context::{AccessKind, ContextId, ListenerId};
use crate::renderer::PassFlags;
use crate::{Context, HookFailure, Pass, RenderError, Renderer, State};

/// Result of draining the re-render queue.
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Working node of every re-rendered entry, in queue order.
    pub rendered: Vec<NodeId>,
    /// Hook failures of non-strict entries.
    pub failures: Vec<HookFailure>,
}

/// How to replay a node's pass.
#[derive(Clone, Debug)]
pub(crate) struct Rerender {
    pub(crate) context: Context,
    pub(crate) state: State,
    pub(crate) flags: PassFlags,
}

/// Read log of one node.
struct ReadLog {
    lineage: Vec<ContextId>,
    paths: BTreeSet<String>,
}

/// Paths read by a node, and the context they were read through.
pub(crate) struct Tracked {
    context: Context,
    lineage: Vec<ContextId>,
    paths: BTreeSet<String>,
}

/// Read listener active while a node runs its own hooks.
pub(crate) struct Tracker {
    log: Rc<RefCell<ReadLog>>,
    context: Context,
    subscriptions: Vec<(Context, ListenerId)>,
}

impl Tracker {
    pub(crate) fn start(context: &Context) -> Self {
        let mut tracker = Self {
            log: Rc::new(RefCell::new(ReadLog {
                lineage: context.lineage(),
                paths: BTreeSet::new(),
            })),
            context: context.clone(),
            subscriptions: Vec::new(),
        };
        tracker.subscribe(context);
        tracker
    }

    fn subscribe(&mut self, context: &Context) {
        let log = Rc::clone(&self.log);
        let id = context.subscribe(move |event| {
            if event.kind != AccessKind::Read {
                return;
            }
            let mut log = log.borrow_mut();
            if log.lineage.contains(&event.origin) {
                log.paths.insert(event.path.clone());
            }
        });
        self.subscriptions.push((context.clone(), id));
    }

    /// Follow a context swapped in by `execute`. Listeners on other fork
    /// families are dropped.
    pub(crate) fn repoint(&mut self, context: &Context) {
        self.log.borrow_mut().lineage = context.lineage();
        self.subscriptions.retain(|(subscribed, id)| {
            let keep = subscribed.same_family(context);
            if !keep {
                subscribed.unsubscribe(*id);
            }
            keep
        });
        if self.subscriptions.is_empty() {
            self.subscribe(context);
        }
        self.context = context.clone();
    }

    pub(crate) fn finish(mut self) -> Tracked {
        self.release();
        let log = self.log.borrow();
        Tracked {
            context: self.context.clone(),
            lineage: log.lineage.clone(),
            paths: log.paths.clone(),
        }
    }

    fn release(&mut self) {
        for (context, id) in self.subscriptions.drain(..) {
            context.unsubscribe(id);
        }
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.release();
    }
}

struct WatchRecord {
    entry: Rerender,
    paths: BTreeSet<String>,
    subscription: (Context, ListenerId),
}

impl WatchRecord {
    fn release(&self) {
        let (context, id) = &self.subscription;
        context.unsubscribe(*id);
    }
}

/// Reactive bookkeeping of one renderer.
#[derive(Default)]
pub(crate) struct Reactive {
    watches: RefCell<HashMap<NodeId, WatchRecord>>,
    queue: RefCell<Vec<(NodeId, Rerender)>>,
    /// Bumped by every flush so the scheduler can drop a batch it no longer
    /// owns.
    epoch: Cell<u64>,
    notify: Rc<Notify>,
    scheduler: Cell<bool>,
}

impl Drop for Reactive {
    fn drop(&mut self) {
        for record in self.watches.get_mut().values() {
            record.release();
        }
        // Wakes the scheduler so it sees the renderer is gone
        self.notify.notify_one();
    }
}

/// Whether a write to `written` can change a read of `read`.
fn related(read: &str, written: &str) -> bool {
    fn covers(prefix: &str, path: &str) -> bool {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
    }
    covers(read, written) || covers(written, read)
}

impl Renderer {
    /// Install the write listener of a node that just finished its hooks.
    pub(crate) fn watch(&self, node: NodeId, entry: Rerender, tracked: Tracked) {
        if let Some(previous) = self.inner.reactive.watches.borrow_mut().remove(&node) {
            previous.release();
        }
        if tracked.paths.is_empty() {
            return;
        }

        let weak = Rc::downgrade(&self.inner);
        let paths = tracked.paths.clone();
        let lineage = tracked.lineage;
        let id = tracked.context.subscribe(move |event| {
            if event.kind != AccessKind::Write || !lineage.contains(&event.origin) {
                return;
            }
            if !paths.iter().any(|path| related(path, &event.path)) {
                return;
            }
            if let Some(inner) = weak.upgrade() {
                Renderer { inner }.trigger(node, &event.path);
            }
        });
        tracing::trace!(node = %node, paths = ?tracked.paths, "Watching node");
        self.inner.reactive.watches.borrow_mut().insert(
            node,
            WatchRecord {
                entry,
                paths: tracked.paths,
                subscription: (tracked.context, id),
            },
        );
    }

    /// Stop watching `node` and drop it from the re-render queue.
    pub fn unwatch(&self, node: NodeId) {
        let reactive = &self.inner.reactive;
        if let Some(record) = reactive.watches.borrow_mut().remove(&node) {
            record.release();
        }
        reactive.queue.borrow_mut().retain(|(pending, _)| *pending != node);
    }

    /// Context paths `node` is watching, sorted.
    #[must_use]
    pub fn watched_paths(&self, node: NodeId) -> Option<Vec<String>> {
        self.inner
            .reactive
            .watches
            .borrow()
            .get(&node)
            .map(|record| record.paths.iter().cloned().collect())
    }

    /// Nodes queued for re-rendering, in queue order.
    #[must_use]
    pub fn pending(&self) -> Vec<NodeId> {
        self.inner
            .reactive
            .queue
            .borrow()
            .iter()
            .map(|(node, _)| *node)
            .collect()
    }

    fn trigger(&self, node: NodeId, path: &str) {
        let Some(record) = self.inner.reactive.watches.borrow_mut().remove(&node) else {
            return;
        };
        record.release();
        tracing::debug!(node = %node, path, "Write to watched path");
        self.enqueue(node, record.entry);
    }

    /// Nearest ancestor of `node`, stepping from a detached original to the
    /// placeholder standing in for it.
    fn logical_parent(&self, node: NodeId) -> Option<NodeId> {
        self.document()
            .parent(node)
            .or_else(|| self.inner.morph.borrow().placeholder(node))
    }

    /// Whether `ancestor` is `node` or a logical ancestor of it.
    fn covers(&self, ancestor: NodeId, node: NodeId) -> bool {
        std::iter::successors(Some(node), |&current| self.logical_parent(current))
            .any(|current| current == ancestor)
    }

    /// Whether `node` sits inside an element swapped out for a placeholder.
    fn hidden(&self, node: NodeId) -> bool {
        let document = self.document();
        let top = document.ancestors(node).last().unwrap_or(node);
        self.inner.morph.borrow().placeholder(top).is_some()
    }

    /// Queue `node` unless a pending ancestor covers it; evict pending
    /// descendants it covers.
    fn enqueue(&self, node: NodeId, entry: Rerender) {
        {
            let pending = self.pending();
            if pending.iter().any(|&queued| self.covers(queued, node)) {
                tracing::trace!(node = %node, "Re-render covered by a pending ancestor");
                return;
            }
            let evicted: Vec<NodeId> = pending
                .into_iter()
                .filter(|&queued| self.covers(node, queued))
                .collect();
            let mut queue = self.inner.reactive.queue.borrow_mut();
            queue.retain(|(queued, _)| !evicted.contains(queued));
            queue.push((node, entry));
        }
        tracing::debug!(node = %node, "Queued re-render");
        self.inner.reactive.notify.notify_one();
    }

    /// Re-render every queued node now.
    ///
    /// Entries are rendered one by one; a failing entry never stops the rest.
    /// A batch already handed to the background scheduler is taken over, and
    /// the scheduler discards its own copy.
    ///
    /// # Errors
    ///
    /// [`RenderError::Aggregate`] with the failures of entries queued by strict
    /// renders, once the whole batch has run.
    pub async fn flush(&self) -> Result<FlushReport, RenderError> {
        let reactive = &self.inner.reactive;
        reactive.epoch.set(reactive.epoch.get() + 1);
        let batch = std::mem::take(&mut *reactive.queue.borrow_mut());
        tracing::debug!(nodes = batch.len(), "Flushing re-render queue");

        let mut report = FlushReport::default();
        let mut strict = Vec::new();
        for (node, entry) in batch {
            if self.hidden(node) {
                tracing::trace!(node = %node, "Skipping re-render of a hidden node");
                continue;
            }
            let pass = Pass::new(entry.flags);
            let rendered = self
                .render_subtree(node, &entry.context, &entry.state, &pass)
                .await;
            report.rendered.push(rendered);
            let failures = pass.into_failures();
            if entry.flags.strict {
                strict.extend(failures);
            } else {
                report.failures.extend(failures);
            }
        }

        if strict.is_empty() {
            Ok(report)
        } else {
            Err(RenderError::Aggregate(strict))
        }
    }

    /// Start the background scheduler once per renderer.
    ///
    /// # Panics
    ///
    /// Panics outside a [`tokio::task::LocalSet`].
    pub(crate) fn ensure_scheduler(&self) {
        let reactive = &self.inner.reactive;
        if reactive.scheduler.replace(true) {
            return;
        }
        tracing::debug!("Starting re-render scheduler");
        tokio::task::spawn_local(scheduler::run(
            Rc::downgrade(&self.inner),
            Rc::clone(&reactive.notify),
            self.inner.options.debounce,
            self.inner.options.settle,
        ));
    }
}
