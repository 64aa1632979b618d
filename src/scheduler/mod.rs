//! Scheduler - Drives reconciliation one fiber at a time.
//!
//! The scheduler is the single owner of all reconciler state: the fiber
//! arena, the queue of root requests and fiber updates, the active unit of
//! work, the pending commit, the fiber whose component is rendering, and
//! the one-time commit bootstrap state.
//!
//! # Architecture
//!
//! ```text
//! render / unmount ──▶ requests ─┐
//!                                ├─▶ step() ─▶ unit of work ─▶ commit ─▶ effects
//! StateSetter::set ──▶ updates ──┘        (one fiber per step)
//! ```
//!
//! Every request is its own unit of work, and units start in the order
//! their requests were made, root requests and fiber updates alike. Root
//! requests reconcile the container's root fiber against a new child list;
//! updates re-render the scheduled fiber, which acts as the unit root so
//! traversal and patch bubbling never leave its subtree. Traversal is depth-first: descend to
//! `child`, otherwise complete and move to `sibling`, otherwise complete the
//! parent and repeat. When the unit root completes its patch list is
//! committed.
//!
//! Nothing runs synchronously on request. The `on_schedule` callback from
//! [`SchedulerConfig`] tells the embedder a drive is due, and the embedder
//! calls [`Scheduler::flush`] once its current call stack has unwound.
//!
//! # Example
//!
//! ```ignore
//! use spark_fiber::{Document, Props, Scheduler, h};
//!
//! let mut doc = Document::new();
//! let container = doc.create_element("root");
//! let mut scheduler = Scheduler::new(doc);
//!
//! scheduler.render(h("ul", Props::new()), container);
//! let reports = scheduler.flush()?;
//! ```

mod config;
mod queue;

pub use config::*;
pub use queue::*;

use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use crate::commit::{CommitReport, CommitState, commit_patches, run_effects};
use crate::error::{ReconcileError, Result};
use crate::fiber::{Base, Fiber, FiberArena, FiberId};
use crate::hooks::{HookState, Hooks};
use crate::host::Host;
use crate::reconcile::{WorkJournal, reconcile_children, snapshot};
use crate::types::FiberTag;
use crate::vnode::{ElementType, Props, VNode};

// =============================================================================
// Requests
// =============================================================================

/// Root-level request waiting for a drive.
#[derive(Debug, Clone)]
pub enum WorkRequest<N> {
    /// Reconcile `container`'s content against `children`.
    Render { container: N, children: Vec<VNode> },
    /// Remove everything rendered into `container` and release its root.
    Unmount { container: N },
}

#[derive(Debug)]
enum UnitKind<N> {
    Root { container: N, unmount: bool },
    Update,
}

/// In-progress state of the active unit.
#[derive(Debug)]
struct UnitOfWork<N> {
    root: FiberId,
    kind: UnitKind<N>,
    journal: WorkJournal,
}

/// Result of one [`Scheduler::step`].
#[derive(Debug)]
pub enum Step {
    /// Nothing queued and nothing in progress.
    Idle,
    /// Processed the given fiber; the unit is not finished.
    Working(FiberId),
    /// Finished a unit and committed it.
    Committed(CommitReport),
}

// =============================================================================
// Scheduler
// =============================================================================

pub struct Scheduler<H: Host> {
    host: H,
    config: SchedulerConfig,
    fibers: FiberArena<H::Node>,

    queue: WorkQueue,
    updater: Updater,
    requests: VecDeque<(Ticket, WorkRequest<H::Node>)>,
    roots: HashMap<H::Node, FiberId>,

    unit: Option<UnitOfWork<H::Node>>,
    next_unit: Option<FiberId>,
    pending_commit: Option<FiberId>,
    current_fiber: Option<FiberId>,
    commit_state: CommitState<H::Node>,
}

impl<H: Host> Scheduler<H> {
    /// Scheduler with default configuration.
    pub fn new(host: H) -> Self {
        Self::with_config(host, SchedulerConfig::default())
    }

    pub fn with_config(host: H, config: SchedulerConfig) -> Self {
        let queue = WorkQueue::new(config.on_schedule.clone());
        let updater = queue.updater();
        let commit_state = CommitState::new(config.legacy_bootstrap_anchor);

        Self {
            host,
            config,
            fibers: FiberArena::new(),
            queue,
            updater,
            requests: VecDeque::new(),
            roots: HashMap::new(),
            unit: None,
            next_unit: None,
            pending_commit: None,
            current_fiber: None,
            commit_state,
        }
    }

    // -------------------------------------------------------------------------
    // Public operations
    // -------------------------------------------------------------------------

    /// Request that `container` show `vnode`.
    ///
    /// A container rendered before is updated against its committed tree.
    pub fn render(&mut self, vnode: VNode, container: H::Node) {
        self.render_children(vec![vnode], container);
    }

    /// Like [`Scheduler::render`] with several top-level vnodes.
    pub fn render_children(&mut self, children: Vec<VNode>, container: H::Node) {
        let ticket = self.queue.next_ticket();
        self.requests
            .push_back((ticket, WorkRequest::Render { container, children }));
        self.queue.request_drive();
    }

    /// Request removal of everything rendered into `container`.
    pub fn unmount(&mut self, container: H::Node) {
        let ticket = self.queue.next_ticket();
        self.requests
            .push_back((ticket, WorkRequest::Unmount { container }));
        self.queue.request_drive();
    }

    /// Queue `fiber` for re-processing on the next drive.
    pub fn schedule_work(&self, fiber: FiberId) {
        self.updater.schedule_work(fiber);
    }

    /// Handle for scheduling work without borrowing the scheduler.
    pub fn updater(&self) -> Updater {
        self.updater.clone()
    }

    /// Fiber whose component is rendering. `None` outside of a render.
    ///
    /// A render holds the scheduler mutably, so callers of this method only
    /// ever observe `None`. Inside a render function the current fiber is
    /// [`Hooks::fiber`].
    pub fn current_fiber(&self) -> Option<FiberId> {
        self.current_fiber
    }

    /// Whether a drive has been requested and not yet run.
    pub fn is_drive_requested(&self) -> bool {
        self.queue.is_drive_requested()
    }

    /// Whether any request, update or unit is outstanding.
    pub fn has_pending_work(&self) -> bool {
        self.unit.is_some() || !self.requests.is_empty() || !self.queue.is_empty()
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn fibers(&self) -> &FiberArena<H::Node> {
        &self.fibers
    }

    pub fn fiber(&self, id: FiberId) -> Option<&Fiber<H::Node>> {
        self.fibers.get(id)
    }

    /// Committed root fiber of `container`.
    pub fn root_of(&self, container: &H::Node) -> Option<FiberId> {
        self.roots.get(container).copied()
    }

    // -------------------------------------------------------------------------
    // Drive
    // -------------------------------------------------------------------------

    /// Run one drive cycle.
    ///
    /// Processes queued work unit by unit and returns a report per committed
    /// unit. Work requested while the drive runs (for example by a state
    /// setter called from an effect) is left for the next drive, which the
    /// `on_schedule` callback has already been told about.
    ///
    /// On error the failing unit is abandoned. Errors before commit leave
    /// the committed tree untouched and free the nodes the unit created.
    ///
    /// Errors during commit leave the patches applied so far in place and
    /// the fiber tree as rendered, so the host may lag behind it until the
    /// next render of the same content. Fibers whose placement never
    /// happened are placed again by that render. Updates and deletions that
    /// were not attempted are not replayed.
    pub fn flush(&mut self) -> Result<Vec<CommitReport>> {
        if !self.queue.take_drive_request() && self.unit.is_none() {
            return Ok(Vec::new());
        }

        let mut reports = Vec::new();
        loop {
            if self.unit.is_none() && self.queue.is_drive_requested() {
                break;
            }
            match self.step() {
                Ok(Step::Idle) => break,
                Ok(Step::Working(_)) => {}
                Ok(Step::Committed(report)) => reports.push(report),
                Err(err) => {
                    if self.has_pending_work() {
                        self.queue.request_drive();
                    }
                    return Err(err);
                }
            }
        }

        tracing::debug!(units = reports.len(), "drive finished");
        Ok(reports)
    }

    /// Process a single fiber, or commit the active unit if its traversal
    /// is complete.
    pub fn step(&mut self) -> Result<Step> {
        if self.unit.is_none() && !self.begin_next_unit()? {
            return Ok(Step::Idle);
        }

        let Some(id) = self.next_unit else {
            return self.commit_unit().map(Step::Committed);
        };

        match self.perform_unit_of_work(id) {
            Ok(next) => {
                self.next_unit = next;
                Ok(Step::Working(id))
            }
            Err(err) => {
                tracing::debug!(fiber = ?id, error = %err, "unit aborted before commit");
                self.abort_unit();
                Err(err)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Units of work
    // -------------------------------------------------------------------------

    /// Make the oldest queued root request or fiber update the active unit.
    fn begin_next_unit(&mut self) -> Result<bool> {
        loop {
            let request = self.requests.front().map(|(ticket, _)| *ticket);
            let update = self.queue.peek_update();

            match (request, update) {
                (None, None) => return Ok(false),
                (Some(request), update) if update.is_none_or(|update| request < update) => {
                    let Some((_, request)) = self.requests.pop_front() else {
                        return Ok(false);
                    };
                    if self.begin_root(request)? {
                        return Ok(true);
                    }
                }
                _ => {
                    let Some(fiber) = self.queue.pop_update() else {
                        return Ok(false);
                    };
                    if !self.fibers.contains(fiber) {
                        tracing::warn!(?fiber, "update scheduled for a released fiber, skipped");
                        continue;
                    }
                    let mut journal = WorkJournal::default();
                    snapshot(&mut self.fibers, &mut journal, fiber)?;
                    tracing::debug!(?fiber, "update unit started");
                    self.start(fiber, UnitKind::Update, journal);
                    return Ok(true);
                }
            }
        }
    }

    fn begin_root(&mut self, request: WorkRequest<H::Node>) -> Result<bool> {
        let (container, children, unmount) = match request {
            WorkRequest::Render { container, children } => (container, children, false),
            WorkRequest::Unmount { container } => (container, Vec::new(), true),
        };

        let mut journal = WorkJournal::default();
        let root = match self.roots.get(&container).copied() {
            Some(root) => {
                snapshot(&mut self.fibers, &mut journal, root)?;
                self.fibers.fiber_mut(root)?.props = Rc::new(Props {
                    children,
                    ..Props::default()
                });
                root
            }
            None if unmount => {
                tracing::debug!(?container, "unmount of a container with no root, ignored");
                return Ok(false);
            }
            None => {
                let root = self.fibers.insert(Fiber::root(container.clone(), children));
                journal.created.push(root);
                root
            }
        };

        tracing::debug!(?container, ?root, unmount, "root unit started");
        self.start(root, UnitKind::Root { container, unmount }, journal);
        Ok(true)
    }

    fn start(&mut self, root: FiberId, kind: UnitKind<H::Node>, journal: WorkJournal) {
        self.unit = Some(UnitOfWork {
            root,
            kind,
            journal,
        });
        self.next_unit = Some(root);
        self.pending_commit = None;
    }

    /// Begin work on `id`, then return the next fiber to process.
    fn perform_unit_of_work(&mut self, id: FiberId) -> Result<Option<FiberId>> {
        let Some(unit_root) = self.unit.as_ref().map(|unit| unit.root) else {
            return Ok(None);
        };
        let fiber = self.fibers.fiber(id)?;
        let tag = fiber.tag;
        tracing::trace!(fiber = ?id, ty = fiber.type_name(), "begin work");

        match tag {
            FiberTag::Hook => self.update_hook(id)?,
            FiberTag::Host | FiberTag::Root => self.update_host(id)?,
        }

        if let Some(child) = self.fibers.fiber(id)?.child {
            return Ok(Some(child));
        }

        let mut current = id;
        loop {
            self.complete_work(current, unit_root)?;
            if current == unit_root {
                return Ok(None);
            }
            let fiber = self.fibers.fiber(current)?;
            if let Some(sibling) = fiber.sibling {
                return Ok(Some(sibling));
            }
            match fiber.parent {
                Some(parent) => current = parent,
                None => return Ok(None),
            }
        }
    }

    fn update_host(&mut self, id: FiberId) -> Result<()> {
        let fiber = self.fibers.fiber(id)?;
        let props = fiber.props.clone();

        if fiber.tag == FiberTag::Host && fiber.base.is_none() {
            let ty = fiber.type_name().to_string();
            let node = self
                .host
                .create_node(&ty, &props)
                .map_err(ReconcileError::host("create_node"))?;
            self.fibers.fiber_mut(id)?.base = Some(Base::Node(node));
        }

        self.reconcile(id, &props.children)
    }

    fn update_hook(&mut self, id: FiberId) -> Result<()> {
        let fiber = self.fibers.fiber(id)?;
        let Some(ElementType::Component(component)) = fiber.ty.clone() else {
            return self.update_host(id);
        };
        let props = fiber.props.clone();
        let mut state = match self.fibers.fiber_mut(id)?.base.take() {
            Some(Base::Instance(state)) => state,
            _ => HookState::default(),
        };

        self.current_fiber = Some(id);
        let children = {
            let mut hooks = Hooks::new(&mut state, id, &self.updater);
            component.render(&props, &mut hooks)
        };
        self.current_fiber = None;

        self.fibers.fiber_mut(id)?.base = Some(Base::Instance(state));
        if let Some(unit) = self.unit.as_mut() {
            unit.journal.rendered.push(id);
        }

        self.reconcile(id, &children)
    }

    fn reconcile(&mut self, id: FiberId, children: &[VNode]) -> Result<()> {
        match self.unit.as_mut() {
            Some(unit) => reconcile_children(&mut self.fibers, &mut unit.journal, id, children),
            None => Ok(()),
        }
    }

    /// Fold `id`'s own patch and its bubbled patches into its parent, or
    /// hand the list to commit if `id` is the unit root.
    fn complete_work(&mut self, id: FiberId, unit_root: FiberId) -> Result<()> {
        if id == unit_root {
            self.pending_commit = Some(id);
            return Ok(());
        }

        let fiber = self.fibers.fiber_mut(id)?;
        let mut patches = std::mem::take(&mut fiber.patches);
        if !fiber.patch.is_empty() {
            patches.push(id);
        }
        let parent = fiber.parent.ok_or(ReconcileError::StaleFiber(id))?;
        self.fibers.fiber_mut(parent)?.patches.extend(patches);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Commit
    // -------------------------------------------------------------------------

    fn commit_unit(&mut self) -> Result<CommitReport> {
        let Some(mut unit) = self.unit.take() else {
            return Ok(CommitReport::default());
        };
        self.next_unit = None;
        let root = self.pending_commit.take().unwrap_or(unit.root);

        let patches = match self.fibers.get_mut(root) {
            Some(fiber) => std::mem::take(&mut fiber.patches),
            None => Vec::new(),
        };
        let applied = commit_patches(
            &mut self.host,
            &mut self.fibers,
            &mut self.commit_state,
            &patches,
        );
        unit.journal.finish(&mut self.fibers);

        if let UnitKind::Root { container, unmount } = unit.kind {
            if unmount {
                let released = self.fibers.remove_subtree(root);
                self.roots.remove(&container);
                tracing::debug!(?container, released, "root unmounted");
            } else {
                self.roots.insert(container, root);
            }
        }

        let report = CommitReport {
            patches: applied?,
            effects_run: run_effects(&self.fibers, &unit.journal.rendered)?,
        };

        tracing::debug!(
            ?root,
            placed = report.placed(),
            updated = report.updated(),
            deleted = report.deleted(),
            effects = report.effects_run,
            "unit committed"
        );
        Ok(report)
    }

    /// Drop the active unit, free the nodes it created and restore the
    /// committed tree.
    fn abort_unit(&mut self) {
        if let Some(mut unit) = self.unit.take() {
            // Nothing is inserted before commit, so these nodes are detached
            let created: Vec<H::Node> = unit
                .journal
                .created
                .iter()
                .filter_map(|&id| self.fibers.get(id))
                .filter(|fiber| fiber.has_own_node())
                .filter_map(|fiber| fiber.node().cloned())
                .collect();
            unit.journal.rollback(&mut self.fibers);

            for node in created {
                if let Err(err) = self.host.release_node(&node) {
                    tracing::warn!(?node, error = %err, "failed to release node of aborted unit");
                }
            }
        }
        self.next_unit = None;
        self.pending_commit = None;
        self.current_fiber = None;
    }
}
