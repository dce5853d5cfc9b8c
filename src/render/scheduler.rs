//! The renderer: an ordered set of roots and the transaction loop over them.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::clock::{Revision, RevisionClock};
use crate::config::{RenderMode, RendererConfig};
use crate::error::SchedulerError;
use crate::resolver::Resolver;
use crate::runloop::{HostLoop, Queue, TaskKey, TaskKind};
use crate::stats;

use super::registry;
use super::root::RenderRoot;
use super::{in_transaction, AttachPoint, RenderRuntime, RootOwner};

/// Unique identifier for a renderer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SchedulerId(u64);

static NEXT_SCHEDULER_ID: AtomicU64 = AtomicU64::new(1);

impl SchedulerId {
    pub fn next() -> Self {
        SchedulerId(NEXT_SCHEDULER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SchedulerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a renderer answers "where does this view live".
pub trait AttachmentStrategy {
    fn attachment_point(&self, view: &dyn RootOwner) -> Result<Option<AttachPoint>, SchedulerError>;
}

/// Views expose their elements.
#[derive(Clone, Copy, Debug, Default)]
pub struct Interactive;

impl AttachmentStrategy for Interactive {
    fn attachment_point(&self, view: &dyn RootOwner) -> Result<Option<AttachPoint>, SchedulerError> {
        Ok(view.element())
    }
}

/// Element access is an error.
#[derive(Clone, Copy, Debug, Default)]
pub struct Inert;

impl AttachmentStrategy for Inert {
    fn attachment_point(&self, view: &dyn RootOwner) -> Result<Option<AttachPoint>, SchedulerError> {
        Err(SchedulerError::InertElementAccess {
            view: view.view_id().to_string(),
        })
    }
}

/// Clears the transaction flag on every exit path.
struct TransactionGuard<'a>(&'a Cell<bool>);

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Renders a set of roots for one surface and keeps them in sync with the clock.
pub struct Renderer {
    id: SchedulerId,
    config: RendererConfig,
    clock: RevisionClock,
    host: Rc<dyn HostLoop>,
    runtime: Rc<dyn RenderRuntime>,
    resolver: Rc<Resolver>,
    attachment: Box<dyn AttachmentStrategy>,
    roots: RefCell<Vec<Rc<RenderRoot>>>,
    removed_roots: RefCell<Vec<Rc<RenderRoot>>>,
    last_committed: Cell<Revision>,
    in_transaction: Cell<bool>,
    retry_count: Cell<u32>,
    destroyed: Cell<bool>,
    this: Weak<Renderer>,
}

impl Renderer {
    /// Create a renderer and install the scheduler registry on `host`.
    pub fn new(
        config: RendererConfig,
        clock: RevisionClock,
        host: Rc<dyn HostLoop>,
        runtime: Rc<dyn RenderRuntime>,
        resolver: Rc<Resolver>,
    ) -> Rc<Self> {
        registry::install(&host);
        let attachment: Box<dyn AttachmentStrategy> = match config.mode {
            RenderMode::Interactive => Box::new(Interactive),
            RenderMode::Inert => Box::new(Inert),
        };
        Rc::new_cyclic(|this| Self {
            id: SchedulerId::next(),
            config,
            clock,
            host,
            runtime,
            resolver,
            attachment,
            roots: RefCell::new(Vec::new()),
            removed_roots: RefCell::new(Vec::new()),
            last_committed: Cell::new(Revision::NEVER),
            in_transaction: Cell::new(false),
            retry_count: Cell::new(0),
            destroyed: Cell::new(false),
            this: this.clone(),
        })
    }

    pub fn id(&self) -> SchedulerId {
        self.id
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn clock(&self) -> &RevisionClock {
        &self.clock
    }

    pub fn resolver(&self) -> &Rc<Resolver> {
        &self.resolver
    }

    pub fn is_interactive(&self) -> bool {
        self.config.mode.is_interactive()
    }

    pub fn roots_len(&self) -> usize {
        self.roots.borrow().len()
    }

    /// Snapshot of the current roots, in render order.
    pub fn roots(&self) -> Vec<Rc<RenderRoot>> {
        self.roots.borrow().clone()
    }

    pub fn last_committed_revision(&self) -> Revision {
        self.last_committed.get()
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count.get()
    }

    pub(crate) fn bump_retry_count(&self) -> u32 {
        let next = self.retry_count.get() + 1;
        self.retry_count.set(next);
        next
    }

    pub(crate) fn reset_retry_count(&self) {
        self.retry_count.set(0);
    }

    /// Whether nothing rendered by this renderer can be out of date.
    pub fn is_valid(&self) -> bool {
        self.destroyed.get()
            || self.roots.borrow().is_empty()
            || self.clock.is_valid_since(self.last_committed.get())
    }

    /// The element `view` rendered into, according to the render mode.
    pub fn element_for(&self, view: &dyn RootOwner) -> Result<Option<AttachPoint>, SchedulerError> {
        self.attachment.attachment_point(view)
    }

    /// Create a root for `view` rendering into `target` and render it before returning.
    pub fn attach_root(
        &self,
        view: Rc<dyn RootOwner>,
        target: AttachPoint,
    ) -> Result<(), SchedulerError> {
        if self.destroyed.get() {
            return Err(SchedulerError::Destroyed { scheduler: self.id });
        }
        let layout = view
            .layout()
            .ok_or_else(|| SchedulerError::MissingTemplate {
                view: view.view_id().to_string(),
            })?;
        let root = RenderRoot::new(
            view,
            self.runtime.clone(),
            self.resolver.clone(),
            layout,
            target,
            self.is_interactive(),
        );
        self.render_root(Rc::new(root))
    }

    fn render_root(&self, root: Rc<RenderRoot>) -> Result<(), SchedulerError> {
        log::debug!(
            "renderer {} attaching root {} ({})",
            self.id,
            root.id(),
            root.view_id()
        );
        stats::record_root_attached();
        let first = {
            let mut roots = self.roots.borrow_mut();
            roots.push(root);
            roots.len() == 1
        };
        if first {
            if let Some(this) = self.this.upgrade() {
                registry::register(&this);
            }
        }
        self.run_transaction()
    }

    /// Destroy every root rendering `view` and remove it.
    pub fn detach_root(&self, view: &dyn RootOwner) {
        if self.destroyed.get() {
            return;
        }

        if self.in_transaction.get() {
            // The loop is indexing into `roots`; leave removal to compaction.
            let matching: Vec<_> = self
                .roots
                .borrow()
                .iter()
                .filter(|root| root.is_for(view))
                .cloned()
                .collect();
            for root in matching {
                root.destroy();
                self.removed_roots.borrow_mut().push(root);
            }
            return;
        }

        let mut i = self.roots.borrow().len();
        while i > 0 {
            i -= 1;
            let root = self.roots.borrow().get(i).cloned();
            let Some(root) = root else {
                continue;
            };
            if root.is_for(view) {
                root.destroy();
                let mut roots = self.roots.borrow_mut();
                // Teardown may have removed roots behind our back.
                if let Some(position) = roots.iter().position(|r| Rc::ptr_eq(r, &root)) {
                    roots.remove(position);
                }
            }
        }

        if self.roots.borrow().is_empty() {
            registry::deregister(self);
        }
    }

    /// Request a revalidation on the next cycle. Roots only re-render if the
    /// clock moved since the last commit.
    pub fn rerender_all(&self) {
        self.schedule_revalidate();
    }

    /// Queue one coalesced revalidation for this renderer.
    pub fn schedule_revalidate(&self) {
        let this = self.this.clone();
        self.host.schedule_once(
            Queue::Render,
            TaskKey::new(self.id.get(), TaskKind::Revalidate),
            Box::new(move || match this.upgrade() {
                Some(renderer) => renderer.revalidate(),
                None => Ok(()),
            }),
        );
    }

    /// Run a transaction if the clock moved since the last commit.
    pub fn revalidate(&self) -> Result<(), SchedulerError> {
        if self.is_valid() {
            stats::record_revalidate_skipped();
            return Ok(());
        }
        self.run_transaction()
    }

    /// Render roots until no new roots appear.
    ///
    /// Reentrant calls return immediately: a root attached while another root
    /// renders is picked up by the outer loop.
    pub fn run_transaction(&self) -> Result<(), SchedulerError> {
        if self.in_transaction.get() {
            return Ok(());
        }
        self.in_transaction.set(true);
        let _guard = TransactionGuard(&self.in_transaction);
        stats::record_transaction();

        let result = self.render_roots();
        if result.is_err() {
            // Don't re-render the failing state on the next tick.
            self.last_committed.set(self.clock.current());
        }
        result
    }

    fn render_roots(&self) -> Result<(), SchedulerError> {
        let rendered = self.render_until_stable();

        // Roots destroyed during a failed pass are removed all the same.
        self.compact_removed_roots();
        if self.roots.borrow().is_empty() {
            registry::deregister(self);
        }
        rendered?;

        log::debug!(
            "renderer {} committed {} with {} roots",
            self.id,
            self.last_committed.get(),
            self.roots.borrow().len()
        );
        Ok(())
    }

    fn render_until_stable(&self) -> Result<(), SchedulerError> {
        loop {
            let initial_len = self.roots.borrow().len();
            // The commit runs post-render hooks after the revision is captured,
            // so state they mutate leaves the renderer invalid.
            in_transaction(&*self.runtime, || self.render_pass(initial_len))?;
            if self.roots.borrow().len() <= initial_len {
                return Ok(());
            }
        }
    }

    /// Render every root that existed when the pass started.
    fn render_pass(&self, initial_len: usize) -> Result<(), SchedulerError> {
        let mut i = 0;
        loop {
            let root = self.roots.borrow().get(i).cloned();
            let Some(root) = root else {
                break;
            };
            i += 1;

            if root.is_destroyed() {
                self.removed_roots.borrow_mut().push(root);
                continue;
            }
            // Added during this pass; the outer loop renders it.
            if i > initial_len {
                stats::record_root_deferred();
                continue;
            }

            stats::record_root_rendered();
            root.render().map_err(|source| SchedulerError::Render {
                root: root.id(),
                source,
            })?;
        }

        self.last_committed.set(self.clock.current());
        Ok(())
    }

    fn compact_removed_roots(&self) {
        loop {
            let removed = self.removed_roots.borrow_mut().pop();
            let Some(removed) = removed else {
                break;
            };
            let mut roots = self.roots.borrow_mut();
            if let Some(position) = roots.iter().position(|r| Rc::ptr_eq(r, &removed)) {
                roots.remove(position);
            }
        }
    }

    /// Destroy the renderer and all of its roots. Idempotent.
    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        log::info!("destroying renderer {}", self.id);
        self.clear_all_roots();
    }

    fn clear_all_roots(&self) {
        let roots = std::mem::take(&mut *self.roots.borrow_mut());
        for root in &roots {
            root.destroy();
        }
        self.removed_roots.borrow_mut().clear();
        if !roots.is_empty() {
            registry::deregister(self);
        }
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("id", &self.id)
            .field("mode", &self.config.mode)
            .field("roots", &self.roots_len())
            .field("last_committed", &self.last_committed.get())
            .field("in_transaction", &self.in_transaction.get())
            .field("retry_count", &self.retry_count.get())
            .field("destroyed", &self.destroyed.get())
            .finish_non_exhaustive()
    }
}
