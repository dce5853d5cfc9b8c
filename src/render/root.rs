//! Render roots: one top-level attachment point and its render state.
//!
//! A root performs its initial render the first time [`RenderRoot::render`] is
//! called and only revalidates incrementally afterwards. A root whose render
//! fails is parked: every later render call is a no-op that warns once.
//!
//! Destroying a root releases the owner and runtime it retains. Its result is
//! torn down inside a runtime transaction.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::RenderError;
use crate::resolver::{Resolver, Template};

use super::{
    in_transaction, AttachPoint, DynamicScope, RenderResult, RenderRuntime, RerenderOptions,
    RootArgs, RootFrame, RootOwner,
};

/// Unique identifier for a render root. Ids are never reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct RootId(u64);

static NEXT_ROOT_ID: AtomicU64 = AtomicU64::new(1);

impl RootId {
    pub fn next() -> Self {
        RootId(NEXT_ROOT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// References released when the root is destroyed.
#[derive(Clone)]
struct Retained {
    owner: Rc<dyn RootOwner>,
    runtime: Rc<dyn RenderRuntime>,
    resolver: Rc<Resolver>,
}

/// Inputs of the initial render, consumed by it.
struct InitialRender {
    layout: Rc<Template>,
    args: RootArgs,
    target: AttachPoint,
    scope: DynamicScope,
    interactive: bool,
}

enum Stage {
    Initial(InitialRender),
    Rendered(Box<dyn RenderResult>),
    /// The render state is checked out by an in-progress render call.
    Rendering,
    Failed {
        result: Option<Box<dyn RenderResult>>,
        warned: bool,
    },
    Destroyed,
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::Initial(_) => "initial",
            Stage::Rendered(_) => "rendered",
            Stage::Rendering => "rendering",
            Stage::Failed { .. } => "failed",
            Stage::Destroyed => "destroyed",
        }
    }
}

pub struct RenderRoot {
    id: RootId,
    view_id: String,
    retained: RefCell<Option<Retained>>,
    stage: RefCell<Stage>,
    destroyed: Cell<bool>,
}

impl RenderRoot {
    pub(crate) fn new(
        owner: Rc<dyn RootOwner>,
        runtime: Rc<dyn RenderRuntime>,
        resolver: Rc<Resolver>,
        layout: Rc<Template>,
        target: AttachPoint,
        interactive: bool,
    ) -> Self {
        let view_id = owner.view_id().to_string();
        let initial = InitialRender {
            layout,
            args: owner.args(),
            target,
            scope: DynamicScope::for_view(&view_id),
            interactive,
        };
        Self {
            id: RootId::next(),
            view_id,
            retained: RefCell::new(Some(Retained {
                owner,
                runtime,
                resolver,
            })),
            stage: RefCell::new(Stage::Initial(initial)),
            destroyed: Cell::new(false),
        }
    }

    pub fn id(&self) -> RootId {
        self.id
    }

    pub fn view_id(&self) -> &str {
        &self.view_id
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    /// Whether this root renders on behalf of the `view` object itself. Views
    /// are matched by identity, not by id. Destroyed roots match nothing.
    pub fn is_for(&self, view: &dyn RootOwner) -> bool {
        self.retained.borrow().as_ref().is_some_and(|retained| {
            std::ptr::addr_eq(Rc::as_ptr(&retained.owner), view)
        })
    }

    /// Whether the root holds a render result.
    pub fn has_result(&self) -> bool {
        matches!(
            &*self.stage.borrow(),
            Stage::Rendered(_) | Stage::Failed { result: Some(_), .. }
        )
    }

    pub fn has_failed(&self) -> bool {
        matches!(&*self.stage.borrow(), Stage::Failed { .. })
    }

    /// Whether a render of this parked root has already been warned about.
    pub fn has_warned(&self) -> bool {
        matches!(&*self.stage.borrow(), Stage::Failed { warned: true, .. })
    }

    /// Render the root: the initial render on first call, an incremental
    /// revalidation afterwards.
    ///
    /// The first failure is returned; the root is then parked and later calls
    /// only warn.
    pub fn render(&self) -> Result<(), RenderError> {
        if self.destroyed.get() {
            return Ok(());
        }
        let Some(retained) = self.retained.borrow().clone() else {
            return Ok(());
        };

        // No borrow of `stage` may be held while the runtime runs: rendering
        // can attach, detach or destroy roots, including this one.
        let stage = std::mem::replace(&mut *self.stage.borrow_mut(), Stage::Rendering);
        let runtime = &*retained.runtime;

        let (result, outcome) = match stage {
            Stage::Initial(initial) => {
                let frame = RootFrame {
                    root: self.id,
                    owner: &retained.owner,
                    layout: &initial.layout,
                    args: &initial.args,
                    target: &initial.target,
                    scope: &initial.scope,
                    interactive: initial.interactive,
                    resolver: &retained.resolver,
                };
                log::debug!("initial render of root {} ({})", self.id, self.view_id);
                match in_transaction(runtime, || runtime.render_main(frame).sync()) {
                    Ok(result) => (Some(result), Ok(())),
                    Err(err) => (None, Err(err)),
                }
            }
            Stage::Rendered(mut result) => {
                let outcome = in_transaction(runtime, || {
                    result.rerender(RerenderOptions {
                        always_revalidate: false,
                    })
                });
                (Some(result), outcome)
            }
            Stage::Failed { result, warned } => {
                if !warned {
                    log::warn!(
                        "attempted to rerender root {} ({}), but it hit an unrecoverable error during an earlier render; \
                         fix the cause of that error and reload",
                        self.id,
                        self.view_id
                    );
                }
                *self.stage.borrow_mut() = Stage::Failed {
                    result,
                    warned: true,
                };
                return Ok(());
            }
            stage @ (Stage::Rendering | Stage::Destroyed) => {
                log::debug!(
                    "ignoring render of root {} in stage {}",
                    self.id,
                    stage.name()
                );
                *self.stage.borrow_mut() = stage;
                return Ok(());
            }
        };

        if self.destroyed.get() {
            // Destroyed while rendering; the result it produced is torn down now.
            if let Some(mut result) = result {
                in_transaction(runtime, || result.destroy());
            }
            *self.stage.borrow_mut() = Stage::Destroyed;
            return outcome;
        }

        let next = match &outcome {
            Ok(()) => result.map_or(Stage::Destroyed, Stage::Rendered),
            Err(err) => {
                log::debug!("root {} failed to render: {}", self.id, err);
                Stage::Failed {
                    result,
                    warned: false,
                }
            }
        };
        *self.stage.borrow_mut() = next;
        outcome
    }

    /// Destroy the root. Only the first call has any effect.
    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        log::debug!("destroying root {} ({})", self.id, self.view_id);

        let retained = self.retained.borrow_mut().take();
        let stage = std::mem::replace(&mut *self.stage.borrow_mut(), Stage::Destroyed);
        let result = match stage {
            Stage::Rendered(result) => Some(result),
            Stage::Failed { result, .. } => result,
            // A render in progress destroys its own result when it returns.
            Stage::Initial(_) | Stage::Rendering | Stage::Destroyed => None,
        };

        if let (Some(mut result), Some(retained)) = (result, retained) {
            in_transaction(&*retained.runtime, || result.destroy());
        }
    }
}

impl fmt::Debug for RenderRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = self
            .stage
            .try_borrow()
            .map(|stage| stage.name())
            .unwrap_or("borrowed");
        f.debug_struct("RenderRoot")
            .field("id", &self.id)
            .field("view_id", &self.view_id)
            .field("stage", &stage)
            .field("destroyed", &self.destroyed.get())
            .finish_non_exhaustive()
    }
}
