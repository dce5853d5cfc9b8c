//! Render roots, renderers and the process-wide scheduler registry.
//!
//! # Overview
//!
//! - A [`Renderer`] owns an ordered list of [`RenderRoot`]s for one surface and
//!   runs the transaction loop that renders them until stable.
//! - The [`registry`] tracks every renderer holding at least one root, and is
//!   swept at the end of each host run-loop cycle.
//! - Actual template evaluation is delegated to a [`RenderRuntime`].
//!
//! The runtime traits below are the boundary to the template engine: the
//! renderer only brackets work in transactions, asks for an initial render and
//! afterwards for incremental re-renders.

pub mod registry;
mod root;
mod scheduler;
mod settle;

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::error::RenderError;
use crate::resolver::{Resolver, Template};

pub use root::{RenderRoot, RootId};
pub use scheduler::{AttachmentStrategy, Inert, Interactive, Renderer, SchedulerId};
pub use settle::Settled;

/// Consecutive invalid sweeps tolerated before a renderer is considered runaway.
pub const LOOP_LIMIT: u32 = 10;

/// Opaque attachment point a root renders into.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AttachPoint(Rc<str>);

impl AttachPoint {
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Scope values visible to everything rendered below a root.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DynamicScope {
    pub view: Option<String>,
    pub outlet: Option<String>,
}

impl DynamicScope {
    pub fn for_view(view: &str) -> Self {
        Self {
            view: Some(view.to_string()),
            outlet: None,
        }
    }
}

/// Initial arguments handed to the top-level layout.
pub type RootArgs = Option<Rc<dyn Any>>;

/// The object a root renders on behalf of (a component or an outlet view).
pub trait RootOwner {
    /// Stable identifier used to match roots on detach.
    fn view_id(&self) -> &str;

    /// Compiled top-level layout. `None` means the view cannot be rendered.
    fn layout(&self) -> Option<Rc<Template>>;

    /// Arguments for the top-level layout.
    fn args(&self) -> RootArgs {
        None
    }

    /// The element this view rendered into, if it has one.
    fn element(&self) -> Option<AttachPoint> {
        None
    }
}

/// Everything the runtime needs to perform a root's initial render.
pub struct RootFrame<'a> {
    pub root: RootId,
    pub owner: &'a Rc<dyn RootOwner>,
    pub layout: &'a Rc<Template>,
    pub args: &'a RootArgs,
    pub target: &'a AttachPoint,
    pub scope: &'a DynamicScope,
    pub interactive: bool,
    pub resolver: &'a Resolver,
}

impl fmt::Debug for RootFrame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootFrame")
            .field("root", &self.root)
            .field("view", &self.owner.view_id())
            .field("layout", self.layout)
            .field("target", self.target)
            .field("scope", self.scope)
            .field("interactive", &self.interactive)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RerenderOptions {
    /// Force every node to re-evaluate instead of only invalidated ones.
    pub always_revalidate: bool,
}

/// The template engine a renderer drives.
pub trait RenderRuntime {
    /// Open a render transaction.
    fn begin(&self);

    /// Close the current transaction, flushing deferred hooks and destructors.
    fn commit(&self);

    fn in_transaction(&self) -> bool;

    /// Prepare the initial render of a root.
    fn render_main(&self, frame: RootFrame<'_>) -> Box<dyn RenderIterator>;
}

/// A prepared initial render.
pub trait RenderIterator {
    /// Run the render to completion.
    fn sync(self: Box<Self>) -> Result<Box<dyn RenderResult>, RenderError>;
}

/// Output of a completed initial render.
pub trait RenderResult {
    /// Incrementally update the output.
    fn rerender(&mut self, options: RerenderOptions) -> Result<(), RenderError>;

    /// Tear down the output.
    fn destroy(&mut self);
}

struct CommitOnDrop<'a>(&'a dyn RenderRuntime);

impl Drop for CommitOnDrop<'_> {
    fn drop(&mut self) {
        self.0.commit();
    }
}

/// Run `f` inside a runtime transaction.
///
/// Joins the open transaction if there is one; otherwise opens a new one and
/// commits it when `f` returns, whether or not it failed.
pub fn in_transaction<R>(runtime: &dyn RenderRuntime, f: impl FnOnce() -> R) -> R {
    if runtime.in_transaction() {
        return f();
    }
    runtime.begin();
    let _commit = CommitOnDrop(runtime);
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct BracketRuntime {
        open: Cell<bool>,
        events: RefCell<Vec<&'static str>>,
    }

    impl RenderRuntime for BracketRuntime {
        fn begin(&self) {
            self.open.set(true);
            self.events.borrow_mut().push("begin");
        }

        fn commit(&self) {
            self.open.set(false);
            self.events.borrow_mut().push("commit");
        }

        fn in_transaction(&self) -> bool {
            self.open.get()
        }

        fn render_main(&self, _frame: RootFrame<'_>) -> Box<dyn RenderIterator> {
            unreachable!("bracket tests never render")
        }
    }

    #[test]
    fn test_in_transaction_brackets_once_when_nested() {
        let runtime = BracketRuntime::default();
        let value = in_transaction(&runtime, || {
            runtime.events.borrow_mut().push("outer");
            in_transaction(&runtime, || {
                runtime.events.borrow_mut().push("inner");
                7
            })
        });

        assert_eq!(value, 7);
        assert_eq!(
            *runtime.events.borrow(),
            vec!["begin", "outer", "inner", "commit"]
        );
    }

    #[test]
    fn test_in_transaction_commits_on_error() {
        let runtime = BracketRuntime::default();
        let result: Result<(), RenderError> =
            in_transaction(&runtime, || Err(RenderError::new("boom")));

        assert!(result.is_err());
        assert!(!runtime.in_transaction());
        assert_eq!(*runtime.events.borrow(), vec!["begin", "commit"]);
    }

    #[test]
    fn test_attach_point_name() {
        let point = AttachPoint::new("#main");
        assert_eq!(point.name(), "#main");
        assert_eq!(point, AttachPoint::new("#main"));
    }
}
