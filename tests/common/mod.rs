//! Shared fixtures: a recording render runtime and simple root owners.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use vellum::prelude::*;
use vellum::render::registry;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Render,
    Rerender,
    Destroy,
}

pub type Hook = Rc<dyn Fn(Phase) -> Result<(), RenderError>>;
pub type FrameObserver = Rc<dyn Fn(&RootFrame<'_>)>;

#[derive(Default)]
struct RuntimeState {
    log: RefCell<Vec<String>>,
    open: Cell<bool>,
    begins: Cell<u32>,
    commits: Cell<u32>,
    hooks: RefCell<HashMap<String, Hook>>,
    commit_hook: RefCell<Option<Rc<dyn Fn()>>>,
    frame_observer: RefCell<Option<FrameObserver>>,
}

impl RuntimeState {
    fn record(&self, phase: Phase, view: &str) -> Result<(), RenderError> {
        let label = match phase {
            Phase::Render => "render",
            Phase::Rerender => "rerender",
            Phase::Destroy => "destroy",
        };
        self.log.borrow_mut().push(format!("{label}:{view}"));
        let hook = self.hooks.borrow().get(view).cloned();
        match hook {
            Some(hook) => hook(phase),
            None => Ok(()),
        }
    }
}

/// Render runtime that records every render, rerender and destroy.
#[derive(Clone, Default)]
pub struct TestRuntime {
    state: Rc<RuntimeState>,
}

impl TestRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `hook` after each render, rerender and destroy of `view`.
    pub fn on_view(&self, view: &str, hook: impl Fn(Phase) -> Result<(), RenderError> + 'static) {
        self.state
            .hooks
            .borrow_mut()
            .insert(view.to_string(), Rc::new(hook));
    }

    /// Run `hook` every time a transaction commits.
    pub fn on_commit(&self, hook: impl Fn() + 'static) {
        *self.state.commit_hook.borrow_mut() = Some(Rc::new(hook));
    }

    pub fn clear_commit_hook(&self) {
        self.state.commit_hook.borrow_mut().take();
    }

    pub fn observe_frames(&self, observer: impl Fn(&RootFrame<'_>) + 'static) {
        *self.state.frame_observer.borrow_mut() = Some(Rc::new(observer));
    }

    pub fn log(&self) -> Vec<String> {
        self.state.log.borrow().clone()
    }

    pub fn clear_log(&self) {
        self.state.log.borrow_mut().clear();
    }

    /// Number of log entries for `phase` on `view`.
    pub fn count(&self, phase: Phase, view: &str) -> usize {
        let entry = match phase {
            Phase::Render => format!("render:{view}"),
            Phase::Rerender => format!("rerender:{view}"),
            Phase::Destroy => format!("destroy:{view}"),
        };
        self.state
            .log
            .borrow()
            .iter()
            .filter(|e| **e == entry)
            .count()
    }

    pub fn begins(&self) -> u32 {
        self.state.begins.get()
    }

    pub fn commits(&self) -> u32 {
        self.state.commits.get()
    }
}

impl RenderRuntime for TestRuntime {
    fn begin(&self) {
        assert!(!self.state.open.get(), "transaction already open");
        self.state.open.set(true);
        self.state.begins.set(self.state.begins.get() + 1);
    }

    fn commit(&self) {
        assert!(self.state.open.get(), "commit without begin");
        self.state.open.set(false);
        self.state.commits.set(self.state.commits.get() + 1);
        let hook = self.state.commit_hook.borrow().clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    fn in_transaction(&self) -> bool {
        self.state.open.get()
    }

    fn render_main(&self, frame: RootFrame<'_>) -> Box<dyn RenderIterator> {
        let observer = self.state.frame_observer.borrow().clone();
        if let Some(observer) = observer {
            observer(&frame);
        }
        Box::new(TestIterator {
            view: frame.owner.view_id().to_string(),
            state: self.state.clone(),
        })
    }
}

struct TestIterator {
    view: String,
    state: Rc<RuntimeState>,
}

impl RenderIterator for TestIterator {
    fn sync(self: Box<Self>) -> Result<Box<dyn RenderResult>, RenderError> {
        self.state.record(Phase::Render, &self.view)?;
        Ok(Box::new(TestResult {
            view: self.view,
            state: self.state,
        }))
    }
}

struct TestResult {
    view: String,
    state: Rc<RuntimeState>,
}

impl RenderResult for TestResult {
    fn rerender(&mut self, options: RerenderOptions) -> Result<(), RenderError> {
        assert!(!options.always_revalidate);
        self.state.record(Phase::Rerender, &self.view)
    }

    fn destroy(&mut self) {
        let _ = self.state.record(Phase::Destroy, &self.view);
    }
}

/// A root owner with a fixed id and layout.
pub struct TestView {
    id: String,
    layout: Option<Rc<Template>>,
    element: Option<AttachPoint>,
}

impl TestView {
    pub fn new(id: &str) -> Rc<Self> {
        Rc::new(Self {
            id: id.to_string(),
            layout: Some(Rc::new(Template::new(format!("{id}/layout")))),
            element: Some(AttachPoint::new(format!("#{id}"))),
        })
    }

    pub fn without_layout(id: &str) -> Rc<Self> {
        Rc::new(Self {
            id: id.to_string(),
            layout: None,
            element: None,
        })
    }
}

impl RootOwner for TestView {
    fn view_id(&self) -> &str {
        &self.id
    }

    fn layout(&self) -> Option<Rc<Template>> {
        self.layout.clone()
    }

    fn element(&self) -> Option<AttachPoint> {
        self.element.clone()
    }
}

/// A renderer wired to a fresh run-loop, clock and recording runtime.
pub struct Harness {
    pub host: Rc<RunLoop>,
    pub clock: RevisionClock,
    pub runtime: TestRuntime,
    pub resolver: Rc<Resolver>,
    pub renderer: Rc<Renderer>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(RendererConfig::default())
    }

    pub fn with_config(config: RendererConfig) -> Self {
        init_logging();
        registry::reset_registry_for_tests();
        let host = Rc::new(RunLoop::new());
        let clock = RevisionClock::starting_at(Revision(5));
        let runtime = TestRuntime::new();
        let resolver = Rc::new(Resolver::new(ResolverConfig::default()));
        let renderer = Renderer::new(
            config,
            clock.clone(),
            host.clone(),
            Rc::new(runtime.clone()),
            resolver.clone(),
        );
        Self {
            host,
            clock,
            runtime,
            resolver,
            renderer,
        }
    }

    /// A second renderer on the same host and clock.
    pub fn another_renderer(&self) -> (Rc<Renderer>, TestRuntime) {
        self.renderer_on_clock(self.clock.clone())
    }

    /// A second renderer on the same host, tracking its own clock.
    pub fn renderer_on_clock(&self, clock: RevisionClock) -> (Rc<Renderer>, TestRuntime) {
        let runtime = TestRuntime::new();
        let renderer = Renderer::new(
            RendererConfig::default(),
            clock,
            self.host.clone(),
            Rc::new(runtime.clone()),
            self.resolver.clone(),
        );
        (renderer, runtime)
    }

    pub fn attach(&self, view: &Rc<TestView>) -> Result<(), SchedulerError> {
        self.renderer
            .attach_root(view.clone(), AttachPoint::new("#app"))
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
