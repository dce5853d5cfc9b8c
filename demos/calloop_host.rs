//! Drives a renderer from a calloop event loop.
//!
//! A timer mutates a tracked counter a few times. Each mutation asks the
//! renderer for a revalidation; the run-loop pings the event loop, and the
//! ping handler flushes the run-loop. Once the timer is exhausted the demo
//! waits for rendering to settle and exits.
//!
//! To run: RUST_LOG=debug cargo run --example calloop_host

use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use calloop::timer::{TimeoutAction, Timer};
use calloop::EventLoop;
use futures::FutureExt;
use vellum::prelude::*;

struct Counter {
    layout: Rc<Template>,
    value: Rc<Tracked<u32>>,
}

impl RootOwner for Counter {
    fn view_id(&self) -> &str {
        "counter"
    }

    fn layout(&self) -> Option<Rc<Template>> {
        Some(self.layout.clone())
    }

    fn args(&self) -> Option<Rc<dyn Any>> {
        Some(self.value.clone())
    }
}

/// Prints a line per render instead of building real output.
#[derive(Default)]
struct ConsoleRuntime {
    open: Cell<bool>,
}

impl RenderRuntime for ConsoleRuntime {
    fn begin(&self) {
        self.open.set(true);
    }

    fn commit(&self) {
        self.open.set(false);
    }

    fn in_transaction(&self) -> bool {
        self.open.get()
    }

    fn render_main(&self, frame: RootFrame<'_>) -> Box<dyn RenderIterator> {
        Box::new(ConsoleRender {
            view: frame.owner.view_id().to_string(),
            target: frame.target.name().to_string(),
            value: frame
                .args
                .clone()
                .and_then(|args| args.downcast::<Tracked<u32>>().ok()),
        })
    }
}

struct ConsoleRender {
    view: String,
    target: String,
    value: Option<Rc<Tracked<u32>>>,
}

impl ConsoleRender {
    fn print(&self) {
        let value = self.value.as_ref().map_or(0, |value| value.get());
        println!("{} -> {}: {}", self.view, self.target, value);
    }
}

impl RenderIterator for ConsoleRender {
    fn sync(self: Box<Self>) -> Result<Box<dyn RenderResult>, RenderError> {
        self.print();
        Ok(self)
    }
}

impl RenderResult for ConsoleRender {
    fn rerender(&mut self, _options: RerenderOptions) -> Result<(), RenderError> {
        self.print();
        Ok(())
    }

    fn destroy(&mut self) {
        println!("{} removed from {}", self.view, self.target);
    }
}

struct DemoState {
    renderer: Rc<Renderer>,
    counter: Rc<Tracked<u32>>,
    remaining: u32,
    settled: Option<Settled>,
    done: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut event_loop: EventLoop<DemoState> = EventLoop::try_new()?;
    let (ping, ping_source) = calloop::ping::make_ping()?;
    let host = Rc::new(RunLoop::with_wakeup(ping));
    let clock = RevisionClock::global();

    let renderer = Renderer::new(
        RendererConfig::default(),
        clock.clone(),
        host.clone(),
        Rc::new(ConsoleRuntime::default()),
        Rc::new(Resolver::new(ResolverConfig::default())),
    );

    let counter = Rc::new(Tracked::new(&clock, 0));
    let view = Rc::new(Counter {
        layout: Rc::new(Template::new("counter")),
        value: counter.clone(),
    });
    renderer.attach_root(view.clone(), AttachPoint::new("#counter"))?;

    let handle = event_loop.handle();
    let flushed = host.clone();
    handle
        .insert_source(ping_source, move |_, _, state: &mut DemoState| {
            if let Err(err) = flushed.flush() {
                log::error!("run-loop cycle failed: {err}");
                state.done = true;
                return;
            }
            let Some(settled) = &state.settled else {
                return;
            };
            match settled.clone().now_or_never() {
                Some(result) => {
                    println!("rendering settled: {result:?}");
                    state.done = true;
                }
                None => log::debug!("still waiting for rendering to settle"),
            }
        })
        .map_err(|err| err.error)?;

    handle
        .insert_source(
            Timer::from_duration(Duration::from_millis(100)),
            |_, _, state: &mut DemoState| {
                if state.remaining == 0 {
                    state.settled = Some(vellum::render::registry::settle());
                    return TimeoutAction::Drop;
                }
                state.remaining -= 1;
                state.counter.update(|value| *value += 1);
                state.renderer.rerender_all();
                TimeoutAction::ToDuration(Duration::from_millis(100))
            },
        )
        .map_err(|err| err.error)?;

    let mut state = DemoState {
        renderer: renderer.clone(),
        counter,
        remaining: 5,
        settled: None,
        done: false,
    };
    while !state.done {
        event_loop.dispatch(Some(Duration::from_millis(250)), &mut state)?;
    }

    renderer.detach_root(&*view);
    Ok(())
}
