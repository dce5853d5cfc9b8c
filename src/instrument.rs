//! Start/finish hooks reported around expensive lookups.

use std::cell::RefCell;
use std::time::Instant;

/// Event name bracketing a component definition cache miss.
pub const COMPONENT_DEFINITION: &str = "render.getComponentDefinition";

/// Receives a `start`/`finish` pair around each instrumented operation.
///
/// Pairs may nest but are always closed in reverse order.
pub trait Instrumentation {
    fn start(&self, event: &'static str, name: &str);
    fn finish(&self, event: &'static str, name: &str);
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopInstrumentation;

impl Instrumentation for NoopInstrumentation {
    fn start(&self, _event: &'static str, _name: &str) {}
    fn finish(&self, _event: &'static str, _name: &str) {}
}

/// Logs the elapsed time of every instrumented operation at `debug`.
#[derive(Debug, Default)]
pub struct LogInstrumentation {
    started: RefCell<Vec<Instant>>,
}

impl LogInstrumentation {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Instrumentation for LogInstrumentation {
    fn start(&self, event: &'static str, name: &str) {
        log::trace!("{event} started for `{name}`");
        self.started.borrow_mut().push(Instant::now());
    }

    fn finish(&self, event: &'static str, name: &str) {
        match self.started.borrow_mut().pop() {
            Some(started) => log::debug!("{event} for `{name}` took {:?}", started.elapsed()),
            None => log::warn!("{event} finished for `{name}` without a matching start"),
        }
    }
}

/// Closes an instrumented span on drop.
pub(crate) struct Span<'a> {
    instrumentation: &'a dyn Instrumentation,
    event: &'static str,
    name: &'a str,
}

impl<'a> Span<'a> {
    pub(crate) fn enter(
        instrumentation: &'a dyn Instrumentation,
        event: &'static str,
        name: &'a str,
    ) -> Self {
        instrumentation.start(event, name);
        Self {
            instrumentation,
            event,
            name,
        }
    }
}

impl Drop for Span<'_> {
    fn drop(&mut self) {
        self.instrumentation.finish(self.event, self.name);
    }
}
