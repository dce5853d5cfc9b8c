//! Process-wide registry of live renderers.
//!
//! A renderer is a member exactly while it holds at least one root. The
//! registry hooks into the host run-loop:
//!
//! - on *begin*, every member schedules a revalidation;
//! - on *end*, the members are swept. An invalid member costs one more cycle;
//!   a member that stays invalid for more than its loop limit is destroyed and
//!   the sweep fails with [`SchedulerError::InfiniteInvalidation`]. Once every
//!   member is valid, retry counters reset and the outstanding [`Settled`]
//!   signal resolves.
//!
//! The registry is thread-local, like the rest of the reactive state.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::error::SchedulerError;
use crate::runloop::{HostLoop, Queue, TaskKey, TaskKind};
use crate::stats;

use super::scheduler::Renderer;
use super::settle::{SettleSignal, Settled};

thread_local! {
    static REGISTRY: RefCell<SchedulerRegistry> = RefCell::new(SchedulerRegistry::default());
    // Hosts carrying the begin/end hooks. Survives registry resets: hooks
    // cannot be removed from a host, so they must never be added twice.
    static HOOKED_HOSTS: RefCell<Vec<Weak<dyn HostLoop>>> = const { RefCell::new(Vec::new()) };
}

#[derive(Default)]
struct SchedulerRegistry {
    renderers: Vec<Rc<Renderer>>,
    host: Option<Weak<dyn HostLoop>>,
    settle: Option<SettleSignal>,
}

impl SchedulerRegistry {
    fn host(&self) -> Option<Rc<dyn HostLoop>> {
        self.host.as_ref().and_then(Weak::upgrade)
    }
}

fn with_registry<F, R>(f: F) -> R
where
    F: FnOnce(&mut SchedulerRegistry) -> R,
{
    REGISTRY.with(|registry| f(&mut registry.borrow_mut()))
}

fn snapshot() -> Vec<Rc<Renderer>> {
    with_registry(|registry| registry.renderers.clone())
}

/// Hook the registry into `host`'s begin/end signals. Idempotent per host.
pub(crate) fn install(host: &Rc<dyn HostLoop>) {
    let weak = Rc::downgrade(host);
    with_registry(|registry| match &registry.host {
        Some(current) if current.ptr_eq(&weak) => {}
        current => {
            if current.as_ref().is_some_and(|c| c.upgrade().is_some()) {
                log::warn!("scheduler registry moved to a different host run-loop");
            }
            registry.host = Some(weak.clone());
        }
    });

    let hooked = HOOKED_HOSTS.with(|hosts| {
        let mut hosts = hosts.borrow_mut();
        hosts.retain(|h| h.strong_count() > 0);
        if hosts.iter().any(|h| h.ptr_eq(&weak)) {
            true
        } else {
            hosts.push(weak);
            false
        }
    });
    if !hooked {
        host.on_begin(Rc::new(loop_begin));
        host.on_end(Rc::new(loop_end));
    }
}

pub(crate) fn register(renderer: &Rc<Renderer>) {
    with_registry(|registry| {
        if !registry.renderers.iter().any(|r| Rc::ptr_eq(r, renderer)) {
            log::debug!("registering renderer {}", renderer.id());
            registry.renderers.push(renderer.clone());
        }
    });
}

pub(crate) fn deregister(renderer: &Renderer) {
    // Dropping the registry's handle may drop the renderer itself; do it
    // after the registry borrow is released.
    let removed = with_registry(|registry| {
        let position = registry
            .renderers
            .iter()
            .position(|r| std::ptr::eq(Rc::as_ptr(r), renderer))?;
        log::debug!("deregistering renderer {}", renderer.id());
        Some(registry.renderers.remove(position))
    });
    drop(removed);
}

/// Begin-of-cycle hook: every member schedules a revalidation.
pub fn loop_begin() {
    for renderer in snapshot() {
        renderer.schedule_revalidate();
    }
}

/// End-of-cycle sweep.
pub fn loop_end() -> Result<(), SchedulerError> {
    let renderers = snapshot();
    let host = with_registry(|registry| registry.host());

    for renderer in &renderers {
        if renderer.is_valid() {
            continue;
        }
        let retries = renderer.retry_count();
        if retries > renderer.config().loop_limit {
            renderer.reset_retry_count();
            renderer.destroy();
            stats::record_runaway_destroyed();
            log::info!(
                "renderer {} destroyed after {} invalid sweeps",
                renderer.id(),
                retries
            );
            return Err(SchedulerError::InfiniteInvalidation {
                scheduler: renderer.id(),
                retries,
            });
        }
        renderer.bump_retry_count();
        stats::record_sweep_retried();
        if let Some(host) = &host {
            host.request_cycle();
        }
        return Ok(());
    }

    for renderer in &renderers {
        renderer.reset_retry_count();
    }
    resolve_settled();
    stats::end_cycle();
    Ok(())
}

fn resolve_settled() {
    let signal = with_registry(|registry| registry.settle.take());
    if let Some(signal) = signal {
        log::debug!("rendering settled");
        signal.resolve();
    }
}

/// Future resolving once a sweep finds every renderer valid.
///
/// Creates the outstanding signal on first call; later calls share it until
/// it resolves. If the host has no cycle pending, a no-op cycle is scheduled
/// so the signal is driven even without other work. With no host installed,
/// the signal resolves immediately when every renderer is already valid.
pub fn settle() -> Settled {
    let (settled, host) = with_registry(|registry| {
        let settled = registry
            .settle
            .get_or_insert_with(SettleSignal::new)
            .settled();
        (settled, registry.host())
    });

    match host {
        Some(host) => {
            if !host.is_pending() {
                host.schedule_once(
                    Queue::Actions,
                    TaskKey::new(0, TaskKind::Settle),
                    Box::new(|| Ok(())),
                );
            }
        }
        None => {
            if all_valid() {
                resolve_settled();
            }
        }
    }
    settled
}

/// Whether every registered renderer is valid.
pub fn all_valid() -> bool {
    snapshot().iter().all(|renderer| renderer.is_valid())
}

pub fn registered_count() -> usize {
    with_registry(|registry| registry.renderers.len())
}

pub fn is_registered(renderer: &Renderer) -> bool {
    with_registry(|registry| {
        registry
            .renderers
            .iter()
            .any(|r| std::ptr::eq(Rc::as_ptr(r), renderer))
    })
}

/// Clear all registry state. For test harnesses only.
///
/// Any outstanding settle signal is dropped, failing its waiters. Hosts that
/// already carry the registry hooks keep them.
#[doc(hidden)]
pub fn reset_registry_for_tests() {
    let previous = with_registry(std::mem::take);
    drop(previous);
}
