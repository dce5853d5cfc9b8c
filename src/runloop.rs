// ============================================================================
// Host Run-Loop
// ============================================================================
//
// Renderers never drive themselves: they react to the begin/end signals of a
// host run-loop and schedule their revalidation work onto its queues. The
// `HostLoop` trait is that boundary. `RunLoop` is a deterministic,
// single-threaded implementation suitable for embedding in an event loop
// (wake it with a calloop `Ping`) or for driving renderers directly in tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::rc::Rc;

use calloop::ping::Ping;

use crate::error::SchedulerError;

/// A unit of work queued on the run-loop.
pub type Task = Box<dyn FnOnce() -> Result<(), SchedulerError>>;

/// Callback fired when a cycle begins.
pub type BeginHook = Rc<dyn Fn()>;

/// Callback fired when a cycle ends. An error aborts the remaining end hooks.
pub type EndHook = Rc<dyn Fn() -> Result<(), SchedulerError>>;

/// Queues flushed during a cycle, in flush order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Queue {
    /// Application work: state mutations, event handlers, settle checks.
    Actions,
    /// Renderer revalidation.
    Render,
    /// Deferred teardown.
    Destroy,
}

/// What a keyed task does, used together with an owner id for deduplication.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Revalidate,
    Settle,
}

/// Identity of a deduplicated task.
/// Scheduling the same key twice before it runs keeps only the first task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub owner: u64,
    pub kind: TaskKind,
}

impl TaskKey {
    pub fn new(owner: u64, kind: TaskKind) -> Self {
        Self { owner, kind }
    }
}

/// The run-loop operations renderers and the scheduler registry rely on.
pub trait HostLoop {
    /// Register a callback fired at the start of every cycle.
    fn on_begin(&self, hook: BeginHook);

    /// Register a callback fired at the end of every cycle, after all queues drained.
    fn on_end(&self, hook: EndHook);

    /// Queue `task` unless a task with the same key is already pending.
    fn schedule_once(&self, queue: Queue, key: TaskKey, task: Task);

    /// Run `task` inside the current cycle, or start a cycle for it if idle.
    fn join(&self, task: Task) -> Result<(), SchedulerError>;

    /// Ask the host for one more cycle.
    fn request_cycle(&self);

    /// Whether a cycle is running, requested, or has queued work.
    fn is_pending(&self) -> bool;
}

struct QueuedTask {
    key: Option<TaskKey>,
    task: Task,
}

#[derive(Default)]
struct LoopState {
    begin_hooks: Vec<BeginHook>,
    end_hooks: Vec<EndHook>,
    queues: BTreeMap<Queue, VecDeque<QueuedTask>>,
    scheduled: HashSet<TaskKey>,
    in_cycle: bool,
    cycle_requested: bool,
    cycles_run: u64,
}

impl LoopState {
    fn has_queued_tasks(&self) -> bool {
        self.queues.values().any(|queue| !queue.is_empty())
    }

    /// Pop from the earliest non-empty queue.
    fn pop_next(&mut self) -> Option<QueuedTask> {
        let queued = self
            .queues
            .values_mut()
            .find(|queue| !queue.is_empty())
            .and_then(VecDeque::pop_front)?;
        if let Some(key) = queued.key {
            self.scheduled.remove(&key);
        }
        Some(queued)
    }

    fn push(&mut self, queue: Queue, queued: QueuedTask) {
        self.queues.entry(queue).or_default().push_back(queued);
    }
}

/// Deterministic single-threaded run-loop.
pub struct RunLoop {
    state: RefCell<LoopState>,
    wakeup: Option<Ping>,
}

impl RunLoop {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(LoopState::default()),
            wakeup: None,
        }
    }

    /// Create a run-loop that pings an event loop whenever a cycle is requested.
    ///
    /// The event loop is expected to call [`RunLoop::flush`] when the ping fires.
    pub fn with_wakeup(ping: Ping) -> Self {
        Self {
            state: RefCell::new(LoopState::default()),
            wakeup: Some(ping),
        }
    }

    /// Check if a cycle has been requested and clear the request.
    pub fn take_cycle_request(&self) -> bool {
        std::mem::take(&mut self.state.borrow_mut().cycle_requested)
    }

    pub fn has_queued_tasks(&self) -> bool {
        self.state.borrow().has_queued_tasks()
    }

    pub fn in_cycle(&self) -> bool {
        self.state.borrow().in_cycle
    }

    /// Number of cycles run so far.
    pub fn cycles_run(&self) -> u64 {
        self.state.borrow().cycles_run
    }

    /// Run one cycle: begin hooks, drain every queue, end hooks.
    ///
    /// Calling this from inside a running cycle is a no-op. If a task fails,
    /// draining stops, the end hooks still run, and the task error is returned.
    pub fn run_cycle(&self) -> Result<(), SchedulerError> {
        let begin_hooks = {
            let mut state = self.state.borrow_mut();
            if state.in_cycle {
                return Ok(());
            }
            state.in_cycle = true;
            state.cycle_requested = false;
            state.cycles_run += 1;
            log::trace!("run-loop cycle {} begin", state.cycles_run);
            state.begin_hooks.clone()
        };

        for hook in begin_hooks {
            hook();
        }

        let drained = self.drain();

        let end_hooks = self.state.borrow().end_hooks.clone();
        let mut ended = Ok(());
        for hook in end_hooks {
            if let Err(err) = hook() {
                ended = Err(err);
                break;
            }
        }

        let leftover = {
            let mut state = self.state.borrow_mut();
            state.in_cycle = false;
            log::trace!("run-loop cycle {} end", state.cycles_run);
            state.has_queued_tasks()
        };
        // Work queued by end hooks, or left behind by a failed task, runs in
        // the next cycle. The host is woken for it even if this cycle failed.
        if leftover {
            self.request_cycle();
        }

        drained.and(ended)
    }

    /// Run cycles until nothing is requested or queued.
    pub fn flush(&self) -> Result<(), SchedulerError> {
        if self.in_cycle() {
            return Ok(());
        }
        while self.take_cycle_request() || self.has_queued_tasks() {
            self.run_cycle()?;
        }
        Ok(())
    }

    fn drain(&self) -> Result<(), SchedulerError> {
        loop {
            // Release the borrow before running: tasks schedule more tasks.
            let next = self.state.borrow_mut().pop_next();
            let Some(queued) = next else {
                return Ok(());
            };
            (queued.task)()?;
        }
    }
}

impl Default for RunLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl HostLoop for RunLoop {
    fn on_begin(&self, hook: BeginHook) {
        self.state.borrow_mut().begin_hooks.push(hook);
    }

    fn on_end(&self, hook: EndHook) {
        self.state.borrow_mut().end_hooks.push(hook);
    }

    fn schedule_once(&self, queue: Queue, key: TaskKey, task: Task) {
        let idle = {
            let mut state = self.state.borrow_mut();
            if !state.scheduled.insert(key) {
                return;
            }
            state.push(
                queue,
                QueuedTask {
                    key: Some(key),
                    task,
                },
            );
            !state.in_cycle
        };
        if idle {
            self.request_cycle();
        }
    }

    fn join(&self, task: Task) -> Result<(), SchedulerError> {
        let idle = {
            let mut state = self.state.borrow_mut();
            state.push(Queue::Actions, QueuedTask { key: None, task });
            !state.in_cycle
        };
        if idle {
            self.run_cycle()
        } else {
            Ok(())
        }
    }

    fn request_cycle(&self) {
        // Only ping on the first request; the host flushes everything at once.
        let was_requested =
            std::mem::replace(&mut self.state.borrow_mut().cycle_requested, true);
        if !was_requested {
            if let Some(ping) = &self.wakeup {
                ping.ping();
            }
        }
    }

    fn is_pending(&self) -> bool {
        let state = self.state.borrow();
        state.in_cycle || state.cycle_requested || state.has_queued_tasks()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;

    fn recorder() -> Rc<RefCell<Vec<&'static str>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn test_schedule_once_dedupes_pending_key() {
        let host = RunLoop::new();
        let runs = Rc::new(Cell::new(0));
        let key = TaskKey::new(1, TaskKind::Revalidate);

        for _ in 0..3 {
            let runs = runs.clone();
            host.schedule_once(
                Queue::Render,
                key,
                Box::new(move || {
                    runs.set(runs.get() + 1);
                    Ok(())
                }),
            );
        }

        assert!(host.is_pending());
        host.flush().unwrap();
        assert_eq!(runs.get(), 1);
        assert!(!host.is_pending());
    }

    #[test]
    fn test_key_can_be_rescheduled_after_running() {
        let host = RunLoop::new();
        let runs = Rc::new(Cell::new(0));
        let key = TaskKey::new(7, TaskKind::Revalidate);

        for _ in 0..2 {
            let runs = runs.clone();
            host.schedule_once(
                Queue::Render,
                key,
                Box::new(move || {
                    runs.set(runs.get() + 1);
                    Ok(())
                }),
            );
            host.flush().unwrap();
        }

        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_queues_flush_in_order() {
        let host = Rc::new(RunLoop::new());
        let order = recorder();

        let o = order.clone();
        host.schedule_once(
            Queue::Destroy,
            TaskKey::new(1, TaskKind::Revalidate),
            Box::new(move || {
                o.borrow_mut().push("destroy");
                Ok(())
            }),
        );
        let o = order.clone();
        let inner_host = host.clone();
        host.schedule_once(
            Queue::Render,
            TaskKey::new(2, TaskKind::Revalidate),
            Box::new(move || {
                o.borrow_mut().push("render");
                // An action queued by a render runs before later queues.
                let o = o.clone();
                inner_host.schedule_once(
                    Queue::Actions,
                    TaskKey::new(3, TaskKind::Settle),
                    Box::new(move || {
                        o.borrow_mut().push("action");
                        Ok(())
                    }),
                );
                Ok(())
            }),
        );

        host.flush().unwrap();
        assert_eq!(*order.borrow(), vec!["render", "action", "destroy"]);
        assert_eq!(host.cycles_run(), 1);
    }

    #[test]
    fn test_hooks_bracket_queued_work() {
        let host = RunLoop::new();
        let order = recorder();

        let o = order.clone();
        host.on_begin(Rc::new(move || o.borrow_mut().push("begin")));
        let o = order.clone();
        host.on_end(Rc::new(move || {
            o.borrow_mut().push("end");
            Ok(())
        }));
        let o = order.clone();
        host.join(Box::new(move || {
            o.borrow_mut().push("task");
            Ok(())
        }))
        .unwrap();

        assert_eq!(*order.borrow(), vec!["begin", "task", "end"]);
    }

    #[test]
    fn test_join_inside_cycle_merges_into_current_tick() {
        let host = Rc::new(RunLoop::new());
        let order = recorder();

        let o = order.clone();
        let inner_host = host.clone();
        host.join(Box::new(move || {
            o.borrow_mut().push("outer");
            let o = o.clone();
            inner_host.join(Box::new(move || {
                o.borrow_mut().push("inner");
                Ok(())
            }))
        }))
        .unwrap();

        assert_eq!(*order.borrow(), vec!["outer", "inner"]);
        assert_eq!(host.cycles_run(), 1);
    }

    #[test]
    fn test_end_hook_request_runs_another_cycle() {
        let host = Rc::new(RunLoop::new());
        let remaining = Rc::new(Cell::new(2));

        let weak = Rc::downgrade(&host);
        let r = remaining.clone();
        host.on_end(Rc::new(move || {
            if r.get() > 0 {
                r.set(r.get() - 1);
                if let Some(host) = weak.upgrade() {
                    host.request_cycle();
                }
            }
            Ok(())
        }));

        host.request_cycle();
        host.flush().unwrap();
        assert_eq!(host.cycles_run(), 3);
    }

    #[test]
    fn test_task_error_still_runs_end_hooks() {
        let host = RunLoop::new();
        let ended = Rc::new(Cell::new(false));

        let e = ended.clone();
        host.on_end(Rc::new(move || {
            e.set(true);
            Ok(())
        }));
        let result = host.join(Box::new(|| {
            Err(SchedulerError::MissingTemplate {
                view: "broken".into(),
            })
        }));

        assert!(matches!(result, Err(SchedulerError::MissingTemplate { .. })));
        assert!(ended.get());
        assert!(!host.in_cycle());
    }

    #[test]
    fn test_failed_cycle_wakes_event_loop_for_leftover_work() {
        let mut event_loop: calloop::EventLoop<u32> = calloop::EventLoop::try_new().unwrap();
        let (ping, source) = calloop::ping::make_ping().unwrap();
        let host = Rc::new(RunLoop::with_wakeup(ping));
        let failures = Rc::new(Cell::new(0));

        let flushed = host.clone();
        let f = failures.clone();
        event_loop
            .handle()
            .insert_source(source, move |_, _, wakeups: &mut u32| {
                *wakeups += 1;
                if flushed.flush().is_err() {
                    f.set(f.get() + 1);
                }
            })
            .unwrap();

        let ran = Rc::new(Cell::new(false));
        host.schedule_once(
            Queue::Actions,
            TaskKey::new(1, TaskKind::Settle),
            Box::new(|| {
                Err(SchedulerError::MissingTemplate {
                    view: "broken".into(),
                })
            }),
        );
        let r = ran.clone();
        host.schedule_once(
            Queue::Actions,
            TaskKey::new(2, TaskKind::Settle),
            Box::new(move || {
                r.set(true);
                Ok(())
            }),
        );

        let mut wakeups = 0;
        event_loop
            .dispatch(Some(Duration::from_millis(50)), &mut wakeups)
            .unwrap();
        assert_eq!(wakeups, 1);
        assert_eq!(failures.get(), 1);
        assert!(!ran.get());
        assert!(host.is_pending());

        event_loop
            .dispatch(Some(Duration::from_millis(50)), &mut wakeups)
            .unwrap();
        assert_eq!(wakeups, 2);
        assert!(ran.get());
        assert!(!host.is_pending());

        // Later requests still reach the event loop.
        host.request_cycle();
        event_loop
            .dispatch(Some(Duration::from_millis(50)), &mut wakeups)
            .unwrap();
        assert_eq!(wakeups, 3);
    }

    #[test]
    fn test_wakeup_pings_once_per_request() {
        let (ping, _source) = calloop::ping::make_ping().unwrap();
        let host = RunLoop::with_wakeup(ping);

        host.request_cycle();
        host.request_cycle();
        assert!(host.take_cycle_request());
        assert!(!host.take_cycle_request());
    }
}
