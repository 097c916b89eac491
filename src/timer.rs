//! One-shot cancellable timers
//!
//! A single worker thread owns a deadline-ordered queue and runs each callback
//! once its deadline passes. Every scheduled callback shares a small state slot
//! with its [`TimerHandle`]; the worker and [`TimerScheduler::cancel`] both try
//! to move that slot out of [`TimerState::Pending`], and whichever gets there
//! first decides the outcome. The loser never touches the callback.

use log::{trace, warn};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Lifecycle of a scheduled callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Waiting for its deadline
    Pending,
    /// Callback is executing on the worker thread
    Running,
    /// Callback ran to completion
    Fired,
    /// Cancelled before the callback started
    Cancelled,
}

struct Slot {
    state: Mutex<TimerState>,
    done: Condvar,
}

impl Slot {
    fn new() -> Self {
        Self {
            state: Mutex::new(TimerState::Pending),
            done: Condvar::new(),
        }
    }

    /// Claim the slot for execution. Fails if it was cancelled first.
    fn try_start(&self) -> bool {
        let mut state = self.state.lock();
        if *state == TimerState::Pending {
            *state = TimerState::Running;
            true
        } else {
            false
        }
    }

    fn try_cancel(&self) -> bool {
        let mut state = self.state.lock();
        if *state == TimerState::Pending {
            *state = TimerState::Cancelled;
            self.done.notify_all();
            true
        } else {
            false
        }
    }

    fn finish(&self) {
        *self.state.lock() = TimerState::Fired;
        self.done.notify_all();
    }

    fn wait_settled(&self) {
        let mut state = self.state.lock();
        while matches!(*state, TimerState::Pending | TimerState::Running) {
            self.done.wait(&mut state);
        }
    }
}

/// Handle to a scheduled callback, used for cancellation
#[derive(Clone)]
pub struct TimerHandle {
    id: u64,
    slot: Arc<Slot>,
}

impl TimerHandle {
    /// Current state of the callback
    pub fn state(&self) -> TimerState {
        *self.slot.state.lock()
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

struct Entry {
    deadline: Instant,
    id: u64,
    slot: Arc<Slot>,
    callback: Callback,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.id == other.id
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Equal deadlines fire in scheduling order.
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then(self.id.cmp(&other.id))
    }
}

struct Queue {
    entries: BinaryHeap<Reverse<Entry>>,
    next_id: u64,
    shutdown: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    wake: Condvar,
}

/// Runs callbacks once after a delay, on a dedicated worker thread
pub struct TimerScheduler {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    worker_id: ThreadId,
}

impl TimerScheduler {
    /// Start the scheduler and its worker thread
    pub fn new() -> io::Result<Self> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                entries: BinaryHeap::new(),
                next_id: 0,
                shutdown: false,
            }),
            wake: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("virt-keys-timer".to_string())
            .spawn(move || run_worker(&worker_shared))?;
        let worker_id = worker.thread().id();

        Ok(Self {
            shared,
            worker: Some(worker),
            worker_id,
        })
    }

    /// Arrange for `callback` to run once after `delay`.
    ///
    /// The callback always runs on the worker thread, never inside this call,
    /// even for a zero delay.
    pub fn schedule<F>(&self, delay: Duration, callback: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let slot = Arc::new(Slot::new());
        let mut queue = self.shared.queue.lock();
        let id = queue.next_id;
        queue.next_id += 1;

        if queue.shutdown {
            // Nothing will ever run it.
            *slot.state.lock() = TimerState::Cancelled;
            warn!("timer {} scheduled after shutdown, dropped", id);
            return TimerHandle { id, slot };
        }

        queue.entries.push(Reverse(Entry {
            deadline: Instant::now() + delay,
            id,
            slot: Arc::clone(&slot),
            callback: Box::new(callback),
        }));
        trace!("timer {} scheduled in {:?}", id, delay);
        self.shared.wake.notify_one();

        TimerHandle { id, slot }
    }

    /// Prevent the callback from running.
    ///
    /// Returns `true` if the callback had not started yet and now never will,
    /// `false` if it is already running or has finished.
    pub fn cancel(&self, handle: &TimerHandle) -> bool {
        let cancelled = handle.slot.try_cancel();
        if cancelled {
            trace!("timer {} cancelled", handle.id);
        }
        cancelled
    }

    /// Cancel, and if the callback already started, block until it finishes.
    ///
    /// After this returns the callback is either never going to run (`true`)
    /// or has completed (`false`). Called from the worker thread itself it
    /// does not wait, since the running callback would be waiting on itself.
    pub fn cancel_sync(&self, handle: &TimerHandle) -> bool {
        if self.cancel(handle) {
            return true;
        }
        if thread::current().id() != self.worker_id {
            handle.slot.wait_settled();
        }
        false
    }

    /// Number of queued timers that have not fired or been cancelled
    pub fn pending(&self) -> usize {
        self.shared
            .queue
            .lock()
            .entries
            .iter()
            .filter(|Reverse(entry)| *entry.slot.state.lock() == TimerState::Pending)
            .count()
    }

    /// Stop the worker. Timers that have not fired are cancelled.
    pub fn shutdown(&mut self) {
        {
            let mut queue = self.shared.queue.lock();
            queue.shutdown = true;
            self.shared.wake.notify_all();
        }
        if let Some(worker) = self.worker.take() {
            if thread::current().id() != self.worker_id && worker.join().is_err() {
                warn!("timer worker panicked");
            }
        }
    }
}

impl Drop for TimerScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(shared: &Shared) {
    let mut queue = shared.queue.lock();
    loop {
        if queue.shutdown {
            break;
        }

        let next_deadline = queue.entries.peek().map(|Reverse(entry)| entry.deadline);
        match next_deadline {
            None => shared.wake.wait(&mut queue),
            Some(deadline) if deadline > Instant::now() => {
                shared.wake.wait_until(&mut queue, deadline);
            }
            Some(_) => {
                if let Some(Reverse(entry)) = queue.entries.pop() {
                    MutexGuard::unlocked(&mut queue, || fire(entry));
                }
            }
        }
    }

    for Reverse(entry) in queue.entries.drain() {
        entry.slot.try_cancel();
    }
}

fn fire(entry: Entry) {
    if !entry.slot.try_start() {
        trace!("timer {} skipped, cancelled", entry.id);
        return;
    }
    trace!("timer {} fired", entry.id);
    // A panicking callback must not take the worker down with it.
    let outcome = panic::catch_unwind(AssertUnwindSafe(entry.callback));
    entry.slot.finish();
    if outcome.is_err() {
        warn!("timer {} callback panicked", entry.id);
    }
}
