//! Debounced, coalescing task queue
//!
//! Tasks are scheduled under a [`TaskKey`]. Scheduling a key that is already
//! pending replaces its task and pushes its deadline back (trailing
//! debounce), so a burst of mutations runs the task once.
//!
//! Inside a `tokio::task::LocalSet`, [`Scheduler::spawn_local`] starts a
//! driver task that sleeps until the next deadline and runs whatever is due,
//! so debounced work happens without further calls. Hosts without a local
//! set drive the queue themselves with [`Scheduler::run_due`],
//! [`Scheduler::flush`] or [`Scheduler::settle`].

use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Maximum number of drain rounds per flush
///
/// Tasks may schedule further tasks; past this many rounds the remainder is
/// left pending.
pub const MAX_FLUSH_ROUNDS: usize = 64;

/// Coalescing key of a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey(u64);

struct Pending {
    due: Instant,
    task: Box<dyn FnOnce()>,
}

struct SchedulerInner {
    delay: Cell<Duration>,
    pending: RefCell<IndexMap<TaskKey, Pending>>,
    next_key: Cell<u64>,
    wake: Rc<Notify>,
}

impl Drop for SchedulerInner {
    fn drop(&mut self) {
        // lets a driver notice the scheduler is gone
        self.wake.notify_one();
    }
}

/// Shared debounce queue
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

impl Scheduler {
    /// Create a scheduler debouncing by `delay`
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                delay: Cell::new(delay),
                pending: RefCell::new(IndexMap::new()),
                next_key: Cell::new(1),
                wake: Rc::new(Notify::new()),
            }),
        }
    }

    pub fn delay(&self) -> Duration {
        self.inner.delay.get()
    }

    pub fn set_delay(&self, delay: Duration) {
        self.inner.delay.set(delay);
    }

    /// Allocate a fresh coalescing key
    pub fn key(&self) -> TaskKey {
        let key = TaskKey(self.inner.next_key.get());
        self.inner.next_key.set(key.0 + 1);
        key
    }

    /// Schedule `task` to run after the debounce delay
    ///
    /// Returns true if this coalesced with an already pending task.
    pub fn schedule(&self, key: TaskKey, task: impl FnOnce() + 'static) -> bool {
        let due = Instant::now() + self.inner.delay.get();
        let previous = self.inner.pending.borrow_mut().insert(
            key,
            Pending {
                due,
                task: Box::new(task),
            },
        );
        let coalesced = previous.is_some();
        drop(previous);
        self.inner.wake.notify_one();
        trace!(?key, coalesced, "task scheduled");
        coalesced
    }

    /// Drop a pending task without running it
    pub fn cancel(&self, key: TaskKey) -> bool {
        let removed = self.inner.pending.borrow_mut().shift_remove(&key);
        removed.is_some()
    }

    pub fn is_pending(&self, key: TaskKey) -> bool {
        self.inner.pending.borrow().contains_key(&key)
    }

    /// Number of pending tasks
    pub fn pending(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    /// Earliest deadline among pending tasks
    pub fn next_due(&self) -> Option<Instant> {
        self.inner.pending.borrow().values().map(|p| p.due).min()
    }

    fn latest_due(&self) -> Option<Instant> {
        self.inner.pending.borrow().values().map(|p| p.due).max()
    }

    /// Run every task whose deadline is at or before `now`
    pub fn run_due(&self, now: Instant) -> usize {
        let ready: Vec<Pending> = {
            let mut pending = self.inner.pending.borrow_mut();
            let keys: Vec<TaskKey> = pending
                .iter()
                .filter(|(_, p)| p.due <= now)
                .map(|(key, _)| *key)
                .collect();
            keys.iter()
                .filter_map(|key| pending.shift_remove(key))
                .collect()
        };
        let ran = ready.len();
        for pending in ready {
            (pending.task)();
        }
        ran
    }

    /// Run every pending task now, including tasks scheduled meanwhile
    pub fn flush(&self) -> usize {
        let mut ran = 0;
        for _ in 0..MAX_FLUSH_ROUNDS {
            let batch = std::mem::take(&mut *self.inner.pending.borrow_mut());
            if batch.is_empty() {
                return ran;
            }
            ran += batch.len();
            for (_, pending) in batch {
                (pending.task)();
            }
        }
        if self.pending() > 0 {
            warn!(
                remaining = self.pending(),
                "scheduler flush stopped after {} rounds", MAX_FLUSH_ROUNDS
            );
        }
        ran
    }

    /// Driver loop: sleep until the earliest deadline, run what is due,
    /// repeat
    ///
    /// The future holds the scheduler weakly and completes once every
    /// `Scheduler` handle is dropped.
    pub fn run(&self) -> impl Future<Output = ()> + 'static {
        let weak = Rc::downgrade(&self.inner);
        let wake = self.inner.wake.clone();
        async move {
            loop {
                let next = match weak.upgrade() {
                    Some(inner) => Scheduler { inner }.next_due(),
                    None => break,
                };
                match next {
                    Some(due) => {
                        tokio::select! {
                            _ = tokio::time::sleep_until(due) => {}
                            _ = wake.notified() => continue,
                        }
                        let Some(inner) = weak.upgrade() else {
                            break;
                        };
                        let ran = Scheduler { inner }.run_due(Instant::now());
                        trace!(ran, "driver ran due tasks");
                    }
                    None => wake.notified().await,
                }
            }
            debug!("scheduler driver stopped");
        }
    }

    /// Spawn [`Scheduler::run`] on the current `LocalSet`
    ///
    /// Panics outside a `LocalSet`, like `tokio::task::spawn_local`.
    pub fn spawn_local(&self) -> JoinHandle<()> {
        tokio::task::spawn_local(self.run())
    }

    /// Yield to the runtime, wait out the debounce window, then flush
    pub async fn settle(&self) -> usize {
        tokio::task::yield_now().await;
        if let Some(due) = self.latest_due() {
            tokio::time::sleep_until(due).await;
        }
        self.flush()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(Duration::from_millis(10))
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("delay", &self.inner.delay.get())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_coalesces_by_key() {
        let scheduler = Scheduler::new(Duration::from_millis(5));
        let key = scheduler.key();
        let runs = Rc::new(RefCell::new(Vec::new()));

        for i in 0..5 {
            let runs = runs.clone();
            scheduler.schedule(key, move || runs.borrow_mut().push(i));
        }
        assert_eq!(scheduler.pending(), 1);

        assert_eq!(scheduler.flush(), 1);
        assert_eq!(*runs.borrow(), vec![4]);
    }

    #[test]
    fn test_run_due_respects_deadline() {
        let scheduler = Scheduler::new(Duration::from_secs(60));
        let key = scheduler.key();
        let ran = Rc::new(Cell::new(false));

        let flag = ran.clone();
        scheduler.schedule(key, move || flag.set(true));

        assert_eq!(scheduler.run_due(Instant::now()), 0);
        assert!(!ran.get());
        assert_eq!(scheduler.run_due(Instant::now() + Duration::from_secs(61)), 1);
        assert!(ran.get());
    }

    #[test]
    fn test_cancel_drops_task() {
        let scheduler = Scheduler::default();
        let key = scheduler.key();
        scheduler.schedule(key, || panic!("cancelled task ran"));

        assert!(scheduler.cancel(key));
        assert_eq!(scheduler.flush(), 0);
    }

    #[test]
    fn test_flush_runs_tasks_scheduled_by_tasks() {
        let scheduler = Scheduler::new(Duration::ZERO);
        let (first, second) = (scheduler.key(), scheduler.key());
        let count = Rc::new(Cell::new(0));

        let inner = scheduler.clone();
        let counter = count.clone();
        scheduler.schedule(first, move || {
            counter.set(counter.get() + 1);
            let counter = counter.clone();
            inner.schedule(second, move || counter.set(counter.get() + 1));
        });

        assert_eq!(scheduler.flush(), 2);
        assert_eq!(count.get(), 2);
    }

    #[tokio::test]
    async fn test_settle_waits_for_debounce() {
        let scheduler = Scheduler::new(Duration::from_millis(2));
        let key = scheduler.key();
        let ran = Rc::new(Cell::new(false));

        let flag = ran.clone();
        scheduler.schedule(key, move || flag.set(true));

        assert_eq!(scheduler.settle().await, 1);
        assert!(ran.get());
    }

    #[tokio::test]
    async fn test_driver_runs_tasks_after_debounce() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let scheduler = Scheduler::new(Duration::from_millis(5));
                let driver = scheduler.spawn_local();
                let key = scheduler.key();
                let runs = Rc::new(Cell::new(0));

                for _ in 0..3 {
                    let counter = runs.clone();
                    scheduler.schedule(key, move || counter.set(counter.get() + 1));
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
                assert_eq!(runs.get(), 1);
                assert_eq!(scheduler.pending(), 0);

                let counter = runs.clone();
                scheduler.schedule(key, move || counter.set(counter.get() + 1));
                tokio::time::sleep(Duration::from_millis(50)).await;
                assert_eq!(runs.get(), 2);

                drop(scheduler);
                driver.await.unwrap();
            })
            .await;
    }
}
