//! Tick scheduling
//!
//! A stepper never waits on its own. Whoever drives it supplies a
//! [`TickScheduler`] that runs a task once a delay has elapsed:
//! - [`ManualScheduler`] - Fake clock advanced by hand, for tests and simulations
//! - [`TimerThread`] - Background thread that fires tasks in real time
//! - `TokioScheduler` - Tasks spawned on a tokio runtime (feature `tokio`)

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::Result;

/// A unit of work run once its delay has elapsed
pub type ScheduledTask = Box<dyn FnOnce() + Send + 'static>;

/// Capability to run a task after a delay
///
/// Tasks are never cancelled. Implementations run tasks with equal due
/// times in the order they were scheduled.
pub trait TickScheduler: Send + Sync + 'static {
    fn schedule_after(&self, delay: Duration, task: ScheduledTask);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Manual clock
// ============================================================================

struct ManualInner {
    now: Duration,
    next_seq: u64,
    queue: BTreeMap<(Duration, u64), ScheduledTask>,
}

/// Deterministic scheduler whose clock only moves when told to
///
/// Time starts at zero. Tasks run on the caller's thread inside
/// [`advance`](Self::advance), [`run_next`](Self::run_next) and
/// [`run_until_idle`](Self::run_until_idle); a task may schedule further tasks.
#[derive(Clone)]
pub struct ManualScheduler {
    inner: Arc<Mutex<ManualInner>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualInner {
                now: Duration::ZERO,
                next_seq: 0,
                queue: BTreeMap::new(),
            })),
        }
    }

    /// Time elapsed on the fake clock
    pub fn now(&self) -> Duration {
        lock(&self.inner).now
    }

    /// Number of tasks waiting to run
    pub fn pending(&self) -> usize {
        lock(&self.inner).queue.len()
    }

    /// Due time of the earliest pending task
    pub fn next_due(&self) -> Option<Duration> {
        lock(&self.inner).queue.keys().next().map(|(due, _)| *due)
    }

    /// Jump to the earliest pending task and run it
    ///
    /// Returns false when nothing is pending.
    pub fn run_next(&self) -> bool {
        let task = {
            let mut inner = lock(&self.inner);
            let Some(((due, _), task)) = inner.queue.pop_first() else {
                return false;
            };
            inner.now = inner.now.max(due);
            task
        };
        task();
        true
    }

    /// Move the clock forward, running every task that falls due on the way
    ///
    /// Returns the number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let deadline = lock(&self.inner).now + by;
        let mut ran = 0;
        loop {
            let task = {
                let mut inner = lock(&self.inner);
                let next_due = inner.queue.keys().next().map(|(due, _)| *due);
                if !matches!(next_due, Some(due) if due <= deadline) {
                    inner.now = deadline;
                    return ran;
                }
                let Some(((due, _), task)) = inner.queue.pop_first() else {
                    return ran;
                };
                inner.now = due;
                task
            };
            task();
            ran += 1;
        }
    }

    /// Run tasks until none are pending, returning how many ran
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TickScheduler for ManualScheduler {
    fn schedule_after(&self, delay: Duration, task: ScheduledTask) {
        let mut inner = lock(&self.inner);
        let due = inner.now + delay;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.queue.insert((due, seq), task);
    }
}

// ============================================================================
// Background timer thread
// ============================================================================

struct TimerQueue {
    next_seq: u64,
    entries: BTreeMap<(Instant, u64), ScheduledTask>,
}

struct TimerShared {
    queue: Mutex<TimerQueue>,
    wake: Condvar,
    stop_flag: AtomicBool,
}

/// Real-time scheduler running tasks on its own thread
///
/// The thread stops when the `TimerThread` is dropped. Hand out
/// [`TimerHandle`]s to components; they hold only a weak reference.
///
/// ```ignore
/// let timer = TimerThread::start()?;
/// let number = AnimatedNumber::new(timer.handle(), StepperConfig::default(), hooks)?;
/// number.set_target(90.0)?;
/// ```
pub struct TimerThread {
    shared: Arc<TimerShared>,
    thread_handle: Option<JoinHandle<()>>,
}

impl TimerThread {
    pub fn start() -> Result<Self> {
        let shared = Arc::new(TimerShared {
            queue: Mutex::new(TimerQueue {
                next_seq: 0,
                entries: BTreeMap::new(),
            }),
            wake: Condvar::new(),
            stop_flag: AtomicBool::new(false),
        });

        let worker = Arc::clone(&shared);
        let thread_handle = thread::Builder::new()
            .name("tally-timer".into())
            .spawn(move || run_timer(&worker))?;
        tracing::debug!("TimerThread: started");

        Ok(Self {
            shared,
            thread_handle: Some(thread_handle),
        })
    }

    /// Get a handle for scheduling onto this thread
    pub fn handle(&self) -> TimerHandle {
        TimerHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Number of tasks waiting to fire
    pub fn pending(&self) -> usize {
        lock(&self.shared.queue).entries.len()
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some()
    }

    /// Stop the thread, discarding pending tasks
    pub fn stop(&mut self) {
        self.shared.stop_flag.store(true, Ordering::Release);
        self.shared.wake.notify_all();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
            let dropped = {
                let mut queue = lock(&self.shared.queue);
                let count = queue.entries.len();
                queue.entries.clear();
                count
            };
            tracing::debug!("TimerThread: stopped ({} pending tasks dropped)", dropped);
        }
    }
}

impl Drop for TimerThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_timer(shared: &TimerShared) {
    let mut queue = lock(&shared.queue);
    loop {
        if shared.stop_flag.load(Ordering::Acquire) {
            return;
        }
        let next_due = queue.entries.keys().next().map(|(due, _)| *due);
        match next_due {
            None => {
                queue = shared
                    .wake
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            Some(due) => {
                let now = Instant::now();
                if due > now {
                    queue = shared
                        .wake
                        .wait_timeout(queue, due - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                    continue;
                }
                let Some((_, task)) = queue.entries.pop_first() else {
                    continue;
                };
                // Tasks may schedule more work, so run them unlocked
                drop(queue);
                task();
                queue = lock(&shared.queue);
            }
        }
    }
}

/// Weak handle to a [`TimerThread`]
#[derive(Clone)]
pub struct TimerHandle {
    shared: Weak<TimerShared>,
}

impl TimerHandle {
    /// Check if the timer thread is still alive
    pub fn is_alive(&self) -> bool {
        self.shared.strong_count() > 0
    }
}

impl TickScheduler for TimerHandle {
    fn schedule_after(&self, delay: Duration, task: ScheduledTask) {
        let Some(shared) = self.shared.upgrade() else {
            tracing::warn!("TimerHandle: timer thread is gone, dropping task");
            return;
        };
        let due = Instant::now() + delay;
        {
            let mut queue = lock(&shared.queue);
            let seq = queue.next_seq;
            queue.next_seq += 1;
            queue.entries.insert((due, seq), task);
        }
        shared.wake.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(u32) -> ScheduledTask) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let make = move |id: u32| -> ScheduledTask {
            let sink = sink.clone();
            Box::new(move || sink.lock().unwrap().push(id))
        };
        (log, make)
    }

    #[test]
    fn test_manual_runs_in_due_order() {
        let scheduler = ManualScheduler::new();
        let (log, task) = recorder();

        scheduler.schedule_after(Duration::from_millis(30), task(3));
        scheduler.schedule_after(Duration::from_millis(10), task(1));
        scheduler.schedule_after(Duration::from_millis(10), task(2));
        assert_eq!(scheduler.pending(), 3);
        assert_eq!(scheduler.next_due(), Some(Duration::from_millis(10)));

        assert_eq!(scheduler.advance(Duration::from_millis(20)), 2);
        assert_eq!(*log.lock().unwrap(), vec![1, 2]);
        assert_eq!(scheduler.now(), Duration::from_millis(20));

        assert_eq!(scheduler.run_until_idle(), 1);
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(scheduler.now(), Duration::from_millis(30));
        assert!(!scheduler.run_next());
    }

    #[test]
    fn test_manual_runs_tasks_scheduled_during_advance() {
        let scheduler = ManualScheduler::new();
        let (log, task) = recorder();
        let nested = scheduler.clone();
        let follow_up = task(2);

        scheduler.schedule_after(
            Duration::from_millis(5),
            Box::new(move || nested.schedule_after(Duration::from_millis(5), follow_up)),
        );
        scheduler.schedule_after(Duration::from_millis(20), task(3));

        assert_eq!(scheduler.advance(Duration::from_millis(10)), 2);
        assert_eq!(*log.lock().unwrap(), vec![2]);
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn test_timer_thread_fires_in_order() {
        let timer = TimerThread::start().unwrap();
        let handle = timer.handle();
        let (tx, rx) = mpsc::channel();

        for (id, delay) in [(2u32, 20u64), (1, 5), (3, 40)] {
            let tx = tx.clone();
            handle.schedule_after(
                Duration::from_millis(delay),
                Box::new(move || {
                    let _ = tx.send(id);
                }),
            );
        }

        let received: Vec<u32> = (0..3)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(received, vec![1, 2, 3]);
    }

    #[test]
    fn test_timer_handle_outlived_by_thread() {
        let mut timer = TimerThread::start().unwrap();
        let handle = timer.handle();
        handle.schedule_after(Duration::from_secs(60), Box::new(|| {}));
        assert_eq!(timer.pending(), 1);

        timer.stop();
        assert!(!timer.is_running());
        assert_eq!(timer.pending(), 0);

        drop(timer);
        assert!(!handle.is_alive());
        // Scheduling on a dead timer is dropped rather than panicking
        handle.schedule_after(Duration::ZERO, Box::new(|| {}));
    }
}
