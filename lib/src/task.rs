//! Fixed-size worker pool with FIFO scheduling and a drain barrier
//!
//! Work units are boxed closures pulled from a single condvar-guarded
//! queue. The active-task count lives in the same mutex state as the queue
//! so `wait_idle` observes queued and in-flight work atomically.

use log::{error, info};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct QueueState {
    jobs: VecDeque<Job>,
    active: usize,
    stopping: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    condvar: Condvar,
}

/// A bounded pool of worker threads draining one FIFO queue
///
/// Tasks dequeue in submission order; completion order across workers is
/// not otherwise guaranteed. The pool is stopped (and joined) on drop if
/// `stop` was not called explicitly.
pub struct TaskSystem {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

/// Handle for a result-returning submission
///
/// Resolves once the task has executed. A panic inside the task is
/// captured and resumed on the thread that calls `wait`.
pub struct TaskHandle<T> {
    receiver: mpsc::Receiver<thread::Result<T>>,
}

impl<T> TaskHandle<T> {
    /// Blocks until the task has run, returning its result
    pub fn wait(self) -> T {
        match self.receiver.recv() {
            Ok(Ok(value)) => value,
            Ok(Err(payload)) => panic::resume_unwind(payload),
            // The worker always sends before exiting, and stop() drains the
            // queue, so this only fires if the pool was torn down mid-task.
            Err(_) => panic!("task was dropped before completion"),
        }
    }
}

impl TaskSystem {
    /// Creates a pool with `thread_count` workers
    ///
    /// A count of 0 resolves to (available hardware parallelism - 1),
    /// floored at 1, leaving one core for the submitting thread.
    pub fn new(thread_count: usize) -> Self {
        let thread_count = if thread_count == 0 {
            thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1))
                .unwrap_or(1)
                .max(1)
        } else {
            thread_count
        };

        info!("Initializing TaskSystem with {thread_count} worker threads");

        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                active: 0,
                stopping: false,
            }),
            condvar: Condvar::new(),
        });

        let workers = (0..thread_count)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || worker_loop(&shared))
            })
            .collect();

        Self { shared, workers }
    }

    /// Number of worker threads in the pool
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Enqueues a fire-and-forget unit of work
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut state = lock_state(&self.shared);
            state.jobs.push_back(Box::new(job));
        }
        // notify_all: a wait_idle caller shares the condvar with the
        // workers, so a single wakeup could land on it instead of an idle
        // worker and strand the job.
        self.shared.condvar.notify_all();
    }

    /// Enqueues a unit of work and returns a handle to its result
    pub fn submit_with_result<F, T>(&self, job: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        self.submit(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(job));
            let _ = sender.send(result);
        });
        TaskHandle { receiver }
    }

    /// Blocks until the queue is empty and no worker is mid-task
    ///
    /// Does not stop the pool; new work may be submitted afterward.
    pub fn wait_idle(&self) {
        let mut state = lock_state(&self.shared);
        while !(state.jobs.is_empty() && state.active == 0) {
            state = match self.shared.condvar.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    /// Submits one no-op per worker and waits, ensuring every thread has
    /// been scheduled at least once before latency-sensitive work begins
    pub fn preheat(&self) {
        let n = self.workers.len();
        if n == 0 {
            return;
        }
        for _ in 0..n {
            self.submit(|| {});
        }
        self.wait_idle();
        info!("TaskSystem preheated with {n} tasks");
    }

    /// Signals workers to exit once the queue drains, then joins them
    ///
    /// Idempotent; called automatically on drop.
    pub fn stop(&mut self) {
        {
            let mut state = lock_state(&self.shared);
            if state.stopping {
                return;
            }
            state.stopping = true;
        }
        self.shared.condvar.notify_all();

        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        info!("TaskSystem stopped");
    }
}

impl Drop for TaskSystem {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock_state(shared: &Shared) -> std::sync::MutexGuard<'_, QueueState> {
    match shared.state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let job = {
            let mut state = lock_state(shared);
            loop {
                if let Some(job) = state.jobs.pop_front() {
                    state.active += 1;
                    break job;
                }
                if state.stopping {
                    return;
                }
                state = match shared.condvar.wait(state) {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
            }
        };

        // A panicking task must not take the worker down with it
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            error!("Panic in TaskSystem worker thread: {message}");
        }

        let mut state = lock_state(shared);
        state.active -= 1;
        drop(state);
        shared.condvar.notify_all();
    }
}
