//! Background task execution.
//!
//! [`TaskRunner`] owns a pool of worker threads pulling jobs from a shared
//! unbounded queue. A job runs to completion on its worker (blocking I/O
//! allowed, no cancellation) and returns an optional completion callback,
//! which crosses back to the control thread over an mpsc channel. The
//! control thread invokes queued completions exactly once, in send order,
//! by calling [`TaskRunner::drain`].

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::debug;

/// Callback delivered back to the control thread when a job finishes.
/// `None` means the caller supplied no callback; nothing is delivered.
pub type Completion = Option<Box<dyn FnOnce() + Send + 'static>>;

type Job = Box<dyn FnOnce() -> Completion + Send + 'static>;

struct JobQueue {
    jobs: Mutex<(VecDeque<Job>, bool)>, // (queue, shutting_down)
    available: Condvar,
}

/// Worker pool with cross-thread completion delivery.
pub struct TaskRunner {
    queue: Arc<JobQueue>,
    completion_tx: Sender<Box<dyn FnOnce() + Send + 'static>>,
    completion_rx: Mutex<Receiver<Box<dyn FnOnce() + Send + 'static>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskRunner {
    /// Start a runner with `workers` threads.
    pub fn new(workers: usize) -> Self {
        let queue = Arc::new(JobQueue {
            jobs: Mutex::new((VecDeque::new(), false)),
            available: Condvar::new(),
        });
        let (completion_tx, completion_rx) = mpsc::channel();

        let mut handles = Vec::with_capacity(workers.max(1));
        for worker_id in 0..workers.max(1) {
            let queue = Arc::clone(&queue);
            let tx = completion_tx.clone();
            handles.push(
                std::thread::Builder::new()
                    .name(format!("cabinet-worker-{}", worker_id))
                    .spawn(move || Self::worker_loop(worker_id, queue, tx))
                    .expect("failed to spawn worker thread"),
            );
        }

        Self {
            queue,
            completion_tx,
            completion_rx: Mutex::new(completion_rx),
            workers: Mutex::new(handles),
        }
    }

    /// Runner sized from configuration.
    pub fn from_config(config: &crate::config::EngineConfig) -> Self {
        Self::new(config.effective_workers())
    }

    /// Enqueue a unit of work. The job's returned completion callback is
    /// delivered to the control thread; `None` is silently discarded.
    pub fn schedule(&self, job: impl FnOnce() -> Completion + Send + 'static) {
        let mut guard = self.queue.jobs.lock();
        if guard.1 {
            debug!("runner shutting down, job dropped");
            return;
        }
        guard.0.push_back(Box::new(job));
        drop(guard);
        self.queue.available.notify_one();
    }

    /// Run all completions queued so far on the calling thread. Returns the
    /// number invoked. Non-blocking.
    pub fn drain(&self) -> usize {
        let rx = self.completion_rx.lock();
        let mut count = 0;
        while let Ok(completion) = rx.try_recv() {
            completion();
            count += 1;
        }
        count
    }

    /// Wait up to `timeout` for at least one completion, then drain the
    /// rest without blocking. Returns the number invoked.
    pub fn drain_timeout(&self, timeout: Duration) -> usize {
        let rx = self.completion_rx.lock();
        let first = match rx.recv_timeout(timeout) {
            Ok(completion) => completion,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return 0,
        };
        first();
        let mut count = 1;
        while let Ok(completion) = rx.try_recv() {
            completion();
            count += 1;
        }
        count
    }

    /// Finish queued jobs and join the workers. Completions still pending
    /// after shutdown can be drained afterwards.
    pub fn shutdown(&self) {
        {
            let mut guard = self.queue.jobs.lock();
            guard.1 = true;
        }
        self.queue.available.notify_all();
        let handles = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            let _ = handle.join();
        }
        debug!("task runner stopped");
    }

    pub(crate) fn completion_sender(&self) -> Sender<Box<dyn FnOnce() + Send + 'static>> {
        self.completion_tx.clone()
    }

    fn worker_loop(
        worker_id: usize,
        queue: Arc<JobQueue>,
        tx: Sender<Box<dyn FnOnce() + Send + 'static>>,
    ) {
        debug!(worker_id, "worker started");
        loop {
            let job = {
                let mut guard = queue.jobs.lock();
                loop {
                    if let Some(job) = guard.0.pop_front() {
                        break job;
                    }
                    if guard.1 {
                        debug!(worker_id, "worker stopped");
                        return;
                    }
                    queue.available.wait(&mut guard);
                }
            };
            if let Some(completion) = job() {
                // the control thread may already be gone during teardown
                let _ = tx.send(completion);
            }
        }
    }
}

impl Drop for TaskRunner {
    fn drop(&mut self) {
        self.shutdown();
    }
}
