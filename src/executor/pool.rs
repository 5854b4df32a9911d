//! Worker pool
//!
//! A fixed-size pool of concurrent workers draining a pre-loaded task
//! queue. Tasks are enqueued before the pool starts; each worker loops
//! atomically-dequeue-or-exit until the queue is empty.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::errors::EngineError;

/// A unit of work, opaque to the pool; it owns its own result capture.
#[async_trait]
pub trait Task: Send + Sync {
    async fn execute(&self);
}

struct WorkerGate {
    remaining: AtomicUsize,
    notify: Notify,
}

/// Fixed-size pool of concurrent workers.
pub struct WorkerPool {
    max_workers: usize,
    queue: Arc<Mutex<VecDeque<Arc<dyn Task>>>>,
    gate: Arc<WorkerGate>,
    started: bool,
}

fn lock_queue(
    queue: &Mutex<VecDeque<Arc<dyn Task>>>,
) -> MutexGuard<'_, VecDeque<Arc<dyn Task>>> {
    match queue.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl WorkerPool {
    pub fn new(max_workers: usize) -> Result<Self, EngineError> {
        if max_workers < 1 {
            return Err(EngineError::argument(
                "worker pool needs at least one worker",
            ));
        }
        Ok(Self {
            max_workers,
            queue: Arc::new(Mutex::new(VecDeque::new())),
            gate: Arc::new(WorkerGate {
                remaining: AtomicUsize::new(0),
                notify: Notify::new(),
            }),
            started: false,
        })
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn queued(&self) -> usize {
        lock_queue(&self.queue).len()
    }

    /// Add a task; only allowed before the pool starts
    pub fn enqueue(&mut self, task: Arc<dyn Task>) -> Result<(), EngineError> {
        if self.started {
            return Err(EngineError::operation(
                "tasks cannot be enqueued after the pool has started",
            ));
        }
        lock_queue(&self.queue).push_back(task);
        Ok(())
    }

    /// Spin up `min(queued, max_workers)` workers, each looping:
    /// dequeue-or-exit, execute, repeat
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;

        let worker_count = self.queued().min(self.max_workers);
        self.gate.remaining.store(worker_count, Ordering::Release);
        debug!("starting {worker_count} pool workers");

        for worker_id in 0..worker_count {
            let queue = Arc::clone(&self.queue);
            let gate = Arc::clone(&self.gate);
            tokio::spawn(async move {
                loop {
                    let task = lock_queue(&queue).pop_front();
                    let Some(task) = task else { break };

                    // A panicking task must not take the worker down
                    if AssertUnwindSafe(task.execute()).catch_unwind().await.is_err() {
                        warn!("pool worker {worker_id}: task panicked; continuing");
                    }
                }
                debug!("pool worker {worker_id} finished");
                if gate.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    gate.notify.notify_waiters();
                }
            });
        }
    }

    /// Wait until every worker has terminated
    pub async fn wait_all(&self) {
        loop {
            let notified = self.gate.notify.notified();
            if self.gate.remaining.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Wait until every worker has terminated or the timeout elapses,
    /// reporting whether they all did; the pool stays waitable
    pub async fn wait_all_for(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_all()).await.is_ok()
    }
}
