//! Dedicated-worker execution and timeout
//!
//! Runs the inner step on its own worker, optionally bounded by a
//! deadline. A timed-out worker is cancelled cooperatively and given a
//! short grace period; if it still does not finish it is aborted at
//! its next suspension point. Work that blocks without suspending
//! cannot be stopped without process-level isolation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinError;
use tracing::{debug, warn};

use crate::context::ExecutionContext;
use crate::model::{Outcome, TestFault, TestNode, TestResult};
use crate::step::TestStep;

/// Grace period for a timed-out worker to observe cancellation
const CANCEL_GRACE_MS: u64 = 100;

/// Runs the inner step on a dedicated worker, with an optional
/// deadline in milliseconds. Culture settings and the worker-affinity
/// identity travel with the derived context.
pub struct WorkerStep {
    inner: Arc<dyn TestStep>,
    timeout_ms: Option<u64>,
}

impl WorkerStep {
    pub fn new(inner: Arc<dyn TestStep>, timeout_ms: Option<u64>) -> Self {
        Self { inner, timeout_ms }
    }

    pub fn timeout_ms(&self) -> Option<u64> {
        self.timeout_ms
    }

    fn finish(&self, joined: Result<TestResult, JoinError>) -> TestResult {
        match joined {
            Ok(result) => result,
            Err(err) if err.is_panic() => {
                let mut result = TestResult::new(self.inner.test());
                result.record_fault(&TestFault::from_panic(err.into_panic()));
                result
            }
            Err(_) => {
                let mut result = TestResult::new(self.inner.test());
                result.set(
                    Outcome::Cancelled,
                    Some("Worker was cancelled".to_string()),
                    None,
                );
                result
            }
        }
    }
}

#[async_trait]
impl TestStep for WorkerStep {
    fn test(&self) -> &Arc<TestNode> {
        self.inner.test()
    }

    async fn execute(&self, ctx: &ExecutionContext) -> TestResult {
        let (worker_ctx, token) = ctx.for_worker();
        if let Some(affinity) = &worker_ctx.worker_affinity {
            debug!(
                "dispatching {} to a dedicated worker (affinity: {affinity})",
                self.inner.test().full_name()
            );
        }

        let inner = Arc::clone(&self.inner);
        let mut handle = tokio::spawn(async move { inner.execute(&worker_ctx).await });

        let Some(timeout_ms) = self.timeout_ms.filter(|ms| *ms > 0) else {
            return self.finish(handle.await);
        };

        match tokio::time::timeout(Duration::from_millis(timeout_ms), &mut handle).await {
            Ok(joined) => self.finish(joined),
            Err(_) => {
                token.cancel();
                let grace = Duration::from_millis(CANCEL_GRACE_MS);
                if tokio::time::timeout(grace, &mut handle).await.is_err() {
                    warn!(
                        "{} ignored cancellation; aborting its worker",
                        self.inner.test().full_name()
                    );
                    handle.abort();
                }

                let mut result = TestResult::new(self.inner.test());
                result.set(
                    Outcome::Failure,
                    Some(format!("Test exceeded Timeout value of {timeout_ms}ms")),
                    None,
                );
                result
            }
        }
    }
}
