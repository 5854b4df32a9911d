//! Sub-run aggregation
//!
//! Splits a run into independent sub-runs and executes them either
//! sequentially or across the worker pool, merging results in
//! submission order regardless of completion order.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::config::RunSettings;
use crate::errors::EngineError;
use crate::executor::pool::{Task, WorkerPool};
use crate::executor::subrun::SubRunner;
use crate::filter::TestFilter;
use crate::listener::TestListener;
use crate::model::TestResult;

/// Task wrapping one sub-run; owns its own result capture.
struct SubRunTask {
    runner: Arc<dyn SubRunner>,
    listener: Arc<dyn TestListener>,
    filter: Arc<dyn TestFilter>,
    result: Mutex<Option<TestResult>>,
}

impl SubRunTask {
    fn take_result(&self) -> Option<TestResult> {
        match self.result.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

#[async_trait]
impl Task for SubRunTask {
    async fn execute(&self) {
        let result = self
            .runner
            .run(Arc::clone(&self.listener), Arc::clone(&self.filter))
            .await;
        match self.result.lock() {
            Ok(mut guard) => *guard = Some(result),
            Err(poisoned) => *poisoned.into_inner() = Some(result),
        }
    }
}

/// Coordinates independent sub-runs under a configured level of
/// parallelism, merging their results in submission order.
pub struct AggregateRunner {
    runners: Vec<Arc<dyn SubRunner>>,
    parallelism: usize,
}

impl AggregateRunner {
    pub fn new(runners: Vec<Arc<dyn SubRunner>>, parallelism: usize) -> Self {
        Self {
            runners,
            parallelism,
        }
    }

    pub fn from_settings(runners: Vec<Arc<dyn SubRunner>>, settings: &RunSettings) -> Self {
        Self::new(runners, settings.level_of_parallelism)
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    pub fn sub_run_count(&self) -> usize {
        self.runners.len()
    }

    /// Load every sub-run
    pub async fn load_all(&self) -> Result<()> {
        for runner in &self.runners {
            runner.load().await?;
        }
        Ok(())
    }

    /// Total cases under `filter` across all sub-runs
    pub fn count_test_cases(&self, filter: &dyn TestFilter) -> usize {
        self.runners
            .iter()
            .map(|runner| runner.count_test_cases(filter))
            .sum()
    }

    /// Forward a stop request to every sub-run. Sub-runs already
    /// dispatched to the pool observe it at their next suite boundary;
    /// in-flight work is not interrupted mid-case.
    pub fn stop_run(&self, force: bool) {
        for runner in &self.runners {
            runner.stop_run(force);
        }
    }

    /// Execute all sub-runs and merge their results under a synthetic
    /// `test-run` container, preserving submission order
    pub async fn run(
        &self,
        listener: Arc<dyn TestListener>,
        filter: Arc<dyn TestFilter>,
    ) -> Result<TestResult, EngineError> {
        info!(
            "running {} sub-runs (parallelism {})",
            self.runners.len(),
            self.parallelism
        );

        let results = if self.parallelism <= 1 || self.runners.len() <= 1 {
            self.run_sequential(listener, filter).await
        } else {
            self.run_parallel(listener, filter).await?
        };

        Ok(TestResult::aggregate("test-run", results))
    }

    async fn run_sequential(
        &self,
        listener: Arc<dyn TestListener>,
        filter: Arc<dyn TestFilter>,
    ) -> Vec<TestResult> {
        let mut results = Vec::with_capacity(self.runners.len());
        for runner in &self.runners {
            results.push(
                runner
                    .run(Arc::clone(&listener), Arc::clone(&filter))
                    .await,
            );
        }
        results
    }

    async fn run_parallel(
        &self,
        listener: Arc<dyn TestListener>,
        filter: Arc<dyn TestFilter>,
    ) -> Result<Vec<TestResult>, EngineError> {
        let tasks: Vec<Arc<SubRunTask>> = self
            .runners
            .iter()
            .map(|runner| {
                Arc::new(SubRunTask {
                    runner: Arc::clone(runner),
                    listener: Arc::clone(&listener),
                    filter: Arc::clone(&filter),
                    result: Mutex::new(None),
                })
            })
            .collect();

        let mut pool = WorkerPool::new(self.parallelism)?;
        for task in &tasks {
            pool.enqueue(Arc::clone(task) as Arc<dyn Task>)?;
        }
        pool.start();
        pool.wait_all().await;

        // Collect in original enqueue order, not completion order
        Ok(tasks
            .iter()
            .map(|task| {
                task.take_result().unwrap_or_else(|| {
                    TestResult::broken("sub-run", "Sub-run produced no result")
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::filter::AllTests;
    use crate::listener::NullListener;
    use crate::model::{Outcome, TestNode};

    /// Sub-runner that sleeps for an injected delay before answering,
    /// to force completion order to differ from submission order
    struct DelayedSubRunner {
        name: String,
        delay_ms: u64,
    }

    impl DelayedSubRunner {
        fn new(name: &str, delay_ms: u64) -> Arc<dyn SubRunner> {
            Arc::new(Self {
                name: name.to_string(),
                delay_ms,
            })
        }
    }

    #[async_trait]
    impl SubRunner for DelayedSubRunner {
        async fn load(&self) -> Result<()> {
            Ok(())
        }

        async fn run(
            &self,
            _listener: Arc<dyn TestListener>,
            _filter: Arc<dyn TestFilter>,
        ) -> TestResult {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            let node = TestNode::suite(self.name.clone());
            let mut result = TestResult::new(&node);
            result.success();
            result
        }

        fn count_test_cases(&self, _filter: &dyn TestFilter) -> usize {
            1
        }

        fn stop_run(&self, _force: bool) {}

        async fn unload(&self) -> Result<()> {
            Ok(())
        }
    }

    fn child_names(result: &TestResult) -> Vec<String> {
        result.children.iter().map(|c| c.name.clone()).collect()
    }

    #[tokio::test]
    async fn test_parallel_merge_preserves_submission_order() {
        // Sub-run 3 finishes long before sub-run 1
        let runner = AggregateRunner::new(
            vec![
                DelayedSubRunner::new("one", 150),
                DelayedSubRunner::new("two", 40),
                DelayedSubRunner::new("three", 5),
                DelayedSubRunner::new("four", 40),
            ],
            2,
        );

        let result = runner
            .run(Arc::new(NullListener), Arc::new(AllTests))
            .await
            .expect("run succeeds");

        assert_eq!(result.name, "test-run");
        assert_eq!(child_names(&result), vec!["one", "two", "three", "four"]);
    }

    #[tokio::test]
    async fn test_sequential_merge_matches_submission_order() {
        let runner = AggregateRunner::new(
            vec![
                DelayedSubRunner::new("one", 10),
                DelayedSubRunner::new("two", 1),
            ],
            1,
        );

        let result = runner
            .run(Arc::new(NullListener), Arc::new(AllTests))
            .await
            .expect("run succeeds");
        assert_eq!(child_names(&result), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_single_sub_run_is_executed_inline() {
        let runner = AggregateRunner::new(vec![DelayedSubRunner::new("only", 1)], 8);
        let result = runner
            .run(Arc::new(NullListener), Arc::new(AllTests))
            .await
            .expect("run succeeds");
        assert_eq!(child_names(&result), vec!["only"]);
        assert_eq!(result.outcome, Outcome::Success);
    }

    #[tokio::test]
    async fn test_count_sums_sub_runs() {
        let runner = AggregateRunner::new(
            vec![
                DelayedSubRunner::new("one", 1),
                DelayedSubRunner::new("two", 1),
                DelayedSubRunner::new("three", 1),
            ],
            2,
        );
        assert_eq!(runner.count_test_cases(&AllTests), 3);
    }
}
