//! Execution pipeline
//!
//! One executable step per test node, composed by decoration: a leaf
//! executor wrapped in the layers the node's metadata asks for.
//! Pipelines are built fresh for each run and discarded afterward.

mod builder;
mod case;
mod context;
mod expectation;
pub(crate) mod lifecycle;
mod repeat;
mod suite;
mod worker;

pub use builder::StepBuilder;
pub use case::{CaseStep, SkipStep};
pub use context::ContextStep;
pub use expectation::ExpectationStep;
pub use lifecycle::LifecycleStep;
pub use repeat::RepeatStep;
pub use suite::SuiteStep;
pub use worker::WorkerStep;

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::ExecutionContext;
use crate::model::{TestNode, TestResult};

/// A composed, executable wrapper built around a test node.
#[async_trait]
pub trait TestStep: Send + Sync {
    /// The node this step realizes
    fn test(&self) -> &Arc<TestNode>;

    /// Execute the step, producing its result
    async fn execute(&self, ctx: &ExecutionContext) -> TestResult;
}
