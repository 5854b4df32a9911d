//! Gauntlet - composable test execution engine
//!
//! Takes a tree of discovered test nodes, builds a per-node execution
//! pipeline layering cross-cutting behaviors, and runs it while
//! coordinating independent sub-runs across a bounded worker pool.
//!
//! ## Features
//!
//! - Decorated pipelines: fixture lifecycle, repetition, fault
//!   expectation, and timeout/dedicated-worker layers composed per node
//!   from its metadata
//! - Deterministic suite traversal with stop-on-error and cooperative
//!   cancellation
//! - Bounded worker pool for independent sub-runs, with results merged
//!   in submission order regardless of completion order
//! - Real-time listener notifications and serde-serializable result
//!   trees for reporting
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use gauntlet::{AllTests, LocalSubRunner, NullListener, RunSettings, SubRunner, TestNode};
//!
//! # async fn demo() {
//! let tree = TestNode::fixture("MathTests")
//!     .with_child(TestNode::sync_case("adds", |_ctx| Ok(())));
//!
//! let runner = LocalSubRunner::new(tree, RunSettings::default());
//! let result = runner.run(Arc::new(NullListener), Arc::new(AllTests)).await;
//! assert!(result.is_success());
//! # }
//! ```
//!
//! Discovery (turning source artifacts into a [`TestNode`] tree),
//! assertion evaluation, and report serialization live outside this
//! crate; the engine consumes a ready-made tree and hands back a
//! [`model::TestResult`] tree.

pub mod cancel;
pub mod config;
pub mod context;
pub mod errors;
pub mod executor;
pub mod filter;
pub mod listener;
pub mod model;
pub mod step;
pub mod utils;

pub use cancel::CancelToken;
pub use config::RunSettings;
pub use context::{CaseContext, CultureSettings, ExecutionContext};
pub use errors::EngineError;
pub use executor::{
    AggregateRunner, LocalSubRunner, SubRunner, SuiteRunner, SuiteState, Task, WorkerPool,
};
pub use filter::{AllTests, NameFilter, TestFilter};
pub use listener::{
    ListenerEvent, LoggingListener, NullListener, RecordingListener, TestListener,
};
pub use model::{
    FaultExpectation, MatchMode, NodeKind, Outcome, PropertyValue, RunState, RunSummary,
    TestFault, TestNode, TestResult,
};
pub use step::{StepBuilder, TestStep};
