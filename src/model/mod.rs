//! Data model
//!
//! Test nodes, results, and expected-fault descriptors.

mod expectation;
mod node;
mod result;

pub use expectation::{FaultExpectation, FaultHandler, MatchMode};
pub use node::{
    prop, CaseBehavior, CaseBody, CaseFuture, CaseOutcome, FixtureHooks, LifecycleHook, NodeId,
    NodeKind, PropertyBag, PropertyValue, RunState, TestNode,
};
pub use result::{FailureSite, FaultKind, Outcome, RunSummary, TestFault, TestResult};
