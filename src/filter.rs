//! Node filters
//!
//! Predicates deciding which nodes take part in a run.

use crate::model::TestNode;

/// Decides whether a node is included in a run.
pub trait TestFilter: Send + Sync {
    fn pass(&self, node: &TestNode) -> bool;
}

/// Filter that passes every node
#[derive(Clone, Copy, Debug, Default)]
pub struct AllTests;

impl TestFilter for AllTests {
    fn pass(&self, _node: &TestNode) -> bool {
        true
    }
}

/// Filter selecting nodes whose full name contains a fragment.
///
/// A suite passes when any of its descendants would, so the path down
/// to a matching case stays in the run.
#[derive(Clone, Debug)]
pub struct NameFilter {
    fragment: String,
}

impl NameFilter {
    pub fn new(fragment: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
        }
    }
}

impl TestFilter for NameFilter {
    fn pass(&self, node: &TestNode) -> bool {
        node.full_name().contains(&self.fragment)
            || node.children().iter().any(|child| self.pass(child))
    }
}
