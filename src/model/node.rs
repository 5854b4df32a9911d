//! Test node tree
//!
//! The immutable-once-built hierarchy of suites, fixtures and cases
//! handed to the engine by a discovery component.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::context::CaseContext;
use crate::filter::TestFilter;
use crate::model::expectation::FaultExpectation;
use crate::model::result::TestFault;

static NEXT_ID: AtomicU32 = AtomicU32::new(1);

/// Identifier assigned to each node at construction
pub type NodeId = u32;

/// Well-known property names carrying execution-affecting settings
pub mod prop {
    pub const REPEAT_COUNT: &str = "RepeatCount";
    pub const TIMEOUT: &str = "Timeout";
    pub const REQUIRES_WORKER: &str = "RequiresWorker";
    pub const SKIP_REASON: &str = "SkipReason";
    pub const CULTURE: &str = "Culture";
    pub const UI_CULTURE: &str = "UiCulture";
    pub const WORKER_AFFINITY: &str = "WorkerAffinity";
}

/// Whether and how a node may be run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Runnable,
    Explicit,
    Skipped,
    NotRunnable,
}

impl RunState {
    /// Runnable and Explicit nodes execute; everything else is skipped
    pub fn is_runnable(self) -> bool {
        matches!(self, RunState::Runnable | RunState::Explicit)
    }
}

/// A single property value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Int(i64),
    Bool(bool),
    Text(String),
}

impl PropertyValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Text(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Text(v)
    }
}

/// Ordered multimap of named properties attached to a node
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PropertyBag {
    entries: Vec<(String, PropertyValue)>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value; existing values under the same name are kept
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value recorded under `name`
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// All values recorded under `name`, in insertion order
    pub fn get_all(&self, name: &str) -> Vec<&PropertyValue> {
        self.entries
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v)
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

/// Outcome of a case body or lifecycle hook
pub type CaseOutcome = Result<(), TestFault>;

/// Boxed future produced by a case body
pub type CaseFuture = BoxFuture<'static, CaseOutcome>;

/// The executable payload of a case node
pub type CaseBody = Arc<dyn Fn(CaseContext) -> CaseFuture + Send + Sync>;

/// A setup or teardown hook supplied by discovery
pub type LifecycleHook = Arc<dyn Fn() -> Result<(), TestFault> + Send + Sync>;

/// Setup/teardown hooks owned by a fixture
#[derive(Clone, Default)]
pub struct FixtureHooks {
    /// One-time setups, run once before any child, in declared order
    pub one_time_setups: Vec<LifecycleHook>,
    /// One-time teardowns, run once after all children, in reverse order
    pub one_time_teardowns: Vec<LifecycleHook>,
    /// Per-case setups, run before each case, in declared order
    pub setups: Vec<LifecycleHook>,
    /// Per-case teardowns, run after each case, in reverse order
    pub teardowns: Vec<LifecycleHook>,
}

impl fmt::Debug for FixtureHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureHooks")
            .field("one_time_setups", &self.one_time_setups.len())
            .field("one_time_teardowns", &self.one_time_teardowns.len())
            .field("setups", &self.setups.len())
            .field("teardowns", &self.teardowns.len())
            .finish()
    }
}

/// The executable payload of a case node
#[derive(Clone)]
pub struct CaseBehavior {
    pub body: CaseBody,
    pub expectation: Option<FaultExpectation>,
}

impl fmt::Debug for CaseBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaseBehavior")
            .field("expectation", &self.expectation)
            .finish()
    }
}

/// What a node is: a grouping suite, a fixture with hooks, or a leaf case
#[derive(Clone, Debug)]
pub enum NodeKind {
    Suite,
    Fixture(FixtureHooks),
    Case(CaseBehavior),
}

impl NodeKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeKind::Suite => "Suite",
            NodeKind::Fixture(_) => "Fixture",
            NodeKind::Case(_) => "Case",
        }
    }
}

/// An item in the discovered test tree.
///
/// Nodes are built once by discovery and read-only to the engine.
/// Attaching a child with [`TestNode::with_child`] qualifies the
/// child's full name with the parent's.
#[derive(Clone)]
pub struct TestNode {
    id: NodeId,
    name: String,
    full_name: String,
    kind: NodeKind,
    run_state: RunState,
    properties: PropertyBag,
    children: Vec<Arc<TestNode>>,
}

impl TestNode {
    fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        let name = name.into();
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            full_name: name.clone(),
            name,
            kind,
            run_state: RunState::Runnable,
            properties: PropertyBag::new(),
            children: Vec::new(),
        }
    }

    /// Create a grouping suite
    pub fn suite(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Suite)
    }

    /// Create a fixture (a suite that owns lifecycle hooks)
    pub fn fixture(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Fixture(FixtureHooks::default()))
    }

    /// Create a leaf case from an async body
    pub fn case(
        name: impl Into<String>,
        body: impl Fn(CaseContext) -> CaseFuture + Send + Sync + 'static,
    ) -> Self {
        Self::new(
            name,
            NodeKind::Case(CaseBehavior {
                body: Arc::new(body),
                expectation: None,
            }),
        )
    }

    /// Create a leaf case from a synchronous body
    pub fn sync_case(
        name: impl Into<String>,
        body: impl Fn(CaseContext) -> CaseOutcome + Send + Sync + 'static,
    ) -> Self {
        let body = Arc::new(body);
        Self::case(name, move |ctx| {
            let body = Arc::clone(&body);
            Box::pin(async move { body(ctx) })
        })
    }

    pub fn with_run_state(mut self, run_state: RunState) -> Self {
        self.run_state = run_state;
        self
    }

    pub fn with_property(
        mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.properties.add(name, value);
        self
    }

    /// Attach a child, qualifying its full name (and its descendants')
    /// with this node's full name
    pub fn with_child(mut self, mut child: TestNode) -> Self {
        Self::qualify(&mut child, &self.full_name);
        self.children.push(Arc::new(child));
        self
    }

    /// Add a one-time setup hook (fixtures only)
    pub fn with_one_time_setup(
        mut self,
        hook: impl Fn() -> Result<(), TestFault> + Send + Sync + 'static,
    ) -> Self {
        if let NodeKind::Fixture(hooks) = &mut self.kind {
            hooks.one_time_setups.push(Arc::new(hook));
        }
        self
    }

    /// Add a one-time teardown hook (fixtures only)
    pub fn with_one_time_teardown(
        mut self,
        hook: impl Fn() -> Result<(), TestFault> + Send + Sync + 'static,
    ) -> Self {
        if let NodeKind::Fixture(hooks) = &mut self.kind {
            hooks.one_time_teardowns.push(Arc::new(hook));
        }
        self
    }

    /// Add a per-case setup hook (fixtures only)
    pub fn with_setup(
        mut self,
        hook: impl Fn() -> Result<(), TestFault> + Send + Sync + 'static,
    ) -> Self {
        if let NodeKind::Fixture(hooks) = &mut self.kind {
            hooks.setups.push(Arc::new(hook));
        }
        self
    }

    /// Add a per-case teardown hook (fixtures only)
    pub fn with_teardown(
        mut self,
        hook: impl Fn() -> Result<(), TestFault> + Send + Sync + 'static,
    ) -> Self {
        if let NodeKind::Fixture(hooks) = &mut self.kind {
            hooks.teardowns.push(Arc::new(hook));
        }
        self
    }

    /// Declare the fault this case is expected to raise (cases only)
    pub fn with_expected_fault(mut self, expectation: FaultExpectation) -> Self {
        if let NodeKind::Case(behavior) = &mut self.kind {
            behavior.expectation = Some(expectation);
        }
        self
    }

    fn qualify(node: &mut TestNode, prefix: &str) {
        node.full_name = format!("{prefix}.{}", node.name);
        let parent_name = node.full_name.clone();
        let children = std::mem::take(&mut node.children);
        node.children = children
            .into_iter()
            .map(|child| match Arc::try_unwrap(child) {
                Ok(mut child) => {
                    Self::qualify(&mut child, &parent_name);
                    Arc::new(child)
                }
                // Shared elsewhere; leave its naming alone
                Err(shared) => shared,
            })
            .collect();
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    pub fn children(&self) -> &[Arc<TestNode>] {
        &self.children
    }

    /// Whether the node groups other nodes
    pub fn is_suite(&self) -> bool {
        matches!(self.kind, NodeKind::Suite | NodeKind::Fixture(_))
    }

    pub fn is_case(&self) -> bool {
        matches!(self.kind, NodeKind::Case(_))
    }

    /// Number of repetitions requested via the `RepeatCount` property
    pub fn repeat_count(&self) -> u32 {
        self.properties
            .get(prop::REPEAT_COUNT)
            .and_then(PropertyValue::as_int)
            .map(|v| v.max(1) as u32)
            .unwrap_or(1)
    }

    /// Timeout in milliseconds from the `Timeout` property, if positive
    pub fn timeout_ms(&self) -> Option<u64> {
        self.properties
            .get(prop::TIMEOUT)
            .and_then(PropertyValue::as_int)
            .filter(|v| *v > 0)
            .map(|v| v as u64)
    }

    /// Whether the node asked to run on a dedicated worker
    pub fn requires_worker(&self) -> bool {
        self.properties
            .get(prop::REQUIRES_WORKER)
            .and_then(PropertyValue::as_bool)
            .unwrap_or(false)
    }

    pub fn skip_reason(&self) -> Option<&str> {
        self.properties
            .get(prop::SKIP_REASON)
            .and_then(PropertyValue::as_text)
    }

    pub fn culture(&self) -> Option<&str> {
        self.properties
            .get(prop::CULTURE)
            .and_then(PropertyValue::as_text)
    }

    pub fn ui_culture(&self) -> Option<&str> {
        self.properties
            .get(prop::UI_CULTURE)
            .and_then(PropertyValue::as_text)
    }

    pub fn worker_affinity(&self) -> Option<&str> {
        self.properties
            .get(prop::WORKER_AFFINITY)
            .and_then(PropertyValue::as_text)
    }

    /// Count the cases beneath this node that pass `filter`
    pub fn count_test_cases(&self, filter: &dyn TestFilter) -> usize {
        if self.is_case() {
            usize::from(filter.pass(self))
        } else {
            self.children
                .iter()
                .filter(|child| filter.pass(child))
                .map(|child| child.count_test_cases(filter))
                .sum()
        }
    }
}

impl fmt::Debug for TestNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestNode")
            .field("id", &self.id)
            .field("full_name", &self.full_name)
            .field("kind", &self.kind.kind_name())
            .field("run_state", &self.run_state)
            .field("children", &self.children.len())
            .finish()
    }
}

impl fmt::Display for TestNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name)
    }
}
