//! Execution context
//!
//! The per-run ambient state, passed explicitly down the call chain.
//! Entering a node derives a nested scope; dropping the scope is the
//! restore. Contexts are never shared between concurrent workers: a
//! dedicated worker gets its own derived context and a linked
//! cancellation token.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::config::RunSettings;
use crate::listener::TestListener;
use crate::model::TestNode;

/// Locale-like ambient settings propagated to tests
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CultureSettings {
    pub culture: Option<String>,
    pub ui_culture: Option<String>,
}

/// Counter of assertions evaluated while a case runs
#[derive(Clone, Default)]
pub struct AssertCounter {
    count: Arc<AtomicU32>,
}

impl AssertCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn value(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Ambient state for one executing scope of the pipeline.
#[derive(Clone)]
pub struct ExecutionContext {
    current_test: Option<Arc<TestNode>>,
    listener: Arc<dyn TestListener>,
    cancel: CancelToken,
    asserts: AssertCounter,
    pub stop_on_error: bool,
    pub default_timeout_ms: Option<u64>,
    pub culture: CultureSettings,
    pub worker_affinity: Option<String>,
}

impl ExecutionContext {
    /// Root context for a run
    pub fn new(listener: Arc<dyn TestListener>, settings: &RunSettings) -> Self {
        Self {
            current_test: None,
            listener,
            cancel: CancelToken::new(),
            asserts: AssertCounter::new(),
            stop_on_error: settings.stop_on_error,
            default_timeout_ms: settings.default_timeout_ms,
            culture: settings.culture.clone(),
            worker_affinity: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn current_test(&self) -> Option<&Arc<TestNode>> {
        self.current_test.as_ref()
    }

    pub fn listener(&self) -> &Arc<dyn TestListener> {
        &self.listener
    }

    pub fn cancel(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn assert_count(&self) -> u32 {
        self.asserts.value()
    }

    /// Derive the scope for a node: fresh assert counter, node-level
    /// culture and affinity overrides. The caller's context is the
    /// saved state; dropping the returned scope restores it.
    pub fn enter(&self, test: &Arc<TestNode>) -> ExecutionContext {
        let mut scope = self.clone();
        scope.current_test = Some(Arc::clone(test));
        scope.asserts = AssertCounter::new();
        if let Some(culture) = test.culture() {
            scope.culture.culture = Some(culture.to_string());
        }
        if let Some(ui_culture) = test.ui_culture() {
            scope.culture.ui_culture = Some(ui_culture.to_string());
        }
        if let Some(affinity) = test.worker_affinity() {
            scope.worker_affinity = Some(affinity.to_string());
        }
        scope
    }

    /// Derive the context handed to a dedicated worker, with a child
    /// cancellation token so the worker can be cancelled alone
    pub fn for_worker(&self) -> (ExecutionContext, CancelToken) {
        let token = self.cancel.child();
        let mut ctx = self.clone();
        ctx.cancel = token.clone();
        (ctx, token)
    }

    /// The slice of context a case body receives
    pub fn case_context(&self) -> CaseContext {
        CaseContext {
            asserts: self.asserts.clone(),
            cancel: self.cancel.clone(),
            culture: self.culture.clone(),
        }
    }
}

/// Context handed to a case body.
#[derive(Clone)]
pub struct CaseContext {
    pub asserts: AssertCounter,
    pub cancel: CancelToken,
    pub culture: CultureSettings,
}

impl CaseContext {
    /// Record one evaluated assertion
    pub fn count_assert(&self) {
        self.asserts.increment();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait until the run is cancelled; cooperative bodies race their
    /// work against this
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::NullListener;
    use crate::model::prop;

    fn root() -> ExecutionContext {
        ExecutionContext::new(Arc::new(NullListener), &RunSettings::default())
    }

    #[test]
    fn test_enter_sets_current_test_without_touching_outer() {
        let ctx = root();
        let node = Arc::new(TestNode::suite("outer"));

        let scope = ctx.enter(&node);
        assert_eq!(
            scope.current_test().map(|t| t.full_name()),
            Some("outer")
        );
        assert!(ctx.current_test().is_none());
    }

    #[test]
    fn test_nested_scopes_have_independent_assert_counters() {
        let ctx = root();
        let outer_node = Arc::new(TestNode::suite("outer"));
        let inner_node = Arc::new(TestNode::sync_case("inner", |_ctx| Ok(())));

        let outer = ctx.enter(&outer_node);
        outer.case_context().count_assert();

        let inner = outer.enter(&inner_node);
        inner.case_context().count_assert();
        inner.case_context().count_assert();

        assert_eq!(inner.assert_count(), 2);
        assert_eq!(outer.assert_count(), 1);
    }

    #[test]
    fn test_culture_override_scoped_to_node() {
        let ctx = root();
        let node = Arc::new(
            TestNode::sync_case("t", |_ctx| Ok(())).with_property(prop::CULTURE, "fr-FR"),
        );

        let scope = ctx.enter(&node);
        assert_eq!(scope.culture.culture.as_deref(), Some("fr-FR"));
        assert_eq!(ctx.culture.culture, None);
    }

    #[test]
    fn test_worker_context_gets_child_token() {
        let ctx = root();
        let (worker_ctx, token) = ctx.for_worker();

        token.cancel();
        assert!(worker_ctx.cancel().is_cancelled());
        assert!(!ctx.cancel().is_cancelled());
    }
}
