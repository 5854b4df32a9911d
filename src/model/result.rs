//! Test results
//!
//! The result tree produced by a run, the fault type raised by test
//! code, and the summary handed to reporting.

use std::any::Any;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::node::{NodeId, TestNode};

/// Final verdict for one executed node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Error,
    Inconclusive,
    Warning,
    Skipped,
    Cancelled,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// Failure and Error both count as failed for stop-on-error purposes
    pub fn is_failure(self) -> bool {
        matches!(self, Outcome::Failure | Outcome::Error)
    }

    /// Outcomes that stop a repeat loop early
    pub fn halts_repeat(self) -> bool {
        matches!(self, Outcome::Failure | Outcome::Error | Outcome::Cancelled)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Outcome::Success => "✓",
            Outcome::Failure => "✗",
            Outcome::Error => "!",
            Outcome::Inconclusive => "?",
            Outcome::Warning => "⚠",
            Outcome::Skipped => "○",
            Outcome::Cancelled => "⊘",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Outcome::Success => "SUCCESS",
            Outcome::Failure => "FAILURE",
            Outcome::Error => "ERROR",
            Outcome::Inconclusive => "INCONCLUSIVE",
            Outcome::Warning => "WARNING",
            Outcome::Skipped => "SKIPPED",
            Outcome::Cancelled => "CANCELLED",
        };
        write!(f, "{text}")
    }
}

/// Where a failure originated
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureSite {
    #[default]
    Test,
    SetUp,
    TearDown,
    Child,
}

/// Severity of a raised fault
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// An expected-vs-actual mismatch
    Assertion,
    /// An explicit non-verdict
    Inconclusive,
    /// A request to skip from within the test
    Ignored,
    /// A soft failure that does not fail the run by default
    Warning,
    /// Anything unexpected, including panics
    Error,
}

/// A condition raised by a case body or lifecycle hook.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestFault {
    pub kind: FaultKind,
    pub name: String,
    pub message: String,
    pub trace: Option<String>,
}

impl TestFault {
    pub fn assertion(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Assertion,
            name: "AssertionFault".to_string(),
            message: message.into(),
            trace: None,
        }
    }

    pub fn inconclusive(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Inconclusive,
            name: "InconclusiveFault".to_string(),
            message: message.into(),
            trace: None,
        }
    }

    pub fn ignored(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Ignored,
            name: "IgnoredFault".to_string(),
            message: message.into(),
            trace: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Warning,
            name: "WarningFault".to_string(),
            message: message.into(),
            trace: None,
        }
    }

    pub fn error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Error,
            name: name.into(),
            message: message.into(),
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Build a fault from a captured panic payload
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "unexpected panic".to_string()
        };
        Self::error("panic", message)
    }

    /// Message as recorded into a result; Error-kind faults carry their
    /// name the way unexpected conditions are conventionally reported
    pub fn full_message(&self) -> String {
        match self.kind {
            FaultKind::Error => format!("{} : {}", self.name, self.message),
            _ => self.message.clone(),
        }
    }
}

impl fmt::Display for TestFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_message())
    }
}

/// Result of executing one node, owning the results of its children.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestResult {
    pub node_id: NodeId,
    pub name: String,
    pub full_name: String,
    pub outcome: Outcome,
    pub site: FailureSite,
    pub message: Option<String>,
    pub trace: Option<String>,
    pub assert_count: u32,
    pub duration_secs: f64,
    pub started_at: DateTime<Utc>,
    /// Free-form data attached by the host for reporting
    pub details: Option<serde_json::Value>,
    pub children: Vec<TestResult>,
    /// The fault that produced this result, kept so decorators can
    /// inspect the raw raised condition; not part of the report
    #[serde(skip)]
    pub raised: Option<TestFault>,
}

impl TestResult {
    /// Fresh, not-yet-decided result for a node
    pub fn new(test: &TestNode) -> Self {
        Self {
            node_id: test.id(),
            name: test.name().to_string(),
            full_name: test.full_name().to_string(),
            outcome: Outcome::Inconclusive,
            site: FailureSite::Test,
            message: None,
            trace: None,
            assert_count: 0,
            duration_secs: 0.0,
            started_at: Utc::now(),
            details: None,
            children: Vec::new(),
            raised: None,
        }
    }

    /// Synthetic result for a sub-run that produced nothing
    pub fn broken(name: impl Into<String>, message: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            node_id: 0,
            full_name: name.clone(),
            name,
            outcome: Outcome::Error,
            site: FailureSite::Test,
            message: Some(message.into()),
            trace: None,
            assert_count: 0,
            duration_secs: 0.0,
            started_at: Utc::now(),
            details: None,
            children: Vec::new(),
            raised: None,
        }
    }

    /// Merge already-completed results under a synthetic container,
    /// preserving the order given
    pub fn aggregate(name: impl Into<String>, children: Vec<TestResult>) -> Self {
        let name = name.into();
        let any_failed = children.iter().any(|child| child.outcome.is_failure());
        let duration_secs = children.iter().map(|child| child.duration_secs).sum();
        Self {
            node_id: 0,
            full_name: name.clone(),
            name,
            outcome: if any_failed { Outcome::Failure } else { Outcome::Success },
            site: if any_failed { FailureSite::Child } else { FailureSite::Test },
            message: any_failed.then(|| "One or more child tests had errors".to_string()),
            trace: None,
            assert_count: 0,
            duration_secs,
            started_at: Utc::now(),
            details: None,
            children,
            raised: None,
        }
    }

    /// Attach free-form report data
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn success(&mut self) {
        self.outcome = Outcome::Success;
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Set the outcome, replacing any previous message and trace
    pub fn set(&mut self, outcome: Outcome, message: Option<String>, trace: Option<String>) {
        self.outcome = outcome;
        self.message = message;
        self.trace = trace;
    }

    pub fn set_site(&mut self, site: FailureSite) {
        self.site = site;
    }

    /// Record a raised fault, mapping its kind to an outcome
    pub fn record_fault(&mut self, fault: &TestFault) {
        let outcome = match fault.kind {
            FaultKind::Assertion => Outcome::Failure,
            FaultKind::Inconclusive => Outcome::Inconclusive,
            FaultKind::Ignored => Outcome::Skipped,
            FaultKind::Warning => Outcome::Warning,
            FaultKind::Error => Outcome::Error,
        };
        self.set(outcome, Some(fault.full_message()), fault.trace.clone());
        self.raised = Some(fault.clone());
    }

    /// Record a teardown fault: always escalates to Error and appends
    /// to whatever message and trace are already present
    pub fn record_teardown_fault(&mut self, fault: &TestFault) {
        let teardown_message = format!("TearDown : {}", fault.full_message());
        self.message = Some(match self.message.take() {
            Some(existing) => format!("{existing}\n{teardown_message}"),
            None => teardown_message,
        });

        let teardown_trace = format!("--TearDown\n{}", fault.trace.as_deref().unwrap_or_default());
        self.trace = Some(match self.trace.take() {
            Some(existing) => format!("{existing}\n{teardown_trace}"),
            None => teardown_trace,
        });

        self.outcome = Outcome::Error;
        self.site = FailureSite::TearDown;
    }

    /// Append a completed child result
    pub fn add_child(&mut self, child: TestResult) {
        self.children.push(child);
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{:.3}s]",
            self.outcome.symbol(),
            self.full_name,
            self.duration_secs
        )?;
        if let Some(message) = &self.message {
            write!(f, " - {message}")?;
        }
        Ok(())
    }
}

/// Per-outcome counts over the leaves of a result tree
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub inconclusive: usize,
    pub skipped: usize,
    pub cancelled: usize,
    pub duration_secs: f64,
}

impl RunSummary {
    /// Summarize the leaves of a result tree
    pub fn of(result: &TestResult) -> Self {
        let mut summary = Self {
            duration_secs: result.duration_secs,
            ..Self::default()
        };
        summary.visit(result);
        summary
    }

    fn visit(&mut self, result: &TestResult) {
        if result.children.is_empty() {
            self.total += 1;
            match result.outcome {
                Outcome::Success => self.passed += 1,
                Outcome::Failure => self.failed += 1,
                Outcome::Error => self.errors += 1,
                Outcome::Warning => self.warnings += 1,
                Outcome::Inconclusive => self.inconclusive += 1,
                Outcome::Skipped => self.skipped += 1,
                Outcome::Cancelled => self.cancelled += 1,
            }
        } else {
            for child in &result.children {
                self.visit(child);
            }
        }
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.passed as f64 / self.total as f64) * 100.0
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total: {} | Pass: {} | Fail: {} | Error: {} | Skip: {} ({:.1}%)",
            self.total,
            self.passed,
            self.failed,
            self.errors,
            self.skipped,
            self.pass_rate()
        )
    }
}
