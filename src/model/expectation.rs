//! Expected-fault descriptors
//!
//! Metadata describing the fault a case is expected to raise, and how
//! the raised message is matched against the expectation.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::result::TestFault;

/// How an expected message is compared with the raised one
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    #[default]
    Exact,
    Contains,
    StartsWith,
    Regex,
}

/// Handler invoked with the raised fault once it has been matched
pub type FaultHandler = Arc<dyn Fn(&TestFault) + Send + Sync>;

/// Description of the fault a case is expected to raise.
///
/// An unset fault name matches any fault; an unset message matches any
/// message.
#[derive(Clone, Default)]
pub struct FaultExpectation {
    pub fault_name: Option<String>,
    pub message: Option<String>,
    pub match_mode: MatchMode,
    pub user_message: Option<String>,
    pub handler: Option<FaultHandler>,
}

impl FaultExpectation {
    /// Expect any fault at all
    pub fn any() -> Self {
        Self::default()
    }

    /// Expect a fault with the given name
    pub fn of(fault_name: impl Into<String>) -> Self {
        Self {
            fault_name: Some(fault_name.into()),
            ..Self::default()
        }
    }

    /// Additionally require the fault message to match
    pub fn with_message(mut self, message: impl Into<String>, match_mode: MatchMode) -> Self {
        self.message = Some(message.into());
        self.match_mode = match_mode;
        self
    }

    /// Prefix generated failure messages with a user-supplied message
    pub fn with_user_message(mut self, message: impl Into<String>) -> Self {
        self.user_message = Some(message.into());
        self
    }

    /// Route the matched fault to a handler before recording success
    pub fn with_handler(mut self, handler: impl Fn(&TestFault) + Send + Sync + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Whether the raised fault's name satisfies the expectation
    pub fn name_matches(&self, fault: &TestFault) -> bool {
        match &self.fault_name {
            Some(expected) => expected == &fault.name,
            None => true,
        }
    }

    /// Whether the raised fault's message satisfies the expectation
    pub fn message_matches(&self, fault: &TestFault) -> bool {
        let Some(expected) = &self.message else {
            return true;
        };
        match self.match_mode {
            MatchMode::Exact => fault.message == *expected,
            MatchMode::Contains => fault.message.contains(expected),
            MatchMode::StartsWith => fault.message.starts_with(expected),
            MatchMode::Regex => Regex::new(expected)
                .map(|re| re.is_match(&fault.message))
                .unwrap_or(false),
        }
    }

    /// Failure message for the no-fault-was-raised case
    pub fn no_fault_message(&self) -> String {
        let expected = self.fault_name.as_deref().unwrap_or("An Exception");
        self.with_user_message_prefix(format!("{expected} was expected"))
    }

    /// Failure message for a fault of the wrong type
    pub fn wrong_type_message(&self, fault: &TestFault) -> String {
        let expected = self.fault_name.as_deref().unwrap_or("An Exception");
        self.with_user_message_prefix(format!(
            "An unexpected fault was raised\nExpected: {expected}\n but was: {} : {}",
            fault.name, fault.message
        ))
    }

    /// Failure message for a fault whose message text did not match
    pub fn wrong_text_message(&self, fault: &TestFault) -> String {
        let expected_text = match self.match_mode {
            MatchMode::Exact => "Expected: ",
            MatchMode::Contains => "Expected message containing: ",
            MatchMode::StartsWith => "Expected message starting: ",
            MatchMode::Regex => "Expected message matching: ",
        };
        let expected = self.message.as_deref().unwrap_or_default();
        self.with_user_message_prefix(format!(
            "The fault message text was incorrect\n{expected_text}{expected}\n but was: {}",
            fault.message
        ))
    }

    fn with_user_message_prefix(&self, message: String) -> String {
        match &self.user_message {
            Some(user) => format!("{user}\n{message}"),
            None => message,
        }
    }
}

impl fmt::Debug for FaultExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultExpectation")
            .field("fault_name", &self.fault_name)
            .field("message", &self.message)
            .field("match_mode", &self.match_mode)
            .field("user_message", &self.user_message)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fault(name: &str, message: &str) -> TestFault {
        TestFault::error(name, message)
    }

    #[test]
    fn test_unset_name_matches_any_fault() {
        let exp = FaultExpectation::any();
        assert!(exp.name_matches(&fault("IoFault", "boom")));
    }

    #[test]
    fn test_name_match_is_exact() {
        let exp = FaultExpectation::of("IoFault");
        assert!(exp.name_matches(&fault("IoFault", "boom")));
        assert!(!exp.name_matches(&fault("ParseFault", "boom")));
    }

    #[test]
    fn test_message_match_modes() {
        let raised = fault("IoFault", "xabcx");

        let exact = FaultExpectation::any().with_message("xabcx", MatchMode::Exact);
        assert!(exact.message_matches(&raised));

        let contains = FaultExpectation::any().with_message("abc", MatchMode::Contains);
        assert!(contains.message_matches(&raised));

        let starts = FaultExpectation::any().with_message("xab", MatchMode::StartsWith);
        assert!(starts.message_matches(&raised));
        let starts = FaultExpectation::any().with_message("abc", MatchMode::StartsWith);
        assert!(!starts.message_matches(&raised));

        let regex = FaultExpectation::any().with_message("^x.b", MatchMode::Regex);
        assert!(regex.message_matches(&raised));
    }

    #[test]
    fn test_invalid_regex_never_matches() {
        let exp = FaultExpectation::any().with_message("(", MatchMode::Regex);
        assert!(!exp.message_matches(&fault("IoFault", "(")));
    }

    #[test]
    fn test_no_fault_message_defaults() {
        assert_eq!(FaultExpectation::any().no_fault_message(), "An Exception was expected");
        assert_eq!(
            FaultExpectation::of("IoFault").no_fault_message(),
            "IoFault was expected"
        );
    }

    #[test]
    fn test_user_message_prefixes_generated_text() {
        let exp = FaultExpectation::of("IoFault").with_user_message("reading the manifest");
        let message = exp.no_fault_message();
        assert!(message.starts_with("reading the manifest\n"));
        assert!(message.ends_with("IoFault was expected"));
    }

    #[test]
    fn test_wrong_text_message_names_the_mode() {
        let exp = FaultExpectation::any().with_message("abc", MatchMode::Contains);
        let message = exp.wrong_text_message(&fault("IoFault", "xyz"));
        assert!(message.contains("Expected message containing: abc"));
        assert!(message.contains(" but was: xyz"));
    }
}
