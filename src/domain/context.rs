//! Operation Context
//!
//! Metadata about the operation that produced an event. It is stored as the
//! JSON metadata map of every event envelope.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Context for an operation, used for auditing and tracing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationContext {
    /// Correlation ID shared by everything caused by one external request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,

    /// Stream coordinate (`stream@version`) of the event that caused this operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<String>,

    /// Who issued the command (a saga type, or an external caller)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_by: Option<String>,
}

impl OperationContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create context with correlation ID
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn with_causation_id(mut self, causation_id: impl Into<String>) -> Self {
        self.causation_id = Some(causation_id.into());
        self
    }

    pub fn with_issuer(mut self, issued_by: impl Into<String>) -> Self {
        self.issued_by = Some(issued_by.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let correlation_id = Uuid::new_v4();

        let context = OperationContext::new()
            .with_correlation_id(correlation_id)
            .with_causation_id("accountMonth-1@3")
            .with_issuer("AccountMonthEndedSaga");

        assert_eq!(context.correlation_id, Some(correlation_id));
        assert_eq!(context.causation_id.as_deref(), Some("accountMonth-1@3"));
        assert_eq!(context.issued_by.as_deref(), Some("AccountMonthEndedSaga"));
    }

    #[test]
    fn test_empty_context_serializes_to_empty_map() {
        let json = serde_json::to_string(&OperationContext::new()).unwrap();
        assert_eq!(json, "{}");
    }
}
