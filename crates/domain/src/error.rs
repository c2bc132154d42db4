//! Unified error types for the domain layer
//!
//! Provides a common error type usable across all domain operations, so
//! adapters are not forced onto String or anyhow.

use thiserror::Error;

/// Unified error type for domain operations
#[derive(Debug, Error, Clone)]
pub enum DomainError {
    /// Validation failed (e.g., invalid field values)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Entity not found
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Business rule violation
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Parse error (for value objects)
    #[error("Parse error: {0}")]
    Parse(String),

    /// State transition not allowed
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),
}

impl DomainError {
    /// Creates a validation error for business rule violations.
    ///
    /// Use this when domain invariants or constraints are violated:
    /// required fields empty, values outside allowed ranges, unknown
    /// authored ids.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Create a constraint violation error
    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::Constraint(msg.into())
    }

    /// Creates a parse error for string-to-type conversion failures.
    ///
    /// Use this in `FromStr` implementations when the input string does not
    /// match any known variant or format.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create an invalid state transition error
    pub fn invalid_state_transition(msg: impl Into<String>) -> Self {
        Self::InvalidStateTransition(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let err = DomainError::validation("quest id cannot be empty");
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(
            err.to_string(),
            "Validation failed: quest id cannot be empty"
        );
    }

    #[test]
    fn test_not_found_error() {
        let err = DomainError::not_found("Evidence", "evd_cell_key");
        assert!(matches!(err, DomainError::NotFound { .. }));
        assert!(err.to_string().contains("Evidence"));
        assert!(err.to_string().contains("evd_cell_key"));
    }

    #[test]
    fn test_constraint_error() {
        let err = DomainError::constraint("stage not in sequence");
        assert!(matches!(err, DomainError::Constraint(_)));
        assert_eq!(
            err.to_string(),
            "Constraint violation: stage not in sequence"
        );
    }

    #[test]
    fn test_invalid_state_transition_error() {
        let err = DomainError::invalid_state_transition("completed -> in_progress");
        assert!(err.to_string().contains("completed -> in_progress"));
    }
}
