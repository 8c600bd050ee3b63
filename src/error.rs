//! Error taxonomy for yums-core.
//!
//! Repositories and engines never swallow errors: they either return one of
//! the typed variants below or propagate the underlying store failure
//! unchanged inside `StoreUnavailable`. Retry/backoff policy belongs to the
//! caller, not this crate.

use crate::orders::OrderStatus;

/// Crate-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Backend/storage failure on any store operation. The message carries
    /// the underlying driver error verbatim.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Attempted backward or skip-state order status update. Rejected before
    /// any store write is issued.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Missing or malformed required fields, caught client-side before any
    /// store call.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Update or fetch referencing a document id that does not exist.
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// A stored document that no longer decodes into its model type.
    #[error("corrupt document {collection}/{id}: {reason}")]
    Corrupt {
        collection: String,
        id: String,
        reason: String,
    },
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// True for failures the UI should treat as transient backend trouble
    /// (error banner + retain last-known-good view) rather than a caller bug.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, CoreError::StoreUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_message_names_both_states() {
        let err = CoreError::InvalidTransition {
            from: OrderStatus::Ready,
            to: OrderStatus::Pending,
        };
        assert_eq!(err.to_string(), "invalid status transition: ready -> pending");
    }

    #[test]
    fn test_not_found_message() {
        let err = CoreError::NotFound {
            collection: "orders".into(),
            id: "abc".into(),
        };
        assert_eq!(err.to_string(), "document not found: orders/abc");
        assert!(!err.is_store_failure());
    }

    #[test]
    fn test_store_failure_classification() {
        assert!(CoreError::StoreUnavailable("disk io".into()).is_store_failure());
        assert!(!CoreError::Validation("empty name".into()).is_store_failure());
    }
}
