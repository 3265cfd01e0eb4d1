//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent violations of the object model contract.
/// Absence on lookups is not an error: those return `Option`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("duplicate key in {tag} pool: {key}")]
    DuplicateKey { tag: &'static str, key: String },

    #[error("{tag} '{key}' is already attached under {parent}")]
    DuplicateRelation {
        parent: String,
        tag: &'static str,
        key: String,
    },

    #[error("type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("no {tag} '{key}' attached under {parent}")]
    NotFound {
        parent: String,
        tag: &'static str,
        key: String,
    },

    #[error("stale {tag} handle: node no longer exists")]
    StaleHandle { tag: &'static str },

    #[error("corrupt stream at record {record}: {reason}")]
    CorruptStream { record: usize, reason: String },
}

impl DomainError {
    pub(crate) fn corrupt(record: usize, reason: impl Into<String>) -> Self {
        Self::CorruptStream {
            record,
            reason: reason.into(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
