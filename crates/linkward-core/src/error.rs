// ── Core error types ──
//
// The taxonomy callers see. Switch-level failures arrive as
// `linkward_switch::Error` and are classified here into rejected
// (terminal), transient (retryable) and contract (defect) failures.

use linkward_switch::VlanId;
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Request errors ───────────────────────────────────────────────
    /// Illegal channel/network combination or otherwise unacceptable
    /// request. Raised synchronously, before anything is recorded.
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("{entity_type} '{identifier}' not found")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    #[error("{entity_type} '{identifier}': {reason}")]
    Conflict {
        entity_type: &'static str,
        identifier: String,
        reason: String,
    },

    // ── Allocation ───────────────────────────────────────────────────
    #[error("No free VLAN id left in pool [{start}, {end})")]
    AllocationExhausted { start: VlanId, end: VlanId },

    // ── Switch errors ────────────────────────────────────────────────
    /// The switch rejected a request or returned a malformed result.
    #[error("Switch error: {message}")]
    Switch {
        message: String,
        status: Option<u16>,
        body: Option<String>,
    },

    /// Network-level failure talking to a switch.
    #[error("Transient transport failure: {message}")]
    TransportTransient { message: String },

    /// An internal invariant was violated (malformed channel reaching a
    /// session, mismatched network id, wrong switch). Indicates a defect.
    #[error("Protocol contract violated: {message}")]
    ProtocolContract { message: String },

    // ── Engine errors ────────────────────────────────────────────────
    #[error("Action {action_id} cannot be cancelled: {reason}")]
    CancelRejected { action_id: String, reason: String },

    // ── Storage errors ───────────────────────────────────────────────
    #[error("Storage error: {0}")]
    Storage(Box<redb::Error>),

    #[error("Corrupt record in {table}: {message}")]
    Corrupt { table: &'static str, message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Returns `true` for failures eligible for bounded retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransportTransient { .. })
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn contract(message: impl Into<String>) -> Self {
        Self::ProtocolContract {
            message: message.into(),
        }
    }

    pub(crate) fn not_found(entity_type: &'static str, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            identifier: identifier.into(),
        }
    }

    pub(crate) fn conflict(
        entity_type: &'static str,
        identifier: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            entity_type,
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }
}

// ── Conversion from switch-layer errors ──────────────────────────────

impl From<linkward_switch::Error> for CoreError {
    fn from(err: linkward_switch::Error) -> Self {
        use linkward_switch::Error as E;

        if err.is_transient() {
            return CoreError::TransportTransient {
                message: err.to_string(),
            };
        }

        match err {
            E::Switch {
                status,
                reason,
                body,
            } => CoreError::Switch {
                message: format!("Bad Request to switch. Response: {body} and Reason: {reason}"),
                status: Some(status),
                body: Some(body),
            },
            E::Malformed { message } => CoreError::Switch {
                message: format!("malformed result: {message}"),
                status: None,
                body: None,
            },
            E::Deserialization { message, body } => CoreError::Switch {
                message: format!("malformed result: {message}"),
                status: None,
                body: Some(body),
            },
            E::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid switch URL: {e}"),
            },
            E::Tls(msg) => CoreError::Config {
                message: format!("TLS error: {msg}"),
            },
            other => CoreError::Switch {
                message: other.to_string(),
                status: other.status(),
                body: None,
            },
        }
    }
}

// ── Conversion from storage errors ───────────────────────────────────

macro_rules! storage_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for CoreError {
                fn from(err: $ty) -> Self {
                    CoreError::Storage(Box::new(err.into()))
                }
            }
        )*
    };
}

storage_from!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switch_rejection_keeps_raw_detail() {
        let err: CoreError = linkward_switch::Error::Switch {
            status: 500,
            reason: "Internal Server Error".into(),
            body: "vlan 42 unknown".into(),
        }
        .into();
        match err {
            CoreError::Switch {
                message,
                status,
                body,
            } => {
                assert!(message.contains("vlan 42 unknown"));
                assert!(message.contains("Internal Server Error"));
                assert_eq!(status, Some(500));
                assert_eq!(body.as_deref(), Some("vlan 42 unknown"));
            }
            other => panic!("expected Switch, got {other:?}"),
        }
    }

    #[test]
    fn timeout_becomes_transient() {
        let err: CoreError = linkward_switch::Error::Timeout { timeout_secs: 3 }.into();
        assert!(err.is_transient());
    }

    #[test]
    fn malformed_result_is_terminal_switch_error() {
        let err: CoreError = linkward_switch::Error::Malformed {
            message: "vlan 0".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Switch { .. }));
        assert!(!err.is_transient());
    }
}
