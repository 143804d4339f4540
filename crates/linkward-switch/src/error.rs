use thiserror::Error;

/// Top-level error type for the `linkward-switch` crate.
///
/// Covers every failure mode a driver can hit while talking to a switch:
/// rejected requests, transport failures, and malformed responses.
/// `linkward-core` maps these into its own taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Switch ──────────────────────────────────────────────────────
    /// The management interface rejected the request. No state change
    /// may be assumed to have happened.
    #[error("Bad request to switch (HTTP {status}). Response: {body} and Reason: {reason}")]
    Switch {
        status: u16,
        reason: String,
        body: String,
    },

    /// The switch answered successfully but the payload did not match
    /// what the primitive promises (e.g. a VLAN id outside 1..=4094).
    #[error("Switch returned a malformed result: {message}")]
    Malformed { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, reset, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transport-level failure worth retrying.
    ///
    /// A rejected request is never transient: the switch answered, so
    /// replaying it would not change the outcome.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// HTTP status of a rejected request, if that is what this error is.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Switch { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
