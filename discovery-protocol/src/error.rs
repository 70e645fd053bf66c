//! Error type for the protocol plane.

use thiserror::Error;

/// Result alias used throughout `discovery-protocol`.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors surfaced by HTTP client, multicast, and task-registry
/// operations. Distinct from [`discovery_core::DiscoveryError`] since
/// these are transport failures, not registry invariant violations.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The supplied URL, address, or payload was malformed.
    #[error("invalid protocol input: {0}")]
    Invalid(String),

    /// A network call failed or timed out.
    #[error("protocol transport error: {0}")]
    Transport(String),

    /// A remote peer returned a non-success status or malformed body.
    #[error("remote peer error: {0}")]
    Remote(String),

    /// A lookup (task id, cached agent) found nothing.
    #[error("not found: {0}")]
    NotFound(String),
}

impl ProtocolError {
    /// Convenience constructor for [`ProtocolError::Invalid`].
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid(reason.into())
    }

    /// Convenience constructor for [`ProtocolError::Transport`].
    #[must_use]
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport(reason.into())
    }
}
