//! Shared error taxonomy (spec.md §7).

use thiserror::Error;

/// Result alias used throughout the discovery service.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Errors the core must distinguish, independent of transport.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    /// Nil/empty required fields or a malformed request.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// Agent id, (agent, capability) pair, or task id unknown.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate agent name or duplicate capability under one agent.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Dependency resolution exceeded the configured max depth.
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// Unresolvable exclusive/resource/dependency conflict.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Composition is missing required capabilities and partial results
    /// are not allowed.
    #[error("incomplete: {0}")]
    Incomplete(String),

    /// Request-level or caller-context timeout tripped before completion.
    #[error("timed out: {0}")]
    Timeout(String),

    /// An HTTP probe or client send could not reach its peer.
    #[error("remote failure: {0}")]
    RemoteFailure(String),

    /// The caller's context was canceled.
    #[error("canceled: {0}")]
    Canceled(String),
}

impl DiscoveryError {
    /// Classifies the error into its [`ErrorKind`], useful for mapping
    /// onto transport-specific status codes.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Invalid(_) => ErrorKind::Invalid,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::LimitExceeded(_) => ErrorKind::LimitExceeded,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Incomplete(_) => ErrorKind::Incomplete,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::RemoteFailure(_) => ErrorKind::RemoteFailure,
            Self::Canceled(_) => ErrorKind::Canceled,
        }
    }

    /// Builds an [`DiscoveryError::Invalid`] from any displayable reason.
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid(reason.into())
    }

    /// Builds a [`DiscoveryError::NotFound`] from any displayable reason.
    #[must_use]
    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound(reason.into())
    }

    /// Builds an [`DiscoveryError::AlreadyExists`] from any displayable reason.
    #[must_use]
    pub fn already_exists(reason: impl Into<String>) -> Self {
        Self::AlreadyExists(reason.into())
    }
}

/// Coarse classification of [`DiscoveryError`], stable across crate
/// boundaries so transports (HTTP, in-process) can map it independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`DiscoveryError::Invalid`].
    Invalid,
    /// See [`DiscoveryError::NotFound`].
    NotFound,
    /// See [`DiscoveryError::AlreadyExists`].
    AlreadyExists,
    /// See [`DiscoveryError::LimitExceeded`].
    LimitExceeded,
    /// See [`DiscoveryError::Conflict`].
    Conflict,
    /// See [`DiscoveryError::Incomplete`].
    Incomplete,
    /// See [`DiscoveryError::Timeout`].
    Timeout,
    /// See [`DiscoveryError::RemoteFailure`].
    RemoteFailure,
    /// See [`DiscoveryError::Canceled`].
    Canceled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_maps_each_variant() {
        assert_eq!(DiscoveryError::invalid("x").kind(), ErrorKind::Invalid);
        assert_eq!(DiscoveryError::not_found("x").kind(), ErrorKind::NotFound);
        assert_eq!(
            DiscoveryError::already_exists("x").kind(),
            ErrorKind::AlreadyExists
        );
    }
}
