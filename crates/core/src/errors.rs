use thiserror::Error;

use crate::flows::FlowTransitionError;

/// Broken conversation-state rules. Both variants mean the server itself
/// misbehaved, never that the caller sent bad input.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    FlowTransition(#[from] FlowTransitionError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Failures of a routed turn, before they are shaped for a transport.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// The caller's payload was unusable. Only the transport raises this.
    BadRequest,
    /// A collaborator (completion, embedding or vector index) failed; retrying may help.
    ServiceUnavailable,
    Internal,
}

impl FailureKind {
    pub fn user_message(self) -> &'static str {
        match self {
            Self::BadRequest => "The request could not be processed. Check inputs and try again.",
            Self::ServiceUnavailable => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal => "An unexpected internal error occurred.",
        }
    }
}

/// What a transport may show a customer: a kind, a user-safe message and the
/// correlation id that ties the reply to the server logs. `detail` is for
/// logs only.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{kind:?} [{correlation_id}]: {detail}")]
pub struct InterfaceError {
    kind: FailureKind,
    detail: String,
    correlation_id: String,
}

impl InterfaceError {
    pub fn new(
        kind: FailureKind,
        detail: impl Into<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self { kind, detail: detail.into(), correlation_id: correlation_id.into() }
    }

    pub fn bad_request(detail: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self::new(FailureKind::BadRequest, detail, correlation_id)
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

impl ApplicationError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Integration(_) => FailureKind::ServiceUnavailable,
            Self::Domain(_) | Self::Configuration(_) => FailureKind::Internal,
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        InterfaceError::new(self.failure_kind(), self.to_string(), correlation_id)
    }
}
