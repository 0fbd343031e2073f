use thiserror::Error;

use crate::domain::fragment::{FailureKind, ALL_FAILED_APOLOGY, REFUSAL_TEXT};
use crate::domain::intent::IntentKind;

/// Failure of a single specialist call. Always converted into a failed fragment.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SpecialistError {
    #[error("specialist timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
    #[error("upstream rejected request: {0}")]
    BadRequest(String),
    #[error("upstream record not found: {0}")]
    NotFound(String),
    #[error("upstream returned an unexpected payload: {0}")]
    InvalidResponse(String),
    #[error("specialist panicked while handling the request")]
    Panicked,
}

impl SpecialistError {
    /// Maps an upstream HTTP status onto the failure taxonomy.
    pub fn from_status(status: u16, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match status {
            400 | 422 => Self::BadRequest(detail),
            404 => Self::NotFound(detail),
            408 | 504 => Self::Timeout { after_ms: 0 },
            _ => Self::Unavailable(format!("status {status}: {detail}")),
        }
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Unavailable(_) => FailureKind::Unavailable,
            Self::BadRequest(_) => FailureKind::BadRequest,
            Self::NotFound(_) => FailureKind::NotFound,
            Self::InvalidResponse(_) => FailureKind::InvalidResponse,
            Self::Panicked => FailureKind::Panicked,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unavailable(_))
    }
}

/// Conditions the coordinator absorbs. None of them ever escape as a fault.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum OrchestrationError {
    #[error("query rejected as out of scope ({signal})")]
    ScopeRejected { signal: String },
    #[error("{intent} classified with low confidence {confidence:.2}")]
    ClassificationLowConfidence { intent: IntentKind, confidence: f32 },
    #[error("{intent} specialist timed out")]
    SpecialistTimeout { intent: IntentKind },
    #[error("{intent} specialist unavailable: {reason}")]
    SpecialistUnavailable { intent: IntentKind, reason: String },
    #[error("cache entry `{fingerprint}` is corrupt")]
    CacheCorruption { fingerprint: String },
    #[error("all {attempted} specialist calls failed")]
    AllSpecialistsFailed { attempted: usize },
}

impl OrchestrationError {
    pub fn from_failure(intent: IntentKind, kind: FailureKind) -> Self {
        match kind {
            FailureKind::Timeout => Self::SpecialistTimeout { intent },
            other => Self::SpecialistUnavailable { intent, reason: other.as_str().to_string() },
        }
    }

    /// Text shown to the end user, for the conditions that surface at all.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            Self::ScopeRejected { .. } => Some(REFUSAL_TEXT),
            Self::AllSpecialistsFailed { .. } => Some(ALL_FAILED_APOLOGY),
            Self::ClassificationLowConfidence { .. }
            | Self::SpecialistTimeout { .. }
            | Self::SpecialistUnavailable { .. }
            | Self::CacheCorruption { .. } => None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        false
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            Self::ScopeRejected { .. } => "orchestration.scope.rejected",
            Self::ClassificationLowConfidence { .. } => "orchestration.classify.low_confidence",
            Self::SpecialistTimeout { .. } => "orchestration.dispatch.timeout",
            Self::SpecialistUnavailable { .. } => "orchestration.dispatch.unavailable",
            Self::CacheCorruption { .. } => "orchestration.cache.corruption",
            Self::AllSpecialistsFailed { .. } => "orchestration.dispatch.all_failed",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::InvalidRequest(message) => {
                Self::BadRequest { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}
