use poolchat_core::errors::SpecialistError;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String, timed_out: bool },
    #[error("{url} answered {status}: {detail}")]
    Status { url: String, status: u16, detail: String },
    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },
    #[error("invalid api configuration: {0}")]
    Configuration(String),
    #[error("invalid request: {0}")]
    InvalidInput(String),
}

impl ApiError {
    /// Transport failures and server-side statuses are worth another attempt; 4xx are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::Decode { .. } | Self::Configuration(_) | Self::InvalidInput(_) => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ApiError> for SpecialistError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Transport { timed_out: true, .. } => Self::Timeout { after_ms: 0 },
            ApiError::Transport { url, message, .. } => {
                Self::Unavailable(format!("{url}: {message}"))
            }
            ApiError::Status { status, detail, .. } => Self::from_status(status, detail),
            ApiError::Decode { url, message } => Self::InvalidResponse(format!("{url}: {message}")),
            ApiError::Configuration(message) => Self::Unavailable(message),
            ApiError::InvalidInput(message) => Self::BadRequest(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use poolchat_core::errors::SpecialistError;

    use super::ApiError;

    fn status(code: u16) -> ApiError {
        ApiError::Status {
            url: "http://api/x".to_owned(),
            status: code,
            detail: "detail".to_owned(),
        }
    }

    #[test]
    fn only_transient_failures_are_retried() {
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(ApiError::Transport {
            url: "http://api/x".to_owned(),
            message: "connection refused".to_owned(),
            timed_out: false,
        }
        .is_retryable());
    }

    #[test]
    fn statuses_map_onto_specialist_failures() {
        assert!(matches!(SpecialistError::from(status(400)), SpecialistError::BadRequest(_)));
        assert!(matches!(SpecialistError::from(status(404)), SpecialistError::NotFound(_)));
        assert!(matches!(SpecialistError::from(status(500)), SpecialistError::Unavailable(_)));
        let timed_out = ApiError::Transport {
            url: "http://api/x".to_owned(),
            message: "deadline".to_owned(),
            timed_out: true,
        };
        assert!(matches!(SpecialistError::from(timed_out), SpecialistError::Timeout { .. }));
    }
}
