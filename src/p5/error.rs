use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum P5Error {
    #[error("{message}")]
    NotFound {
        message: String,
        details: Option<serde_json::Value>,
    },
    #[error("{message}")]
    Forbidden { message: String },
    #[error("{message}")]
    PreconditionFailed {
        message: String,
        details: Option<serde_json::Value>,
    },
    #[error("{message}")]
    Validation { message: String },
    #[error("missing caller identity")]
    Unauthenticated,
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

pub type P5Result<T> = Result<T, P5Error>;

impl P5Error {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            details: None,
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn locked(details: Option<serde_json::Value>) -> Self {
        Self::PreconditionFailed {
            message: "editing is locked".to_string(),
            details,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::PreconditionFailed { .. } => "PRECONDITION_FAILED",
            Self::Validation { .. } => "VALIDATION_FAILED",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Storage(_) => "PERSISTENCE_FAILED",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::NotFound { details, .. } | Self::PreconditionFailed { details, .. } => {
                details.clone()
            }
            // The whole transaction was rolled back; the client may resubmit.
            Self::Storage(_) => Some(json!({ "retryable": true })),
            _ => None,
        }
    }
}
