//! Dispatcher failure taxonomy
//!
//! Every variant maps to a determinate status; none of them escapes the
//! service function.

use hyper::{Method, StatusCode};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no resource at {0}")]
    NotFound(String),
    #[error("method {0} is not allowed on this resource")]
    MethodNotAllowed(Method),
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("message body must be a JSON object")]
    NotAnObject,
    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: u64 },
    #[error("failed to read request body: {0}")]
    BodyRead(String),
}

impl DispatchError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::InvalidJson(_) | Self::NotAnObject | Self::BodyRead(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}
