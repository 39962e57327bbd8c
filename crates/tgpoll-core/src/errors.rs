//! Error type shared by the core and the transport adapters.

/// Core error type for the polling trigger.
///
/// Transport adapters map their failures into this type so the polling loop can
/// classify them uniformly (benign shutdown conflict vs fatal).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request failed: {message}")]
    Request {
        message: String,
        response: Option<ErrorResponse>,
    },

    #[error("request cancelled")]
    Cancelled,

    #[error("external error: {0}")]
    External(String),
}

/// The remote side of a rejected request.
///
/// `status` is kept as a raw JSON value: only a numeric status takes part in
/// conflict classification, a stringly-typed one never does.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub status: serde_json::Value,
    pub body: String,
}

impl ErrorResponse {
    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status: serde_json::Value::from(status),
            body: body.into(),
        }
    }

    /// Numeric status code, if the status is a JSON number in `u16` range.
    pub fn status_code(&self) -> Option<u16> {
        self.status.as_u64().and_then(|s| u16::try_from(s).ok())
    }
}

impl Error {
    /// Response attached to a transport rejection, if any.
    pub fn response(&self) -> Option<&ErrorResponse> {
        match self {
            Error::Request { response, .. } => response.as_ref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
