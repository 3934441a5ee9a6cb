use thiserror::Error;

/// Failure surface of [`crate::ApiClient`].
///
/// Authorization failures are split in two: `SessionExpired` means the
/// refresh token is gone or was rejected (the session has already been
/// cleared), while `Unauthorized` means a request still came back 401
/// after the single refresh-and-retry.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("session expired, log in again")]
    SessionExpired,

    #[error("unauthorized")]
    Unauthorized,

    /// Non-401 HTTP failure, carrying the backend's own message when one
    /// could be extracted from the body.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response payload: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV export reported a logical failure inside a 2xx body.
    #[error("{0}")]
    Export(String),

    #[error("{0}")]
    Config(String),
}

impl ApiError {
    pub(crate) fn network(err: reqwest::Error) -> Self {
        ApiError::Network(crate::redact::redact_bearer(&err.to_string()).into_owned())
    }
}
