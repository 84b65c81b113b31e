use thiserror::Error;

/// Failure of a chat service call.
///
/// "Not found" answers from the history and delete endpoints are not errors;
/// those calls return `None` / `false` instead.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The service answered with a non-success status.
    #[error("{detail}")]
    Server { status: u16, detail: String },

    #[error("API is unavailable")]
    Unavailable,

    /// The request never got a usable answer: connection refused, timeout,
    /// or a body that did not decode.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;
