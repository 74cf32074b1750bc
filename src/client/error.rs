pub const RETRY_MESSAGE: &str = "Something went wrong while generating. Please try again.";
pub const LOGIN_MESSAGE: &str = "You've reached the guest limit. Log in to continue.";

/// Everything that can end an exchange on the consumer side.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("request rejected: {0}")]
    Validation(String),

    #[error("guest quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("provider overloaded")]
    Overloaded,

    #[error("provider error: {0}")]
    Upstream(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("stream interrupted: {0}")]
    Stream(String),

    /// An in-band `{"type":"error"}` record.
    #[error("{0}")]
    Terminal(String),
}

impl ClientError {
    /// Message shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation(detail) => format!("Invalid request: {detail}"),
            ClientError::QuotaExceeded(_) => LOGIN_MESSAGE.to_string(),
            ClientError::Unauthorized => "Your session has expired. Log in again.".to_string(),
            ClientError::Terminal(value) => value.clone(),
            ClientError::Overloaded | ClientError::Upstream(_) | ClientError::Stream(_) => {
                RETRY_MESSAGE.to_string()
            }
        }
    }
}
