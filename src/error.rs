use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not started")]
    NotStarted,

    #[error("session cannot be started after headers have already been sent")]
    HeadersSent,

    #[error("failed to start session: {0}")]
    Start(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A read without a default hit a key that is not in the session.
    #[error("key `{0}` does not exist in the session")]
    OutOfBounds(String),
}
