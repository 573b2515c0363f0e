use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The request never produced a response (connection, DNS, TLS, timeout).
    #[error("Transport error: {0}")]
    Transport(anyhow::Error),

    /// The response body was not the JSON shape we expected.
    #[error("Invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// A well-formed response carrying an `error` field.
    #[error("Service error: {0}")]
    Service(String),

    /// Non-success status with a body that says nothing useful.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Session has no conversation yet")]
    NotConnected,
}

impl Error {
    pub fn transport(err: impl Into<anyhow::Error>) -> Self {
        Self::Transport(err.into())
    }
}
