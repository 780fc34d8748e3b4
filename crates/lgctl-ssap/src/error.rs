//! Error types for the lgctl-ssap crate.

/// Unified error type for control-link operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The socket could not be established (host unreachable, refused,
    /// bad address). Recoverable by retrying after a delay; a TV that was
    /// just woken up typically needs a moment before its socket server
    /// accepts connections.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Connected, but pairing did not complete: the stored key was stale,
    /// the on-screen prompt was rejected or timed out, or the TV answered
    /// the registration with garbage.
    #[error("pairing failed: {0}")]
    Pairing(String),

    /// The TV answered with an error frame, or a response with
    /// `returnValue: false`.
    #[error("TV error: {0}")]
    Tv(String),

    /// The link closed while the request was outstanding.
    #[error("connection closed")]
    Closed,

    /// No matching frame arrived within the request timeout.
    #[error("request timeout")]
    Timeout,

    /// WebSocket failure not covered by [`Error::Connect`].
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Key-store read/write failure. Never silently swallowed: a failed
    /// save must not look like a successful pairing.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A matched frame arrived but its payload was missing the fields the
    /// command requires.
    #[error("unexpected response")]
    UnexpectedResponse,
}

pub type Result<T> = std::result::Result<T, Error>;
