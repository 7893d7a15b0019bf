use thiserror::Error;

/// Failure of the underlying live channel
///
/// Recovered locally through reconnect backoff; callers only ever see it as a
/// change in connection state.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection refused: {0}")]
    Refused(String),

    #[error("connection closed: {0}")]
    Closed(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Startup failure loading `ClientConfig`
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    #[error("live channel url must use ws:// or wss://, got {0}")]
    InvalidUrl(String),
}
