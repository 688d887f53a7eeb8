#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("{0}")]
    Client(#[from] ws_client::ClientError),

    #[error("connection to {url} failed")]
    ConnectionFailed { url: String },

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}
