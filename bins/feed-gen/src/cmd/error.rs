use frame_codec::arrow::error::ArrowError;

#[derive(Debug, thiserror::Error)]
pub enum FeedGenError {
    #[error("{0}")]
    Config(String),

    #[error("bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serve: {0}")]
    Serve(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("arrow: {0}")]
    Arrow(#[from] ArrowError),
}
