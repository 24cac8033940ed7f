use thiserror::Error;

pub type Result<T, E = ArtworkError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ArtworkError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
