use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("remote error: {0}")]
    Remote(#[from] perch_core::RemoteError),

    #[error("search sink error: {0}")]
    Sink(String),
}
