use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Entry not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
