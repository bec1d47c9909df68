use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("grant duration must be greater than zero")]
    EmptyDuration,

    #[error("storage error: {0}")]
    Other(String),
}
