use thiserror::Error;

#[derive(Debug, Error)]
pub enum MinefleetError {
    #[error("invalid secret: {0}")]
    InvalidSecret(String),

    #[error("wallet {0} is not registered")]
    NotRegistered(String),

    #[error("remote service rejected the request: {0}")]
    Remote(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, MinefleetError>;
