use thiserror::Error;

use crate::transaction::error::TransactionError;

/// Crate-wide error type.
///
/// Every fallible operation that crosses a module boundary resolves
/// into one of these variants. RPC handlers never let a `DbError`
/// escape across the wire; it is logged and turned into the
/// contractual bool/string response instead (SPEC_FULL §7).
#[derive(Error, Debug)]
pub enum DbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("RPC call to {endpoint} timed out after {elapsed_ms}ms")]
    Timeout { endpoint: String, elapsed_ms: u64 },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error("account '{0}' is not known to this coordinator")]
    UnknownAccount(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl From<bincode::error::EncodeError> for DbError {
    fn from(e: bincode::error::EncodeError) -> Self {
        DbError::Serialization(e.to_string())
    }
}

impl From<bincode::error::DecodeError> for DbError {
    fn from(e: bincode::error::DecodeError) -> Self {
        DbError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for DbError {
    fn from(e: toml::de::Error) -> Self {
        DbError::Configuration(e.to_string())
    }
}
