//! Error type shared by the store, identity and import layers

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReceiptError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("receipt '{0}' not found")]
    NotFound(String),

    #[error("unknown receipt field '{0}'")]
    InvalidField(String),

    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),

    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("an account already exists for '{0}'")]
    EmailInUse(String),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("session is not valid or has been signed out")]
    InvalidSession,

    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

pub type Result<T> = std::result::Result<T, ReceiptError>;
