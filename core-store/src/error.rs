use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record not found: {collection} with id {id}")]
    NotFound { collection: String, id: String },

    #[error("Invalid record for {collection}: {message}")]
    InvalidRecord { collection: String, message: String },

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Unknown store backend: {0}")]
    UnknownBackend(String),

    #[error("Store initialization failed: {0}")]
    Init(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
