use thiserror::Error;

/// Errors that can occur while reading or writing records.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Airtable returned error {status}: {body}")]
    Airtable { status: u16, body: String },

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Invalid store configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        StoreError::Other(format!("{:#}", err))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
