use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoryError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Cannot reach Ollama at {endpoint}: {message}")]
    Unreachable { endpoint: String, message: String },

    #[error("Ollama returned error {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Model output is not a valid story: {0}")]
    InvalidStory(String),
}

pub type Result<T> = std::result::Result<T, StoryError>;
