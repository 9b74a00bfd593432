use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArborError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Could not resolve reference: {0}")]
    ResolutionFailed(String),

    #[error("Failed to load {what}: {reason}")]
    ContentLoadFailed { what: String, reason: String },

    #[error("API error: {0}")]
    Api(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ArborError {
    pub fn content(what: impl Into<String>, reason: impl ToString) -> Self {
        ArborError::ContentLoadFailed {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ArborError>;
