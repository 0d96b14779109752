use reqwest::StatusCode;
use thiserror::Error;

/// Required configuration that is missing, detected before any request is sent
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "No URL configured. Please provide one, i.e.: \"http://localhost:1234/v1/chat/completions\""
    )]
    MissingUrl,

    #[error("No model configured. Please provide one, i.e.: \"path/to_model.gguf\"")]
    MissingModel,
}

/// Errors that abort a request to the LM Studio server once it was configured
#[derive(Debug, Error)]
pub enum LmStudioError {
    #[error("Error: {} - {message}", status.as_u16())]
    Transport { status: StatusCode, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl LmStudioError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Transport { status, .. } => Some(*status),
            Self::Http(e) => e.status(),
        }
    }
}

/// A single frame that could not be parsed. Never aborts a decode.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("failed to parse frame `{segment}`: {message}")]
pub struct FrameParseError {
    /// the trimmed segment text
    pub segment: String,
    pub message: String,
}
