use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Invalid search query: {0}")]
    InvalidQuery(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Response body was empty")]
    EmptyBody,

    #[error("Could not parse response as JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Photo service returned an error: {0}")]
    Api(String),

    #[error("Response is missing key '{0}'")]
    MissingKey(&'static str),

    #[error("No photos found")]
    NoPhotos,
}

/// Coarse failure class a caller can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Parse,
    Api,
    EmptyResult,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl SourceError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: u16, body: &[u8]) -> Self {
        SourceError::Status {
            status,
            body: Self::truncate_body(&String::from_utf8_lossy(body)),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SourceError::Network(_) | SourceError::Transport(_) | SourceError::Status { .. } => {
                ErrorKind::Transport
            }
            SourceError::InvalidQuery(_)
            | SourceError::EmptyBody
            | SourceError::Parse(_)
            | SourceError::MissingKey(_) => ErrorKind::Parse,
            SourceError::Api(_) => ErrorKind::Api,
            SourceError::NoPhotos => ErrorKind::EmptyResult,
        }
    }
}
