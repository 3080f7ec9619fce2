use lawer_login::AuthError;
use reqwest::Method;
use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Authentication could not be established or recovered. The session has
    /// already been cleared when this is unauthenticated.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Non-2xx answer from a backend service, passed through unchanged.
    #[error("{method} {url} failed: {status}; body={body}")]
    Upstream {
        method: Method,
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("decode error for {url}: {source}; body={body}")]
    Decode {
        url: String,
        source: serde_json::Error,
        body: String,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            Self::Transport(err) => err.status(),
            _ => None,
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        match self {
            Self::Auth(err) => err.is_unauthenticated() || *err == AuthError::MissingToken,
            Self::Upstream { status, .. } => {
                *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
            }
            _ => false,
        }
    }
}
