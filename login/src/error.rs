use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

/// Authentication failures. `Clone` because one refresh outcome is handed to
/// every request that waited on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No access token is stored and the endpoint requires one.
    #[error("not logged in: no access token available")]
    MissingToken,

    /// A refresh was needed but no refresh token is stored.
    #[error("unauthenticated: no refresh token available")]
    RefreshUnavailable,

    /// The refresh endpoint failed or returned no usable token.
    #[error("unauthenticated: token refresh failed: {message}")]
    RefreshFailed { message: String },

    #[error("session storage error: {message}")]
    Storage { message: String },
}

impl AuthError {
    pub fn refresh_failed(message: impl Into<String>) -> Self {
        Self::RefreshFailed {
            message: message.into(),
        }
    }

    /// True for failures that end the session and require a new login.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::RefreshUnavailable | Self::RefreshFailed { .. })
    }
}

impl From<std::io::Error> for AuthError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }
}
