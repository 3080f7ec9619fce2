use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::error::AuthError;
use crate::error::Result;

pub const DEFAULT_REFRESH_PATH: &str = "/api/social/auth/refresh-token";

/// How the refresh token reaches the auth service.
///
/// Deployments disagree: some expect `{"refreshToken": ...}` in the body,
/// others read an HTTP-only cookie and take an empty body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshPayload {
    #[default]
    Body,
    Cookie,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshEndpoint {
    pub url: String,
    pub payload: RefreshPayload,
}

impl RefreshEndpoint {
    pub fn new(base_url: &str, path: &str, payload: RefreshPayload) -> Self {
        let base = base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Self {
            url: format!("{base}/{path}"),
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedTokens {
    pub access_token: String,
    /// Present only when the auth service rotated the refresh token.
    pub refresh_token: Option<String>,
}

/// Transport used by [`crate::SessionManager`] to obtain a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: Option<&str>) -> Result<RefreshedTokens>;
}

#[derive(Debug, Clone)]
pub struct HttpTokenRefresher {
    http: reqwest::Client,
    endpoint: RefreshEndpoint,
}

impl HttpTokenRefresher {
    pub fn new(http: reqwest::Client, endpoint: RefreshEndpoint) -> Self {
        Self { http, endpoint }
    }

    pub fn endpoint(&self) -> &RefreshEndpoint {
        &self.endpoint
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequestBody<'a> {
    refresh_token: &'a str,
}

/// Accepts both the bare `{accessToken, refreshToken}` shape and the
/// `{code, message, data: {...}}` envelope the social service wraps it in.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponseBody {
    #[serde(default, alias = "token")]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    data: Option<Box<RefreshResponseBody>>,
}

impl RefreshResponseBody {
    fn into_tokens(self) -> Option<RefreshedTokens> {
        match self.access_token.filter(|t| !t.is_empty()) {
            Some(access_token) => Some(RefreshedTokens {
                access_token,
                refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
            }),
            None => self.data.and_then(|inner| inner.into_tokens()),
        }
    }
}

pub(crate) fn parse_refresh_response(body: &str) -> Result<RefreshedTokens> {
    let parsed: RefreshResponseBody = serde_json::from_str(body)
        .map_err(|e| AuthError::refresh_failed(format!("invalid refresh response: {e}")))?;
    parsed
        .into_tokens()
        .ok_or_else(|| AuthError::refresh_failed("refresh response did not contain an access token"))
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: Option<&str>) -> Result<RefreshedTokens> {
        let url = &self.endpoint.url;
        let req = self.http.post(url);
        let req = match self.endpoint.payload {
            RefreshPayload::Body => {
                let refresh_token = refresh_token.ok_or(AuthError::RefreshUnavailable)?;
                req.json(&RefreshRequestBody { refresh_token })
            }
            RefreshPayload::Cookie => req.header(CONTENT_TYPE, "application/json"),
        };

        debug!(url, "refreshing access token");
        let res = req.send().await.map_err(|e| {
            warn!(url, "refresh request failed: {e}");
            AuthError::refresh_failed(format!("POST {url} failed: {e}"))
        })?;
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        if !status.is_success() {
            warn!(url, %status, "refresh endpoint rejected the request");
            return Err(AuthError::refresh_failed(format!(
                "POST {url} failed: {status}"
            )));
        }
        parse_refresh_response(&body)
    }
}
