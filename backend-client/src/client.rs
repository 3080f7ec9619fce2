use std::sync::Arc;

use lawer_login::AuthError;
use lawer_login::HttpTokenRefresher;
use lawer_login::RefreshEndpoint;
use lawer_login::SessionManager;
use lawer_login::SessionStore;
use reqwest::StatusCode;
use reqwest::header::HeaderValue;
use reqwest::header::USER_AGENT;
use reqwest::multipart::Form;
use reqwest::multipart::Part;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::config::ClientConfig;
use crate::config::ServiceBaseUrls;
use crate::error::ClientError;
use crate::error::Result;
use crate::request::ApiRequest;
use crate::request::ApiResponse;
use crate::request::AuthRequirement;
use crate::request::MultipartField;
use crate::request::MultipartValue;
use crate::request::RequestBody;

const DEFAULT_USER_AGENT: &str = "lawer-cli";

/// A request is replayed at most once after a 401/403.
const MAX_AUTH_RETRIES: u8 = 1;

/// One send of an [`ApiRequest`]: which token it carried and how many times
/// it has already been retried after an auth rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Attempt {
    number: u8,
    token: Option<String>,
}

impl Attempt {
    fn first(token: Option<String>) -> Self {
        Self { number: 0, token }
    }

    fn retry(&self, token: String) -> Self {
        Self {
            number: self.number + 1,
            token: Some(token),
        }
    }
}

enum Outcome {
    Done(ApiResponse),
    /// 401 or 403.
    Rejected(ApiResponse),
}

/// HTTP client for the portal services. Attaches the session's bearer token
/// to every request, refreshes it when expired or rejected, and replays the
/// rejected request once.
#[derive(Clone, Debug)]
pub struct Client {
    http: reqwest::Client,
    services: ServiceBaseUrls,
    session: Arc<SessionManager>,
    user_agent: HeaderValue,
}

impl Client {
    pub fn new(config: &ClientConfig, store: Arc<dyn SessionStore>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .cookie_store(true)
            .build()?;
        let endpoint = RefreshEndpoint::new(
            config.services.base_url(config.refresh.service),
            &config.refresh.path,
            config.refresh.payload,
        );
        let refresher = HttpTokenRefresher::new(http.clone(), endpoint);
        let session = SessionManager::new(store, Arc::new(refresher))
            .with_invalidation_delay(config.invalidation_delay());
        let client = Self::with_session(http, config.services.clone(), Arc::new(session));
        Ok(match &config.user_agent {
            Some(ua) => client.with_user_agent(ua),
            None => client,
        })
    }

    /// Build around an existing session manager, e.g. one shared with other
    /// clients in the same process.
    pub fn with_session(
        http: reqwest::Client,
        services: ServiceBaseUrls,
        session: Arc<SessionManager>,
    ) -> Self {
        Self {
            http,
            services,
            session,
            user_agent: HeaderValue::from_static(DEFAULT_USER_AGENT),
        }
    }

    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        if let Ok(hv) = HeaderValue::from_str(&ua.into()) {
            self.user_agent = hv;
        }
        self
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn services(&self) -> &ServiceBaseUrls {
        &self.services
    }

    pub fn url_for(&self, request: &ApiRequest) -> String {
        let base = self.services.base_url(request.service);
        let path = request.path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// Send `request` with a valid bearer token.
    ///
    /// The token is read from the session; an expired one is refreshed first
    /// (or the call waits for the refresh already running). A 401/403 answer
    /// triggers one refresh-and-replay; a second rejection is returned as
    /// [`ClientError::Upstream`]. Other failures are passed through untouched.
    pub async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let token = match request.auth {
            AuthRequirement::Anonymous => None,
            AuthRequirement::Optional => self.session.valid_token().await?,
            AuthRequirement::Required => Some(
                self.session
                    .valid_token()
                    .await?
                    .ok_or(AuthError::MissingToken)?,
            ),
        };

        let attempt = Attempt::first(token);
        match self.send(request, &attempt).await? {
            Outcome::Done(response) => Ok(response),
            Outcome::Rejected(response) => self.on_auth_rejected(request, attempt, response).await,
        }
    }

    async fn on_auth_rejected(
        &self,
        request: &ApiRequest,
        attempt: Attempt,
        response: ApiResponse,
    ) -> Result<ApiResponse> {
        if request.auth == AuthRequirement::Anonymous || attempt.number >= MAX_AUTH_RETRIES {
            return Err(upstream(request, response));
        }

        debug!(
            status = %response.status,
            url = %response.url,
            "request rejected; refreshing token before retry"
        );
        let token = self
            .session
            .refresh_after_rejection(attempt.token.as_deref())
            .await?;

        match self.send(request, &attempt.retry(token)).await? {
            Outcome::Done(response) => Ok(response),
            Outcome::Rejected(response) => {
                warn!(
                    status = %response.status,
                    url = %response.url,
                    "request rejected again after token refresh"
                );
                Err(upstream(request, response))
            }
        }
    }

    async fn send(&self, request: &ApiRequest, attempt: &Attempt) -> Result<Outcome> {
        let url = self.url_for(request);
        let mut req = self
            .http
            .request(request.method.clone(), &url)
            .headers(request.headers.clone())
            .header(USER_AGENT, self.user_agent.clone());
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }
        if let Some(token) = &attempt.token {
            req = req.bearer_auth(token);
        }
        req = match &request.body {
            RequestBody::Empty => req,
            RequestBody::Json(body) => req.json(body),
            RequestBody::Multipart(fields) => req.multipart(build_form(fields)?),
        };

        trace!(
            method = %request.method,
            url,
            attempt = attempt.number,
            authenticated = attempt.token.is_some(),
            "sending request"
        );
        let res = req.send().await?;
        let status = res.status();
        let body = res.text().await?;
        trace!(%status, url, "response received");

        let response = ApiResponse { status, url, body };
        if status.is_success() {
            Ok(Outcome::Done(response))
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Ok(Outcome::Rejected(response))
        } else {
            Err(upstream(request, response))
        }
    }
}

fn upstream(request: &ApiRequest, response: ApiResponse) -> ClientError {
    ClientError::Upstream {
        method: request.method.clone(),
        url: response.url,
        status: response.status,
        body: response.body,
    }
}

fn build_form(fields: &[MultipartField]) -> Result<Form> {
    let mut form = Form::new();
    for field in fields {
        let part = match &field.value {
            MultipartValue::Text(text) => Part::text(text.clone()),
            MultipartValue::File {
                file_name,
                mime,
                bytes,
            } => {
                let part = Part::bytes(bytes.clone()).file_name(file_name.clone());
                match mime {
                    Some(mime) => part.mime_str(mime).map_err(|e| {
                        ClientError::InvalidRequest(format!("invalid mime type {mime}: {e}"))
                    })?,
                    None => part,
                }
            }
        };
        form = form.part(field.name.clone(), part);
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn retry_keeps_attempt_count_outside_the_request() {
        let first = Attempt::first(Some("T1".to_string()));
        let second = first.retry("T2".to_string());
        assert_eq!(first.number, 0);
        assert_eq!(
            second,
            Attempt {
                number: 1,
                token: Some("T2".to_string()),
            }
        );
        assert!(second.number >= MAX_AUTH_RETRIES);
    }

    #[test]
    fn invalid_mime_is_rejected_before_sending() {
        let fields = vec![MultipartField::file(
            "files",
            "a.png",
            Some("not a mime".to_string()),
            vec![1, 2, 3],
        )];
        assert!(matches!(
            build_form(&fields),
            Err(ClientError::InvalidRequest(_))
        ));
    }
}
