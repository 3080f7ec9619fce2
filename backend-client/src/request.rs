use std::time::Duration;

use reqwest::Method;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ServiceKey;
use crate::error::ClientError;
use crate::error::Result;

/// Whether a bearer token is attached to a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthRequirement {
    /// Attach a token when logged in, otherwise send unauthenticated and let
    /// the server decide.
    #[default]
    Optional,
    /// Fail with `MissingToken` before sending when nobody is logged in.
    Required,
    /// Never attach a token and never refresh on 401/403 (login, register,
    /// OTP endpoints).
    Anonymous,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(Vec<MultipartField>),
}

/// Owned multipart field, so the form can be rebuilt when a request is
/// replayed after a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartField {
    pub name: String,
    pub value: MultipartValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartValue {
    Text(String),
    File {
        file_name: String,
        mime: Option<String>,
        bytes: Vec<u8>,
    },
}

impl MultipartField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: MultipartValue::Text(value.into()),
        }
    }

    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: Option<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            value: MultipartValue::File {
                file_name: file_name.into(),
                mime,
                bytes,
            },
        }
    }
}

/// Description of one REST call. Dispatch never mutates it, so the same
/// descriptor can be sent again after a token refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub service: ServiceKey,
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: RequestBody,
    pub auth: AuthRequirement,
    /// Overrides the client-wide request timeout.
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    pub fn new(service: ServiceKey, method: Method, path: impl Into<String>) -> Self {
        Self {
            service,
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            auth: AuthRequirement::default(),
            timeout: None,
        }
    }

    pub fn get(service: ServiceKey, path: impl Into<String>) -> Self {
        Self::new(service, Method::GET, path)
    }

    pub fn post(service: ServiceKey, path: impl Into<String>) -> Self {
        Self::new(service, Method::POST, path)
    }

    pub fn patch(service: ServiceKey, path: impl Into<String>) -> Self {
        Self::new(service, Method::PATCH, path)
    }

    pub fn delete(service: ServiceKey, path: impl Into<String>) -> Self {
        Self::new(service, Method::DELETE, path)
    }

    /// Add a query parameter. Blank values are dropped, the way the portal
    /// cleaned its params before sending.
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        let value = value.to_string();
        if !value.trim().is_empty() {
            self.query.push((key.to_string(), value));
        }
        self
    }

    pub fn query_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn json_body<T: Serialize>(self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| ClientError::InvalidRequest(format!("unserializable body: {e}")))?;
        Ok(self.json(value))
    }

    pub fn multipart(mut self, fields: Vec<MultipartField>) -> Self {
        self.body = RequestBody::Multipart(fields);
        self
    }

    pub fn auth(mut self, auth: AuthRequirement) -> Self {
        self.auth = auth;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Response with its body already read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub url: String,
    pub body: String,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        // Endpoints like DELETE return no body at all.
        let body = if self.body.trim().is_empty() {
            "null"
        } else {
            self.body.as_str()
        };
        serde_json::from_str(body).map_err(|source| ClientError::Decode {
            url: self.url.clone(),
            source,
            body: self.body.clone(),
        })
    }

    /// Decode the payload, unwrapping the `{code, message, data}` envelope
    /// used by the social and law services when it is present.
    pub fn data<T: DeserializeOwned>(&self) -> Result<T> {
        let value: Value = self.json()?;
        let payload = match value {
            Value::Object(mut map)
                if map.contains_key("data")
                    && (map.contains_key("code") || map.contains_key("message")) =>
            {
                map.remove("data").unwrap_or(Value::Null)
            }
            other => other,
        };
        serde_json::from_value(payload).map_err(|source| ClientError::Decode {
            url: self.url.clone(),
            source,
            body: self.body.clone(),
        })
    }
}
