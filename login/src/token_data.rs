use base64::Engine;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Token pair persisted between runs.
///
/// Field names match the keys the web portal used for its local storage so a
/// session exported from one client can be read by the other.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// This is a JWT.
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_refresh: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            last_refresh: None,
        }
    }

    /// Expiry of the access token, decoded locally.
    pub fn expires_at(&self) -> Result<DateTime<Utc>, TokenDecodeError> {
        decode_expiry(&self.access_token)
    }
}

/// Flat subset of the claims the social service puts in its access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Option<Roles>,
    #[serde(default)]
    pub exp: Option<i64>,
}

/// The backend has shipped roles both as a comma separated string and as a
/// JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Roles {
    List(Vec<String>),
    Joined(String),
}

impl Roles {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::List(roles) => roles.clone(),
            Self::Joined(joined) => joined
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenDecodeError {
    #[error("invalid JWT format")]
    InvalidFormat,
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("token has no exp claim")]
    MissingExpiry,
    #[error("exp claim out of range: {0}")]
    ExpiryOutOfRange(i64),
}

pub fn parse_claims(token: &str) -> Result<AccessClaims, TokenDecodeError> {
    let payload = decode_jwt_payload(token)?;
    Ok(serde_json::from_slice(&payload)?)
}

pub fn decode_expiry(token: &str) -> Result<DateTime<Utc>, TokenDecodeError> {
    let exp = parse_claims(token)?
        .exp
        .ok_or(TokenDecodeError::MissingExpiry)?;
    DateTime::<Utc>::from_timestamp(exp, 0).ok_or(TokenDecodeError::ExpiryOutOfRange(exp))
}

/// Pure function of `token` and `now`. Anything that cannot be decoded counts
/// as expired so a bad token is refreshed instead of trusted.
pub fn is_expired(token: &str, now: DateTime<Utc>) -> bool {
    match decode_expiry(token) {
        Ok(expires_at) => expires_at.timestamp() < now.timestamp(),
        Err(err) => {
            tracing::debug!("treating undecodable access token as expired: {err}");
            true
        }
    }
}

fn decode_jwt_payload(token: &str) -> Result<Vec<u8>, TokenDecodeError> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload_b64), Some(_sig), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenDecodeError::InvalidFormat);
    };
    // Some issuers pad their segments even though JWS says not to.
    let payload_b64 = payload_b64.trim_end_matches('=');
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(payload_b64)?)
}
