use serde_json::Value;
use serde_json::json;
use tracing::info;

use crate::client::Client;
use crate::config::ServiceKey;
use crate::error::ClientError;
use crate::error::Result;
use crate::request::ApiRequest;
use crate::request::AuthRequirement;
use crate::types::ChangePasswordRequest;
use crate::types::LoginRequest;
use crate::types::LoginResponse;
use crate::types::RegisterRequest;
use crate::types::ResetPasswordRequest;
use crate::types::UserProfile;

const AUTH_PREFIX: &str = "/api/social/auth";

fn auth_path(suffix: &str) -> String {
    format!("{AUTH_PREFIX}{suffix}")
}

fn anonymous_post(suffix: &str) -> ApiRequest {
    ApiRequest::post(ServiceKey::Auth, auth_path(suffix)).auth(AuthRequirement::Anonymous)
}

impl Client {
    /// Log in and store the returned token pair in the session.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let request = anonymous_post("/login").json_body(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })?;
        let response = self.dispatch(&request).await?;
        let login: LoginResponse = response.data()?;

        let Some(token) = login.token.clone().filter(|t| !t.is_empty()) else {
            return Err(ClientError::Decode {
                url: response.url.clone(),
                source: serde::de::Error::missing_field("token"),
                body: response.body.clone(),
            });
        };
        self.session()
            .store_login(token, login.refresh_token.clone())?;
        info!(user = login.email.as_deref().unwrap_or("<unknown>"), "logged in");
        Ok(login)
    }

    /// Drop the local session. The backend keeps no server-side logout.
    pub fn logout(&self) -> Result<bool> {
        Ok(self.session().logout()?)
    }

    pub async fn profile(&self) -> Result<UserProfile> {
        let request = ApiRequest::get(ServiceKey::Auth, auth_path("/profile"))
            .auth(AuthRequirement::Required);
        self.dispatch(&request).await?.data()
    }

    pub async fn register(&self, payload: &RegisterRequest) -> Result<Value> {
        let request = anonymous_post("/register").json_body(payload)?;
        self.dispatch(&request).await?.data()
    }

    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<Value> {
        let request = anonymous_post("/verify-otp").json(json!({ "email": email, "code": code }));
        self.dispatch(&request).await?.data()
    }

    pub async fn resend_otp(&self, email: &str) -> Result<Value> {
        let request = anonymous_post("/resend-otp").json(json!({ "email": email }));
        self.dispatch(&request).await?.data()
    }

    pub async fn forgot_password(&self, email: &str) -> Result<Value> {
        let request = anonymous_post("/forgot-password").json(json!({ "email": email }));
        self.dispatch(&request).await?.data()
    }

    pub async fn reset_password(&self, payload: &ResetPasswordRequest) -> Result<Value> {
        let request = anonymous_post("/reset-password").json_body(payload)?;
        self.dispatch(&request).await?.data()
    }

    pub async fn change_password(&self, payload: &ChangePasswordRequest) -> Result<Value> {
        let request = ApiRequest::post(ServiceKey::Social, auth_path("/change-password"))
            .auth(AuthRequirement::Required)
            .json_body(payload)?;
        self.dispatch(&request).await?.data()
    }
}
