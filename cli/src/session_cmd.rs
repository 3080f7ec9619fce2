use anyhow::Result;
use anyhow::bail;
use chrono::Utc;
use lawer_backend_client::Client;
use lawer_login::is_expired;
use lawer_login::parse_claims;
use serde_json::json;

use crate::print_json;

#[derive(Debug, clap::Parser)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: String,

    /// Prefer `LAWER_PASSWORD` over the flag to keep it out of shell history.
    #[arg(long, env = "LAWER_PASSWORD", hide_env_values = true)]
    pub password: String,
}

pub(crate) async fn run_login(client: &Client, args: LoginArgs) -> Result<()> {
    let LoginArgs { email, password } = args;
    let login = client.login(&email, &password).await?;
    print_json(&json!({
        "loggedIn": true,
        "id": login.id,
        "email": login.email,
        "displayName": login.display_name,
    }))
}

pub(crate) fn run_logout(client: &Client) -> Result<()> {
    let removed = client.logout()?;
    print_json(&json!({ "loggedOut": removed }))
}

/// Decodes the stored token locally; nothing is sent to the server.
pub(crate) fn run_whoami(client: &Client) -> Result<()> {
    let Some(session) = client.session().session()? else {
        bail!("not logged in; run `lawer login`");
    };
    let claims = parse_claims(&session.access_token).unwrap_or_default();
    let expires_at = session.expires_at().ok();
    let expired = is_expired(&session.access_token, Utc::now());
    print_json(&json!({
        "sub": claims.sub,
        "email": claims.email,
        "roles": claims.roles.map(|r| r.to_vec()).unwrap_or_default(),
        "expiresAt": expires_at,
        "expired": expired,
        "hasRefreshToken": session.refresh_token.is_some(),
        "lastRefresh": session.last_refresh,
    }))
}
