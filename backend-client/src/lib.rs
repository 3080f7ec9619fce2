//! Authenticated HTTP client for the Lawer portal services.
//!
//! [`Client::dispatch`] attaches the session's bearer token, refreshes it
//! through the shared [`lawer_login::SessionManager`] when it has expired or
//! the server rejects it, and replays the request once. The `api` module
//! layers typed calls for each service on top.

mod api;
mod client;
pub mod config;
mod error;
mod request;
pub mod types;

pub use api::AdminPage;
pub use api::LawAdmin;
pub use api::social_admin_prefix;
pub use client::Client;
pub use config::ClientConfig;
pub use config::LAWER_HOME_ENV_VAR;
pub use config::RefreshConfig;
pub use config::ServiceBaseUrls;
pub use config::ServiceKey;
pub use config::find_lawer_home;
pub use error::ClientError;
pub use error::Result;
pub use request::ApiRequest;
pub use request::ApiResponse;
pub use request::AuthRequirement;
pub use request::MultipartField;
pub use request::MultipartValue;
pub use request::RequestBody;
