//! Session handling for the Lawer portal client: token storage, local JWT
//! expiry checks and single-flight token refresh.

mod auth_store;
mod error;
mod manager;
mod refresh;
mod token_data;

pub use auth_store::FileSessionStore;
pub use auth_store::MemorySessionStore;
pub use auth_store::SessionStore;
pub use auth_store::get_session_file;
pub use auth_store::try_read_session_json;
pub use error::AuthError;
pub use error::Result;
pub use manager::DEFAULT_INVALIDATION_DELAY;
pub use manager::SessionEvent;
pub use manager::SessionManager;
pub use refresh::DEFAULT_REFRESH_PATH;
pub use refresh::HttpTokenRefresher;
pub use refresh::RefreshEndpoint;
pub use refresh::RefreshPayload;
pub use refresh::RefreshedTokens;
pub use refresh::TokenRefresher;
pub use token_data::AccessClaims;
pub use token_data::Roles;
pub use token_data::Session;
pub use token_data::TokenDecodeError;
pub use token_data::decode_expiry;
pub use token_data::is_expired;
pub use token_data::parse_claims;
