//! Typed wrappers over [`Client::dispatch`](crate::Client::dispatch), one
//! module per backend service.

mod admin;
mod auth;
mod law;
mod rag;
mod social;

pub use admin::AdminPage;
pub use admin::LawAdmin;
pub use admin::social_admin_prefix;
