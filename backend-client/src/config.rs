//! Where each backend service lives and how the client talks to it.
//!
//! Settings come from `config.toml` inside the client home directory
//! (`$LAWER_HOME`, defaulting to `~/.lawer`). `LAWER_*_URL` environment
//! variables override the file.

use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use lawer_login::DEFAULT_INVALIDATION_DELAY;
use lawer_login::DEFAULT_REFRESH_PATH;
use lawer_login::RefreshPayload;
use serde::Deserialize;
use serde::Serialize;

const CONFIG_TOML_FILE: &str = "config.toml";
pub const LAWER_HOME_ENV_VAR: &str = "LAWER_HOME";

const DEFAULT_GATEWAY_URL: &str = "http://localhost:8080";
const DEFAULT_SOCIAL_URL: &str = "http://localhost:8082";
const DEFAULT_LAW_URL: &str = "http://localhost:8080";
const DEFAULT_RAG_URL: &str = "http://localhost:5001";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 12_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceKey {
    Gateway,
    Auth,
    Social,
    SocialAdmin,
    Law,
    Rag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ServiceBaseUrls {
    pub gateway: String,
    pub auth: String,
    pub social: String,
    pub social_admin: String,
    pub law: String,
    pub rag: String,
}

impl Default for ServiceBaseUrls {
    fn default() -> Self {
        Self {
            gateway: DEFAULT_GATEWAY_URL.to_string(),
            auth: DEFAULT_SOCIAL_URL.to_string(),
            social: DEFAULT_SOCIAL_URL.to_string(),
            social_admin: DEFAULT_SOCIAL_URL.to_string(),
            law: DEFAULT_LAW_URL.to_string(),
            rag: DEFAULT_RAG_URL.to_string(),
        }
    }
}

impl ServiceBaseUrls {
    /// Base URL without trailing slashes. Blank entries fall back to the
    /// gateway.
    pub fn base_url(&self, service: ServiceKey) -> &str {
        let configured = match service {
            ServiceKey::Gateway => &self.gateway,
            ServiceKey::Auth => &self.auth,
            ServiceKey::Social => &self.social,
            ServiceKey::SocialAdmin => &self.social_admin,
            ServiceKey::Law => &self.law,
            ServiceKey::Rag => &self.rag,
        };
        let trimmed = configured.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            self.gateway.trim().trim_end_matches('/')
        } else {
            trimmed
        }
    }

    /// Apply `LAWER_*_URL` overrides. `LAWER_SOCIAL_URL` also moves the auth
    /// and admin services unless those have their own variable.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("LAWER_GATEWAY_URL") {
            self.gateway = v;
        }
        if let Some(v) = get("LAWER_SOCIAL_URL") {
            self.social = v.clone();
            self.auth = v.clone();
            self.social_admin = v;
        }
        if let Some(v) = get("LAWER_AUTH_URL") {
            self.auth = v;
        }
        if let Some(v) = get("LAWER_SOCIAL_ADMIN_URL") {
            self.social_admin = v;
        }
        if let Some(v) = get("LAWER_LAW_URL") {
            self.law = v;
        }
        if let Some(v) = get("LAWER_RAG_URL") {
            self.rag = v;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RefreshConfig {
    /// Service whose base URL the refresh path is appended to. The gateway
    /// by default, which avoids the double `/social/api/social` prefix.
    pub service: ServiceKey,
    pub path: String,
    pub payload: RefreshPayload,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            service: ServiceKey::Gateway,
            path: DEFAULT_REFRESH_PATH.to_string(),
            payload: RefreshPayload::Body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ClientConfig {
    pub services: ServiceBaseUrls,
    pub refresh: RefreshConfig,
    /// Overall timeout for every request, refresh calls included.
    pub request_timeout_ms: u64,
    pub invalidation_delay_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            services: ServiceBaseUrls::default(),
            refresh: RefreshConfig::default(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            invalidation_delay_ms: DEFAULT_INVALIDATION_DELAY.as_millis() as u64,
            user_agent: None,
        }
    }
}

impl ClientConfig {
    /// Read `config.toml` from `lawer_home` (defaults when absent) and apply
    /// environment overrides.
    pub fn load(lawer_home: &Path) -> io::Result<Self> {
        let mut config = match read_config_from_path(&lawer_home.join(CONFIG_TOML_FILE))? {
            Some(config) => config,
            None => Self::default(),
        };
        config
            .services
            .apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn invalidation_delay(&self) -> Duration {
        Duration::from_millis(self.invalidation_delay_ms)
    }
}

fn read_config_from_path(path: &Path) -> io::Result<Option<ClientConfig>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<ClientConfig>(&contents) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::error!("Failed to parse {}: {err}", path.display());
                Err(io::Error::new(io::ErrorKind::InvalidData, err))
            }
        },
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("{} not found, using defaults", path.display());
            Ok(None)
        }
        Err(err) => {
            tracing::error!("Failed to read {}: {err}", path.display());
            Err(err)
        }
    }
}

/// Client home directory: `$LAWER_HOME` if set (it must exist), otherwise
/// `~/.lawer`, which is not required to exist yet.
pub fn find_lawer_home() -> io::Result<PathBuf> {
    if let Ok(val) = std::env::var(LAWER_HOME_ENV_VAR)
        && !val.is_empty()
    {
        return PathBuf::from(val).canonicalize();
    }

    let mut p = dirs::home_dir().ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "Could not find home directory")
    })?;
    p.push(".lawer");
    Ok(p)
}

#[cfg(test)]
mod tests {
    #![expect(clippy::unwrap_used)]

    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_portal_deployment() {
        let urls = ServiceBaseUrls::default();
        assert_eq!(urls.base_url(ServiceKey::Gateway), "http://localhost:8080");
        assert_eq!(urls.base_url(ServiceKey::Auth), "http://localhost:8082");
        assert_eq!(urls.base_url(ServiceKey::Rag), "http://localhost:5001");
        let config = ClientConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(12));
        assert_eq!(config.invalidation_delay(), Duration::from_millis(100));
    }

    #[test]
    fn blank_entries_fall_back_to_gateway() {
        let urls = ServiceBaseUrls {
            gateway: "http://gw/".to_string(),
            law: "  ".to_string(),
            rag: "http://rag//".to_string(),
            ..Default::default()
        };
        assert_eq!(urls.base_url(ServiceKey::Law), "http://gw");
        assert_eq!(urls.base_url(ServiceKey::Rag), "http://rag");
    }

    #[test]
    fn social_env_override_moves_auth_and_admin() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("LAWER_SOCIAL_URL", "http://social:9000"),
            ("LAWER_SOCIAL_ADMIN_URL", "http://admin:9100"),
            ("LAWER_RAG_URL", ""),
        ]);
        let mut urls = ServiceBaseUrls::default();
        urls.apply_env_overrides(|k| env.get(k).map(|v| (*v).to_string()));

        assert_eq!(urls.base_url(ServiceKey::Social), "http://social:9000");
        assert_eq!(urls.base_url(ServiceKey::Auth), "http://social:9000");
        assert_eq!(urls.base_url(ServiceKey::SocialAdmin), "http://admin:9100");
        assert_eq!(urls.base_url(ServiceKey::Rag), "http://localhost:5001");
    }

    #[test]
    fn reads_partial_config_toml() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_TOML_FILE),
            r#"
request-timeout-ms = 5000

[services]
gateway = "https://portal.example.com"

[refresh]
path = "/api/social/auth/refresh"
payload = "cookie"
"#,
        )
        .unwrap();

        let config = read_config_from_path(&dir.path().join(CONFIG_TOML_FILE))
            .unwrap()
            .unwrap();
        assert_eq!(config.request_timeout_ms, 5000);
        assert_eq!(config.services.gateway, "https://portal.example.com");
        assert_eq!(config.services.rag, DEFAULT_RAG_URL);
        assert_eq!(config.refresh.service, ServiceKey::Gateway);
        assert_eq!(config.refresh.path, "/api/social/auth/refresh");
        assert_eq!(config.refresh.payload, RefreshPayload::Cookie);
    }

    #[test]
    fn missing_config_is_not_an_error() {
        let dir = tempdir().unwrap();
        assert_eq!(
            read_config_from_path(&dir.path().join(CONFIG_TOML_FILE)).unwrap(),
            None
        );
    }

    #[test]
    fn invalid_config_is_invalid_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_TOML_FILE);
        std::fs::write(&path, "request-timeout-ms = \"soon\"").unwrap();
        let err = read_config_from_path(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
