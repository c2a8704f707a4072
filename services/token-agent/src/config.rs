//! Agent configuration
//!
//! Two TOML tables: `[oauth]` (endpoints, client identity — validated and
//! secret-resolved by `oauth-client`) and `[store]` (name, credential
//! directory, timer intervals, optional seed refresh token for first run).

use std::path::{Path, PathBuf};

use oauth_client::OAuthConfig;
use serde::Deserialize;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct AgentConfig {
    pub oauth: OAuthConfig,
    pub store: StoreSection,
}

/// Store settings
#[derive(Debug, Deserialize)]
pub struct StoreSection {
    pub name: String,
    /// Directory for persisted credential records (one JSON file per store)
    pub credentials_dir: PathBuf,
    /// Refresh token used when no persisted record exists yet
    #[serde(default)]
    pub seed_refresh_token: Option<String>,
    #[serde(default = "default_validate_interval")]
    pub validate_interval_secs: u64,
    #[serde(default = "default_refresh_margin")]
    pub refresh_margin_secs: u64,
}

fn default_validate_interval() -> u64 {
    3600
}

fn default_refresh_margin() -> u64 {
    600
}

impl AgentConfig {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let AgentConfig { oauth, store } = toml::from_str(&contents)?;
        let oauth = oauth.resolve()?;
        if store.name.is_empty() {
            return Err(common::Error::Config("store.name must not be empty".into()));
        }
        Ok(AgentConfig { oauth, store })
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("token-agent.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [oauth]
        token_url = "https://auth.example.com/oauth2/token"
        validate_url = "https://auth.example.com/oauth2/validate"
        revoke_url = "https://auth.example.com/oauth2/revoke"
        client_id = "client-1"

        [store]
        name = "primary"
        credentials_dir = "/var/lib/token-agent"
        seed_refresh_token = "rt_seed"
    "#;

    #[test]
    fn loads_sample_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token-agent.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = AgentConfig::load(&path).unwrap();
        assert_eq!(config.store.name, "primary");
        assert_eq!(config.store.seed_refresh_token.as_deref(), Some("rt_seed"));
        assert_eq!(config.store.validate_interval_secs, 3600);
        assert_eq!(config.store.refresh_margin_secs, 600);
        assert_eq!(config.oauth.client_id, "client-1");
    }

    #[test]
    fn rejects_empty_store_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token-agent.toml");
        std::fs::write(&path, SAMPLE.replace("\"primary\"", "\"\"")).unwrap();

        let err = AgentConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("store.name"), "got: {err}");
    }

    #[test]
    fn resolve_path_prefers_cli() {
        let path = AgentConfig::resolve_path(Some("/etc/agent.toml"));
        assert_eq!(path, PathBuf::from("/etc/agent.toml"));
    }
}
