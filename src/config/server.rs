use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

pub const JWT_SECRET_ENV: &str = "STOWAGE_JWT_SECRET";
const JWT_SECRET_FILE: &str = ".jwt_secret";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Signing secret for session tokens. Falls back to the environment and
    /// then to the secret file written by `admin init`.
    pub jwt_secret: Option<String>,
    pub token_ttl_secs: u64,
    pub blob_timeout_secs: u64,
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Loads the config from an optional TOML file over the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("cannot parse {}: {e}", path.display())))
    }

    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("stowage.db")
    }

    #[must_use]
    pub fn jwt_secret_path(&self) -> PathBuf {
        self.data_dir.join(JWT_SECRET_FILE)
    }

    #[must_use]
    pub fn blob_timeout(&self) -> Duration {
        Duration::from_secs(self.blob_timeout_secs)
    }

    /// Resolves the signing secret: config, then environment, then file.
    pub fn resolve_jwt_secret(&self) -> Result<String> {
        if let Some(secret) = self.jwt_secret.as_deref().filter(|s| !s.is_empty()) {
            return Ok(secret.to_string());
        }

        if let Ok(secret) = std::env::var(JWT_SECRET_ENV) {
            if !secret.is_empty() {
                return Ok(secret);
            }
        }

        let path = self.jwt_secret_path();
        match std::fs::read_to_string(&path) {
            Ok(secret) if !secret.trim().is_empty() => Ok(secret.trim().to_string()),
            Ok(_) => Err(Error::Config(format!("{} is empty", path.display()))),
            Err(e) => Err(Error::Config(format!(
                "no JWT secret configured and {} is unreadable: {e}",
                path.display()
            ))),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            jwt_secret: None,
            token_ttl_secs: 24 * 60 * 60,
            blob_timeout_secs: 30,
            max_upload_bytes: 50 << 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.token_ttl_secs, 86_400);
        assert_eq!(config.max_upload_bytes, 52_428_800);
        assert_eq!(config.db_path(), PathBuf::from("./data/stowage.db"));
    }

    #[test]
    fn test_load_partial_toml_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("stowage.toml");
        std::fs::write(&path, "port = 9090\nblob_timeout_secs = 5\n").unwrap();

        let config = ServerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.blob_timeout(), Duration::from_secs(5));
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn test_load_rejects_unknown_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("stowage.toml");
        std::fs::write(&path, "prot = 9090\n").unwrap();

        assert!(matches!(
            ServerConfig::load(Some(&path)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_configured_secret_wins_over_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".jwt_secret"), "from-file-secret-value\n").unwrap();

        let mut config = ServerConfig {
            data_dir: temp.path().to_path_buf(),
            ..ServerConfig::default()
        };
        config.jwt_secret = Some("from-config-secret".to_string());
        assert_eq!(config.resolve_jwt_secret().unwrap(), "from-config-secret");
    }
}
