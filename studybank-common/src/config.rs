//! Environment-driven service configuration

use crate::{Error, Result};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Service settings, read once at startup
///
/// Every field comes from an environment variable with a development-friendly
/// default, so the service starts with zero configuration and production
/// deployments override via the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    /// SQLite database file (`STUDYBANK_DB_PATH`)
    pub db_path: PathBuf,
    /// Combined with study codes to build the URLs handed to participants.
    /// Usually the hostname of the front-end plus any path prefix
    /// (`STUDYBANK_URL_PREFIX`).
    pub study_url_prefix: String,
    /// Password researchers use to interact with this server; it is not a
    /// database credential (`STUDYBANK_ADMIN_PASSWORD`)
    pub admin_password: String,
    /// Allowed CORS origin, normally the front-end hostname
    /// (`STUDYBANK_CORS_ORIGIN`)
    pub cors_origin: String,
    /// Optional second origin for development, e.g. a localhost front-end.
    /// Setting either origin to `*` allows all origins
    /// (`STUDYBANK_CORS_EXTRA_ORIGIN`)
    pub cors_extra_origin: Option<String>,
    /// Listen address (`STUDYBANK_BIND_ADDR`)
    pub bind_addr: SocketAddr,
}

impl Settings {
    /// Load settings from the environment, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let bind_addr = env_or("STUDYBANK_BIND_ADDR", "0.0.0.0:5750");
        let bind_addr: SocketAddr = bind_addr
            .parse()
            .map_err(|_| Error::Config(format!("Invalid STUDYBANK_BIND_ADDR: {}", bind_addr)))?;

        let study_url_prefix = env_or("STUDYBANK_URL_PREFIX", "https://studies.example.org");
        let cors_origin = std::env::var("STUDYBANK_CORS_ORIGIN")
            .unwrap_or_else(|_| study_url_prefix.clone());

        Ok(Settings {
            db_path: PathBuf::from(env_or("STUDYBANK_DB_PATH", "./studybank.db")),
            study_url_prefix,
            admin_password: env_or("STUDYBANK_ADMIN_PASSWORD", "password"),
            cors_origin,
            cors_extra_origin: std::env::var("STUDYBANK_CORS_EXTRA_ORIGIN").ok(),
            bind_addr,
        })
    }

    /// All origins the front-end may call from
    pub fn allowed_origins(&self) -> Vec<&str> {
        let mut origins = vec![self.cors_origin.as_str()];
        if let Some(extra) = &self.cors_extra_origin {
            origins.push(extra.as_str());
        }
        origins
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "STUDYBANK_DB_PATH",
            "STUDYBANK_URL_PREFIX",
            "STUDYBANK_ADMIN_PASSWORD",
            "STUDYBANK_CORS_ORIGIN",
            "STUDYBANK_CORS_EXTRA_ORIGIN",
            "STUDYBANK_BIND_ADDR",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn defaults_apply_without_environment() {
        clear_env();
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.db_path, PathBuf::from("./studybank.db"));
        assert_eq!(settings.admin_password, "password");
        assert_eq!(settings.cors_origin, settings.study_url_prefix);
        assert_eq!(settings.bind_addr.port(), 5750);
        assert!(settings.cors_extra_origin.is_none());
    }

    #[test]
    #[serial]
    fn environment_overrides_and_extra_origin() {
        clear_env();
        std::env::set_var("STUDYBANK_URL_PREFIX", "https://studies.test");
        std::env::set_var("STUDYBANK_CORS_EXTRA_ORIGIN", "http://localhost:5173");
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.study_url_prefix, "https://studies.test");
        // CORS origin follows the URL prefix unless set explicitly
        assert_eq!(settings.cors_origin, "https://studies.test");
        assert_eq!(
            settings.allowed_origins(),
            vec!["https://studies.test", "http://localhost:5173"]
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn invalid_bind_addr_is_a_config_error() {
        clear_env();
        std::env::set_var("STUDYBANK_BIND_ADDR", "not-an-address");
        let err = Settings::from_env().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        clear_env();
    }
}
