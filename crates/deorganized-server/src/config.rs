use std::path::PathBuf;

use anyhow::Context;
use chrono::Duration;

use deorganized_api::AuthConfig;

const PLACEHOLDER_SECRETS: &[&str] = &["", "dev-secret-change-me", "changeme", "secret"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub auth: AuthConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = lookup("DEORGANIZED_JWT_SECRET").unwrap_or_else(|| "dev-secret-change-me".into());
        let host = lookup("DEORGANIZED_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("DEORGANIZED_PORT")
            .unwrap_or_else(|| "8000".into())
            .parse()
            .context("DEORGANIZED_PORT must be a port number")?;
        let db_path: PathBuf = lookup("DEORGANIZED_DB_PATH")
            .unwrap_or_else(|| "deorganized.db".into())
            .into();
        let access_minutes: i64 = lookup("DEORGANIZED_ACCESS_TOKEN_MINUTES")
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);
        let refresh_days: i64 = lookup("DEORGANIZED_REFRESH_TOKEN_DAYS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        let mut auth = AuthConfig::new(jwt_secret);
        auth.access_ttl = Duration::minutes(access_minutes);
        auth.refresh_ttl = Duration::days(refresh_days);

        Ok(Self {
            host,
            port,
            db_path,
            auth,
        })
    }

    pub fn has_placeholder_secret(&self) -> bool {
        PLACEHOLDER_SECRETS.contains(&self.auth.jwt_secret.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.db_path, PathBuf::from("deorganized.db"));
        assert_eq!(config.auth.access_ttl, Duration::minutes(60));
        assert!(config.has_placeholder_secret());
    }

    #[test]
    fn overrides_are_read() {
        let config = config(&[
            ("DEORGANIZED_JWT_SECRET", "a-real-secret"),
            ("DEORGANIZED_PORT", "9000"),
            ("DEORGANIZED_REFRESH_TOKEN_DAYS", "7"),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.auth.refresh_ttl, Duration::days(7));
        assert!(!config.has_placeholder_secret());
    }

    #[test]
    fn bad_port_is_an_error() {
        assert!(config(&[("DEORGANIZED_PORT", "eighty")]).is_err());
    }
}
