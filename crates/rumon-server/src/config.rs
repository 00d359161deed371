use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
    "changeme",
];

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:3001,http://localhost:8081";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = get("RUMON_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("RUMON_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let port = match get("RUMON_PORT").or_else(|| get("PORT")) {
            Some(raw) => raw.parse().with_context(|| format!("invalid port '{}'", raw))?,
            None => 3000,
        };

        let token_ttl_days = match get("RUMON_TOKEN_TTL_DAYS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("invalid RUMON_TOKEN_TTL_DAYS '{}'", raw))?,
            None => 30,
        };
        if token_ttl_days <= 0 {
            bail!("RUMON_TOKEN_TTL_DAYS must be positive");
        }

        let cors_origins = get("RUMON_CORS_ORIGINS")
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.into())
            .split(',')
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect();

        Ok(Self {
            host: get("RUMON_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: PathBuf::from(get("RUMON_DB_PATH").unwrap_or_else(|| "rumon.db".into())),
            jwt_secret,
            token_ttl_days,
            cors_origins,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_the_secret_is_set() {
        let c = config(&[("RUMON_JWT_SECRET", "s3cr3t-for-tests")]).unwrap();
        assert_eq!(c.port, 3000);
        assert_eq!(c.token_ttl_days, 30);
        assert_eq!(c.db_path, PathBuf::from("rumon.db"));
        assert_eq!(c.cors_origins.len(), 3);
        assert_eq!(c.addr().unwrap().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn placeholder_or_missing_secret_is_refused() {
        assert!(config(&[]).is_err());
        assert!(config(&[("RUMON_JWT_SECRET", "dev-secret-change-me")]).is_err());
        assert!(config(&[("RUMON_JWT_SECRET", "   ")]).is_err());
    }

    #[test]
    fn port_falls_back_to_platform_variable() {
        let c = config(&[("RUMON_JWT_SECRET", "x-long-secret"), ("PORT", "8080")]).unwrap();
        assert_eq!(c.port, 8080);

        let c = config(&[
            ("RUMON_JWT_SECRET", "x-long-secret"),
            ("PORT", "8080"),
            ("RUMON_PORT", "9000"),
        ])
        .unwrap();
        assert_eq!(c.port, 9000);
    }

    #[test]
    fn cors_origins_are_split_and_trimmed() {
        let c = config(&[
            ("RUMON_JWT_SECRET", "x-long-secret"),
            ("RUMON_CORS_ORIGINS", " https://rumon.app/ , ,https://admin.rumon.app"),
        ])
        .unwrap();
        assert_eq!(c.cors_origins, vec!["https://rumon.app", "https://admin.rumon.app"]);
    }

    #[test]
    fn bad_numbers_are_errors() {
        assert!(config(&[("RUMON_JWT_SECRET", "x-long-secret"), ("RUMON_PORT", "http")]).is_err());
        assert!(config(&[("RUMON_JWT_SECRET", "x-long-secret"), ("RUMON_TOKEN_TTL_DAYS", "0")]).is_err());
    }
}
