//! Runtime configuration from environment variables
//!
//! Optional values fall back to a default with an `info!` line; malformed
//! values and missing required ones abort startup with a `ConfigError`.

use std::fmt::{self, Display};
use std::str::FromStr;

use chrono::Duration;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown backend '{}' (expected postgres or memory)", other)),
        }
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres => write!(f, "postgres"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Token signing settings
#[derive(Clone)]
pub struct JwtSettings {
    pub secret: Vec<u8>,
    pub lifetime: Duration,
}

impl fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSettings")
            .field("secret", &"<redacted>")
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub storage: StorageBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub jwt: JwtSettings,
    pub cors_origins: Vec<String>,
    pub auth_rate_limit: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = try_load(&get, "PORT", "3000")?;
        let storage: StorageBackend = try_load(&get, "STORAGE_BACKEND", "postgres")?;
        let db_max_connections = try_load(&get, "DB_MAX_CONNECTIONS", "5")?;
        let auth_rate_limit = try_load(&get, "AUTH_RATE_LIMIT", "true")?;

        let database_url = get("DATABASE_URL");
        let jwt_secret = get("JWT_SECRET");

        let mut missing = Vec::new();
        if jwt_secret.is_none() {
            missing.push("JWT_SECRET");
        }
        if storage == StorageBackend::Postgres && database_url.is_none() {
            missing.push("DATABASE_URL");
        }
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let lifetime_raw = get("JWT_LIFETIME").unwrap_or_else(|| {
            info!("JWT_LIFETIME not set, using default: 1d");
            "1d".to_string()
        });
        let lifetime = parse_lifetime(&lifetime_raw).ok_or_else(|| ConfigError::Invalid {
            key: "JWT_LIFETIME",
            reason: format!("'{}' does not match <number><s|m|h|d|w|y>", lifetime_raw),
        })?;

        let cors_origins = get("CORS_ORIGINS")
            .unwrap_or_else(|| {
                info!("CORS_ORIGINS not set, using default: http://localhost:5173");
                "http://localhost:5173".to_string()
            })
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        Ok(Self {
            port,
            storage,
            database_url,
            db_max_connections,
            jwt: JwtSettings {
                secret: jwt_secret.unwrap_or_default().into_bytes(),
                lifetime,
            },
            cors_origins,
            auth_rate_limit,
        })
    }
}

fn try_load<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let raw = get(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.trim().parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }
    })
}

/// Parse `<n><unit>` where unit is one of s, m, h, d, w, y (365 days)
pub fn parse_lifetime(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let unit = raw.chars().last()?;
    let digits = &raw[..raw.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: i64 = digits.parse().ok()?;
    let seconds_per_unit: i64 = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        'w' => 7 * 24 * 60 * 60,
        'y' => 365 * 24 * 60 * 60,
        _ => return None,
    };
    let seconds = n.checked_mul(seconds_per_unit).filter(|&s| s > 0)?;
    Duration::try_seconds(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("DATABASE_URL", "postgres://localhost/community"),
        ]))
        .unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.storage, StorageBackend::Postgres);
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.jwt.lifetime, Duration::days(1));
        assert_eq!(config.cors_origins, vec!["http://localhost:5173"]);
        assert!(config.auth_rate_limit);
    }

    #[test]
    fn missing_required_are_all_named() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(vec!["JWT_SECRET", "DATABASE_URL"]));
    }

    #[test]
    fn memory_backend_needs_no_database() {
        let config = Config::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("STORAGE_BACKEND", "memory"),
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
            ("PORT", "8080"),
        ]))
        .unwrap();
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.port, 8080);
        assert_eq!(config.cors_origins.len(), 2);
    }

    #[test]
    fn bad_values_are_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("STORAGE_BACKEND", "memory"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));

        let err = Config::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("STORAGE_BACKEND", "memory"),
            ("JWT_LIFETIME", "10 days"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "JWT_LIFETIME", .. }));
    }

    #[test]
    fn secret_is_not_debug_printed() {
        let settings = JwtSettings {
            secret: b"hunter2".to_vec(),
            lifetime: Duration::hours(1),
        };
        assert!(!format!("{:?}", settings).contains("hunter2"));
    }

    #[test]
    fn lifetimes() {
        assert_eq!(parse_lifetime("30s"), Some(Duration::seconds(30)));
        assert_eq!(parse_lifetime("15m"), Some(Duration::minutes(15)));
        assert_eq!(parse_lifetime("2h"), Some(Duration::hours(2)));
        assert_eq!(parse_lifetime("1w"), Some(Duration::weeks(1)));
        assert_eq!(parse_lifetime("1y"), Some(Duration::days(365)));
        assert_eq!(parse_lifetime("0d"), None);
        assert_eq!(parse_lifetime("d"), None);
        assert_eq!(parse_lifetime("5x"), None);
        assert_eq!(parse_lifetime("-5m"), None);
        assert_eq!(parse_lifetime(""), None);
    }
}
