//! Server configuration loaded from environment variables.

use std::env;

use anyhow::{Context, Result};

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
/// Two weeks.
const DEFAULT_SESSION_TTL_SECONDS: i64 = 1_209_600;
/// One year.
const MAX_SESSION_TTL_SECONDS: i64 = 31_536_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Server bind address (e.g. "0.0.0.0:8080").
    pub bind_address: String,

    /// `PostgreSQL` connection URL. Without it the in-memory store is used.
    pub database_url: Option<String>,

    /// Session lifetime in seconds.
    pub session_ttl_seconds: i64,

    /// Mark the session cookie `Secure`.
    pub cookie_secure: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let session_ttl_seconds = match env::var("SESSION_TTL_SECONDS") {
            Ok(raw) => parse_session_ttl(&raw)?,
            Err(_) => DEFAULT_SESSION_TTL_SECONDS,
        };

        let cookie_secure = match env::var("COOKIE_SECURE") {
            Ok(raw) => parse_flag(&raw).with_context(|| format!("COOKIE_SECURE must be a boolean, got {raw:?}"))?,
            Err(_) => false,
        };

        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.into()),
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
            session_ttl_seconds,
            cookie_secure,
        })
    }

    /// In-memory configuration bound to an ephemeral local port.
    pub fn for_tests() -> Self {
        Self {
            bind_address: "127.0.0.1:0".into(),
            database_url: None,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            cookie_secure: false,
        }
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_ttl_seconds)
    }
}

fn parse_session_ttl(raw: &str) -> Result<i64> {
    let seconds = raw
        .trim()
        .parse::<i64>()
        .with_context(|| format!("SESSION_TTL_SECONDS must be an integer, got {raw:?}"))?;
    if !(1..=MAX_SESSION_TTL_SECONDS).contains(&seconds) {
        anyhow::bail!("SESSION_TTL_SECONDS must be between 1 and {MAX_SESSION_TTL_SECONDS}, got {seconds}");
    }
    Ok(seconds)
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("unrecognized flag value {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_accept_common_spellings() {
        assert!(parse_flag("TRUE").unwrap());
        assert!(parse_flag(" on ").unwrap());
        assert!(!parse_flag("0").unwrap());
        assert!(parse_flag("maybe").is_err());
    }

    #[test]
    fn session_ttl_is_bounded() {
        assert_eq!(parse_session_ttl(" 3600 ").unwrap(), 3600);
        assert_eq!(parse_session_ttl("31536000").unwrap(), MAX_SESSION_TTL_SECONDS);
        assert!(parse_session_ttl("0").is_err());
        assert!(parse_session_ttl("31536001").is_err());
        assert!(parse_session_ttl("9223372036854775807").is_err());
        assert!(parse_session_ttl("soon").is_err());
    }

    #[test]
    fn test_config_uses_memory_store() {
        let config = Config::for_tests();
        assert!(config.database_url.is_none());
        assert_eq!(config.session_ttl(), chrono::Duration::days(14));
    }
}
