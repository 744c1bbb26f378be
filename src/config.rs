use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Which photos `GET /photos` returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListScope {
    /// Every live photo, no identity required.
    #[default]
    All,
    /// Only the caller's photos; the request must carry an access token.
    Owned,
}

impl FromStr for ListScope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "owned" | "owned_only" | "ownedonly" => Ok(Self::Owned),
            other => anyhow::bail!("unknown photo list scope: {other}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub jwt: JwtConfig,
    pub list_scope: ListScope,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "photoshare".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "photoshare-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 14),
        };
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);
        let list_scope = match std::env::var("PHOTO_LIST_SCOPE") {
            Ok(v) => v.parse()?,
            Err(_) => ListScope::default(),
        };
        let host = std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = match std::env::var("APP_PORT") {
            Ok(v) => v.parse().with_context(|| format!("invalid APP_PORT: {v}"))?,
            Err(_) => 8080,
        };
        Ok(Self {
            database_url,
            max_connections,
            jwt,
            list_scope,
            host,
            port,
        })
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }

    /// `DATABASE_URL=memory://` selects the in-process store.
    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with("memory:")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_scope_parses_known_values() {
        assert_eq!("all".parse::<ListScope>().unwrap(), ListScope::All);
        assert_eq!(" Owned ".parse::<ListScope>().unwrap(), ListScope::Owned);
        assert_eq!("owned_only".parse::<ListScope>().unwrap(), ListScope::Owned);
    }

    #[test]
    fn list_scope_rejects_unknown_value() {
        let err = "everyone".parse::<ListScope>().unwrap_err();
        assert!(err.to_string().contains("everyone"));
    }

    fn config(host: &str, port: u16) -> AppConfig {
        AppConfig {
            database_url: "memory://".into(),
            max_connections: 1,
            jwt: JwtConfig {
                secret: "s".into(),
                issuer: "i".into(),
                audience: "a".into(),
                ttl_minutes: 1,
                refresh_ttl_minutes: 1,
            },
            list_scope: ListScope::All,
            host: host.into(),
            port,
        }
    }

    #[test]
    fn memory_url_selects_memory_store() {
        assert!(config("0.0.0.0", 8080).uses_memory_store());
    }

    #[test]
    fn listen_addr_joins_host_and_port() {
        let addr = config("127.0.0.1", 3000).listen_addr().unwrap();
        assert_eq!(addr, "127.0.0.1:3000".parse::<SocketAddr>().unwrap());
        assert!(config("not a host", 3000).listen_addr().is_err());
    }
}
