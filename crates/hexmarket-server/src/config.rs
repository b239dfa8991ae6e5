//! Runtime configuration read from the environment.

use anyhow::Context;
use std::net::SocketAddr;

const DEFAULT_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_MAX_MATCHES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to
    pub addr: SocketAddr,
    /// Matches that may exist at once
    pub max_matches: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_matches: DEFAULT_MAX_MATCHES,
        }
    }
}

impl ServerConfig {
    /// Read `SERVER_ADDR` and `MAX_MATCHES`, falling back to defaults
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let addr = lookup("SERVER_ADDR").unwrap_or_else(|| DEFAULT_ADDR.into());
        let addr: SocketAddr = addr
            .parse()
            .with_context(|| format!("invalid SERVER_ADDR {addr:?}"))?;

        let max_matches = match lookup("MAX_MATCHES") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("invalid MAX_MATCHES {raw:?}"))?,
            None => DEFAULT_MAX_MATCHES,
        };

        Ok(Self { addr, max_matches })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config =
            ServerConfig::from_lookup(lookup(&[("SERVER_ADDR", "127.0.0.1:9000"), ("MAX_MATCHES", "3")]))
                .unwrap();
        assert_eq!(config.addr.port(), 9000);
        assert_eq!(config.max_matches, 3);
    }

    #[test]
    fn test_bad_values_are_errors() {
        assert!(ServerConfig::from_lookup(lookup(&[("SERVER_ADDR", "nowhere")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("MAX_MATCHES", "many")])).is_err());
    }
}
