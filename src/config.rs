use std::path::PathBuf;
use std::time::Duration;

use crate::limits::*;

/// Server settings, read from `SLOTMEET_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// JSON array of availability rows loaded into the in-memory store.
    pub seed_file: Option<PathBuf>,
    pub max_connections: usize,
    pub metrics_port: Option<u16>,
    pub fetch_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 7450,
            seed_file: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            metrics_port: None,
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unset or unparseable values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            bind: lookup("SLOTMEET_BIND").unwrap_or(defaults.bind),
            port: lookup("SLOTMEET_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            seed_file: lookup("SLOTMEET_SEED_FILE")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            max_connections: lookup("SLOTMEET_MAX_CONNECTIONS")
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_connections),
            metrics_port: lookup("SLOTMEET_METRICS_PORT").and_then(|s| s.parse().ok()),
            fetch_timeout: lookup("SLOTMEET_FETCH_TIMEOUT_MS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.fetch_timeout),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ServerConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.addr(), "0.0.0.0:7450");
    }

    #[test]
    fn reads_every_variable() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("SLOTMEET_BIND", "127.0.0.1"),
            ("SLOTMEET_PORT", "9000"),
            ("SLOTMEET_SEED_FILE", "/tmp/rows.json"),
            ("SLOTMEET_MAX_CONNECTIONS", "8"),
            ("SLOTMEET_METRICS_PORT", "9100"),
            ("SLOTMEET_FETCH_TIMEOUT_MS", "250"),
        ]));
        assert_eq!(config.addr(), "127.0.0.1:9000");
        assert_eq!(config.seed_file, Some(PathBuf::from("/tmp/rows.json")));
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.metrics_port, Some(9100));
        assert_eq!(config.fetch_timeout, Duration::from_millis(250));
    }

    #[test]
    fn bad_values_fall_back() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("SLOTMEET_PORT", "not-a-port"),
            ("SLOTMEET_MAX_CONNECTIONS", "0"),
            ("SLOTMEET_METRICS_PORT", "99999"),
            ("SLOTMEET_SEED_FILE", "  "),
        ]));
        assert_eq!(config.port, 7450);
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.metrics_port, None);
        assert_eq!(config.seed_file, None);
    }
}
