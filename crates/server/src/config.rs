use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use gst_contracts::settings::{self, ConfigError, Settings};

pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub cache_ttl: Duration,
    /// How long a handler waits on a refresh before answering 504. `None`
    /// waits for the provider however long it takes.
    pub provider_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            provider_timeout: None,
        }
    }
}

impl ServerConfig {
    pub fn from_kv(kv: &Settings) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_addr = settings::parse_socket_addr(kv, "GST_BIND_ADDR", defaults.bind_addr)?;
        let cache_ttl_secs =
            settings::parse_u64(kv, "GST_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?;
        let provider_timeout_secs = settings::parse_u64(kv, "GST_PROVIDER_TIMEOUT_SECS", 0)?;

        Ok(Self {
            bind_addr,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            provider_timeout: (provider_timeout_secs > 0)
                .then(|| Duration::from_secs(provider_timeout_secs)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn kv(pairs: &[(&str, &str)]) -> Settings {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>()
    }

    #[test]
    fn defaults_apply_when_keys_are_absent() {
        let config = ServerConfig::from_kv(&HashMap::new()).expect("config should load");
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.provider_timeout, None);
    }

    #[test]
    fn zero_ttl_is_kept() {
        let config = ServerConfig::from_kv(&kv(&[("GST_CACHE_TTL_SECS", "0")]))
            .expect("config should load");
        assert_eq!(config.cache_ttl, Duration::ZERO);
    }

    #[test]
    fn provider_timeout_is_enabled_by_positive_value() {
        let config = ServerConfig::from_kv(&kv(&[
            ("GST_BIND_ADDR", "0.0.0.0:9000"),
            ("GST_PROVIDER_TIMEOUT_SECS", "30"),
        ]))
        .expect("config should load");
        assert_eq!(config.bind_addr, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.provider_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn invalid_values_are_rejected_with_stable_code() {
        let err = ServerConfig::from_kv(&kv(&[("GST_CACHE_TTL_SECS", "five minutes")]))
            .unwrap_err();
        assert_eq!(err.code, "ERR_INVALID_CONFIG");
        assert!(err.message.contains("GST_CACHE_TTL_SECS"));

        let err = ServerConfig::from_kv(&kv(&[("GST_BIND_ADDR", "localhost")])).unwrap_err();
        assert_eq!(err.code, "ERR_INVALID_CONFIG");
    }
}
