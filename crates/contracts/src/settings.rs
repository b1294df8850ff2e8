//! KEY=VALUE settings shared by the server and the warehouse providers.
//!
//! Values come from an env file (`GST_CONFIG_PATH`, or `./.env` when it
//! exists) overlaid by the process environment.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;

pub const CONFIG_PATH_KEY: &str = "GST_CONFIG_PATH";
const DEFAULT_ENV_FILE: &str = ".env";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub code: &'static str,
    pub message: String,
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            code: "ERR_INVALID_CONFIG",
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ConfigError {}

pub type Settings = HashMap<String, String>;

pub fn load() -> Result<Settings, ConfigError> {
    let mut merged = HashMap::new();

    match std::env::var(CONFIG_PATH_KEY) {
        Ok(config_path) if !config_path.trim().is_empty() => {
            merged.extend(parse_env_file(Path::new(config_path.trim()))?);
        }
        _ => {
            let fallback = Path::new(DEFAULT_ENV_FILE);
            if fallback.is_file() {
                merged.extend(parse_env_file(fallback)?);
            }
        }
    }

    merged.extend(std::env::vars());
    Ok(merged)
}

pub fn parse_env_file(path: &Path) -> Result<Settings, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|_| ConfigError {
        code: "ERR_CONFIG_FILE_READ",
        message: format!("failed to read config file at {}", path.display()),
    })?;

    parse_env_str(&contents)
}

pub fn parse_env_str(contents: &str) -> Result<Settings, ConfigError> {
    let mut kv = HashMap::new();

    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let (key, value) = line.split_once('=').ok_or_else(|| ConfigError {
            code: "ERR_CONFIG_FILE_PARSE",
            message: format!("invalid config line {} (expected KEY=VALUE)", idx + 1),
        })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError {
                code: "ERR_CONFIG_FILE_PARSE",
                message: format!("invalid config line {} (empty key)", idx + 1),
            });
        }

        kv.insert(key.to_string(), strip_quotes(value.trim()));
    }

    Ok(kv)
}

fn strip_quotes(s: &str) -> String {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return s[1..bytes.len() - 1].to_string();
        }
    }
    s.to_string()
}

pub fn optional_nonempty(kv: &Settings, key: &str) -> Option<String> {
    kv.get(key)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

pub fn require_nonempty(kv: &Settings, key: &'static str) -> Result<String, ConfigError> {
    optional_nonempty(kv, key).ok_or_else(|| ConfigError {
        code: "ERR_MISSING_CONFIG",
        message: format!("missing required config key {}", key),
    })
}

pub fn parse_socket_addr(
    kv: &Settings,
    key: &'static str,
    default: SocketAddr,
) -> Result<SocketAddr, ConfigError> {
    match optional_nonempty(kv, key) {
        None => Ok(default),
        Some(v) => v.parse::<SocketAddr>().map_err(|_| {
            ConfigError::invalid(format!("{} must be a valid host:port socket address", key))
        }),
    }
}

pub fn parse_u64(kv: &Settings, key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match optional_nonempty(kv, key) {
        None => Ok(default),
        Some(v) => v
            .parse::<u64>()
            .map_err(|_| ConfigError::invalid(format!("{} must be an integer", key))),
    }
}

pub fn parse_u16(kv: &Settings, key: &'static str, default: u16) -> Result<u16, ConfigError> {
    match optional_nonempty(kv, key) {
        None => Ok(default),
        Some(v) => v
            .parse::<u16>()
            .map_err(|_| ConfigError::invalid(format!("{} must be a port number", key))),
    }
}
