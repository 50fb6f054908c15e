use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub store_dir: PathBuf,
    /// Accept uploads with no body bytes.
    pub allow_empty_body: bool,
    /// Seconds a client may take to send the request head.
    pub request_header_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080)),
            store_dir: PathBuf::from("./store"),
            allow_empty_body: false,
            request_header_timeout_secs: 5,
        }
    }
}

impl ServerConfig {
    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(s: &str) -> ServerResult<Self> {
        toml::from_str(s).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Read a TOML config file.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Location of the key index database.
    pub fn index_path(&self) -> PathBuf {
        self.store_dir.join("index.db")
    }
}

/// Parse a listen address. A bare `:port` binds all interfaces.
pub fn parse_listen_addr(s: &str) -> ServerResult<SocketAddr> {
    let s = s.trim();
    let full = match s.strip_prefix(':') {
        Some(port) => format!("{}:{port}", Ipv4Addr::UNSPECIFIED),
        None => s.to_string(),
    };
    full.parse()
        .map_err(|_| ServerError::Config(format!("invalid listen address: {s}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(c.store_dir, PathBuf::from("./store"));
        assert!(!c.allow_empty_body);
        assert_eq!(c.request_header_timeout_secs, 5);
        assert_eq!(c.index_path(), PathBuf::from("./store/index.db"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = ServerConfig::from_toml_str("store_dir = \"/var/lib/cas\"\nallow_empty_body = true\n").unwrap();
        assert_eq!(c.store_dir, PathBuf::from("/var/lib/cas"));
        assert!(c.allow_empty_body);
        assert_eq!(c.bind_addr, ServerConfig::default().bind_addr);
    }

    #[test]
    fn bad_toml_is_config_error() {
        assert!(matches!(ServerConfig::from_toml_str("bind_addr = 7"), Err(ServerError::Config(_))));
    }

    #[test]
    fn listen_addr_forms() {
        assert_eq!(parse_listen_addr(":9000").unwrap(), "0.0.0.0:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(parse_listen_addr("127.0.0.1:80").unwrap(), "127.0.0.1:80".parse::<SocketAddr>().unwrap());
        assert!(parse_listen_addr("nonsense").is_err());
    }
}
