use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use depot_engine::EngineConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Prefix for every URL the server hands out (redirects, static links).
    pub base_url: String,
    /// Answer cross-origin requests from any origin.
    pub permissive_cors: bool,
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let bind_addr = SocketAddr::from((Ipv4Addr::LOCALHOST, 8000));
        Self {
            bind_addr,
            base_url: format!("http://{bind_addr}"),
            permissive_cors: false,
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Load a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }
}
