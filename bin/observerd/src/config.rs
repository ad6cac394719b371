//! Configuration file loading and validation

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("server block is required")]
    MissingServerBlock,

    #[error("server.{0} is required")]
    MissingField(&'static str),
}

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: Option<ServerConfig>,
}

/// The server block
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the gossip mesh transport
    #[serde(default)]
    pub listen: String,
    /// Bind address for the API/UI server
    #[serde(default)]
    pub ui: String,
    /// Name of this node in the mesh
    #[serde(default = "default_node_name")]
    pub node_name: String,
}

fn default_node_name() -> String {
    "observer".to_string()
}

/// Load a configuration file from disk
pub fn load(path: &str) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })?;

    let config = serde_yaml::from_str(&content)?;
    Ok(config)
}

impl Config {
    /// Validate the configuration and return the server block.
    pub fn validate(&self) -> Result<&ServerConfig, ConfigError> {
        let server = self.server.as_ref().ok_or(ConfigError::MissingServerBlock)?;

        if server.listen.is_empty() {
            return Err(ConfigError::MissingField("listen"));
        }

        if server.ui.is_empty() {
            return Err(ConfigError::MissingField("ui"));
        }

        Ok(server)
    }
}
