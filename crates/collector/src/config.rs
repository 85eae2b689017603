use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Port the health endpoint listens on.
    pub port: u16,
    /// Hostname used for self-exclusion. Inside a container the engine
    /// sets this to a prefix of the container id; empty disables the
    /// check.
    pub hostname: String,
    /// Path to the engine's Unix socket.
    pub docker_socket: PathBuf,
}

impl CollectorConfig {
    /// Load configuration from file or environment variables.
    /// Priority: environment variables > config file > defaults.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = std::env::var("COLLECTOR_CONFIG_FILE")
            .unwrap_or_else(|_| "/etc/collector/collector.toml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            tracing::info!("loading configuration from: {}", config_path);
            Self::from_file(&config_path)?
        } else {
            Self::from_env()
        };

        if let Ok(port) = std::env::var("PORT") {
            config.port = port.parse()?;
        }
        if let Ok(hostname) = std::env::var("HOSTNAME") {
            config.hostname = hostname;
        }
        if let Ok(socket) = std::env::var("DOCKER_SOCKET") {
            config.docker_socket = PathBuf::from(socket);
        }

        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: CollectorConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            hostname: std::env::var("HOSTNAME").unwrap_or_default(),
            docker_socket: std::env::var("DOCKER_SOCKET")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/var/run/docker.sock")),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("port must be > 0".to_string());
        }
        if self.docker_socket.as_os_str().is_empty() {
            return Err("docker_socket must not be empty".to_string());
        }
        Ok(())
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            hostname: String::new(),
            docker_socket: PathBuf::from("/var/run/docker.sock"),
        }
    }
}
