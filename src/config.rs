use std::{
    io,
    net::{IpAddr, Ipv4Addr},
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_ip: IpAddr,
    pub port: u16,
    /// Directory served under `/static`.
    pub static_dir: PathBuf,
    /// How long `stop` waits for in-flight requests before dropping them.
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            static_dir: PathBuf::from("static"),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// Choices remembered between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(rename = "uploadDir", default, skip_serializing_if = "Option::is_none")]
    pub upload_dir: Option<PathBuf>,
}

impl Preferences {
    /// `<config dir>/lanshare/config.json`, or a file in the temp dir when the
    /// platform has no config dir.
    pub fn default_path() -> PathBuf {
        match dirs::config_dir() {
            Some(dir) => dir.join("lanshare").join("config.json"),
            None => std::env::temp_dir().join("lanshare-config.json"),
        }
    }

    /// Missing or unreadable preferences fall back to defaults.
    pub fn load_from(path: &Path) -> Self {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!("Failed to read preferences {}: {}", path.display(), e);
                return Self::default();
            }
        };
        serde_json::from_slice(&data).unwrap_or_else(|e| {
            warn!("Failed to parse preferences {}: {}", path.display(), e);
            Self::default()
        })
    }

    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, data)
    }
}
