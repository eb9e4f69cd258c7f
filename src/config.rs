//! # Configuration
//!
//! Audit settings read from a TOML file:
//!
//! ```toml
//! title = "lab"
//!
//! [EchonetLite]
//! IP = ["192.168.1.20", "192.168.1.21"]
//! release = "M"
//! schema_path = "class.json"
//! ```

use crate::constants::{DEFAULT_RECEIVE_TIMEOUT, ECHONET_PORT, LATEST_RELEASE};
use crate::error::EchonetError;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_release() -> String {
    LATEST_RELEASE.to_string()
}

fn default_schema_path() -> PathBuf {
    PathBuf::from("class.json")
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), ECHONET_PORT)
}

fn default_receive_timeout_secs() -> u64 {
    DEFAULT_RECEIVE_TIMEOUT.as_secs()
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "EchonetLite")]
    pub echonet_lite: EchonetLiteConfig,
}

/// The `[EchonetLite]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EchonetLiteConfig {
    /// Target nodes.
    #[serde(rename = "IP")]
    pub ip: Vec<IpAddr>,
    /// Appendix release letter the schema is read for.
    #[serde(default = "default_release")]
    pub release: String,
    #[serde(default = "default_schema_path")]
    pub schema_path: PathBuf,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_receive_timeout_secs")]
    pub receive_timeout_secs: u64,
    /// Seed for reproducible fuzz runs; random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
}

impl EchonetLiteConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_secs(self.receive_timeout_secs)
    }
}

impl Config {
    /// Reads and validates the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EchonetError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EchonetError::Config(format!("read {}: {e}", path.display())))?;
        let config = Self::from_toml_str(&text)?;
        log::debug!("configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, EchonetError> {
        let config: Config =
            toml::from_str(text).map_err(|e| EchonetError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EchonetError> {
        let settings = &self.echonet_lite;
        if settings.ip.is_empty() {
            return Err(EchonetError::Config("no target IP configured".to_string()));
        }
        let mut letters = settings.release.chars();
        match (letters.next(), letters.next()) {
            (Some(letter), None) if letter.is_ascii_uppercase() => {}
            _ => {
                return Err(EchonetError::Config(format!(
                    "release '{}' is not a single letter A-Z",
                    settings.release
                )))
            }
        }
        if settings.receive_timeout_secs == 0 {
            return Err(EchonetError::Config("receive timeout must be positive".to_string()));
        }
        Ok(())
    }
}
