use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_STORAGE_FOLDER: &str = "/usr/data";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8484";
const DEFAULT_PLEX_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Settings {
    pub storage_folder: PathBuf,
    pub bind_addr: SocketAddr,
    pub plex_timeout: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let storage_folder = env::var("GAPS_STORAGE_FOLDER")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_STORAGE_FOLDER.to_string());

        let bind_addr = env::var("GAPS_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_addr
            .parse()
            .with_context(|| format!("GAPS_BIND_ADDR '{}' is not a socket address", bind_addr))?;

        let plex_timeout = match env::var("GAPS_PLEX_TIMEOUT_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("GAPS_PLEX_TIMEOUT_SECS '{}' is not a number", raw))?,
            Err(_) => DEFAULT_PLEX_TIMEOUT_SECS,
        };

        Ok(Self {
            storage_folder: PathBuf::from(storage_folder),
            bind_addr,
            plex_timeout: Duration::from_secs(plex_timeout),
        })
    }
}
