use std::net::SocketAddr;

use anyhow::Context;

use crate::store::{DEFAULT_AUTORENAME_LIMIT, DEFAULT_SPACE_ALLOCATED, StoreConfig};

pub const DEFAULT_ADDR: &str = "localhost:7162";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// `host:port` to listen on. Resolved at bind time so `localhost` works.
    pub addr: String,
    pub store: StoreConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            store: StoreConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let addr = std::env::var("MOCKDROP_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
        validate_addr(&addr)?;
        let space_allocated = read_u64_env("MOCKDROP_SPACE_ALLOCATED", DEFAULT_SPACE_ALLOCATED);
        let autorename_limit = read_u64_env(
            "MOCKDROP_AUTORENAME_LIMIT",
            u64::from(DEFAULT_AUTORENAME_LIMIT),
        );
        Ok(Self {
            addr,
            store: StoreConfig {
                space_allocated,
                autorename_limit: u32::try_from(autorename_limit)
                    .context("MOCKDROP_AUTORENAME_LIMIT is too large")?,
            },
        })
    }

    pub fn with_addr(mut self, addr: impl Into<String>) -> anyhow::Result<Self> {
        let addr = addr.into();
        validate_addr(&addr)?;
        self.addr = addr;
        Ok(self)
    }
}

/// Accepts `ip:port` or `host:port` with a numeric port.
fn validate_addr(addr: &str) -> anyhow::Result<()> {
    if addr.parse::<SocketAddr>().is_ok() {
        return Ok(());
    }
    let (host, port) = addr
        .rsplit_once(':')
        .with_context(|| format!("listen address {addr:?} has no port"))?;
    anyhow::ensure!(!host.is_empty(), "listen address {addr:?} has no host");
    port.parse::<u16>()
        .with_context(|| format!("listen address {addr:?} has an invalid port"))?;
    Ok(())
}

fn read_u64_env(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}
