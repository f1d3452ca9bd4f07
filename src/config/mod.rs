//! Sectioned `key=value` configuration file, the idiomatic-Rust analogue of
//! `conflib.py`'s `ConfigParser` use: `[proxy]`, `[rpcserver]`,
//! `[rpcclient]` sections. Missing sections and missing keys fall back to
//! defaults rather than erroring, matching the original's `has_key` guards.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use ini::Ini;

use crate::error::{HalberdError, Result};

const DEFAULT_PROXY_PORT: u16 = 8080;
const DEFAULT_RPCSERVER_PORT: u16 = 2323;

#[derive(Debug, Clone, PartialEq)]
pub struct ProxyConfig {
    pub address: IpAddr,
    pub port: u16,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PROXY_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RpcServerConfig {
    pub address: IpAddr,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_RPCSERVER_PORT,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RpcClientConfig {
    pub servers: Vec<SocketAddr>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub proxy: ProxyConfig,
    pub rpcserver: RpcServerConfig,
    pub rpcclient: RpcClientConfig,
}

impl Config {
    /// Load from `path`, falling back to [`Config::default`] section by
    /// section when a section or key is absent.
    pub fn load(path: &Path) -> Result<Config> {
        let ini = Ini::load_from_file(path)
            .map_err(|e| HalberdError::InvalidConfig(format!("{}: {e}", path.display())))?;

        let mut config = Config::default();

        if let Some(section) = ini.section(Some("proxy")) {
            if let Some(addr) = section.get("address") {
                config.proxy.address = parse_ip(addr)?;
            }
            if let Some(port) = section.get("port") {
                config.proxy.port = parse_port_or_default(port, DEFAULT_PROXY_PORT);
            }
        }

        if let Some(section) = ini.section(Some("rpcserver")) {
            if let Some(addr) = section.get("address") {
                config.rpcserver.address = parse_ip(addr)?;
            }
            if let Some(port) = section.get("port") {
                config.rpcserver.port = parse_port_or_default(port, DEFAULT_RPCSERVER_PORT);
            }
        }

        if let Some(section) = ini.section(Some("rpcclient")) {
            if let Some(servers) = section.get("servers") {
                config.rpcclient.servers = servers
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        s.parse()
                            .map_err(|_| HalberdError::InvalidConfig(format!("bad server {s:?}")))
                    })
                    .collect::<Result<Vec<_>>>()?;
            }
        }

        Ok(config)
    }
}

fn parse_ip(value: &str) -> Result<IpAddr> {
    value
        .parse()
        .map_err(|_| HalberdError::InvalidConfig(format!("bad address {value:?}")))
}

/// A malformed port falls back to `default` rather than failing the whole
/// load, mirroring `_getAddr()`'s `except ValueError: port = default_port`.
fn parse_port_or_default(value: &str, default: u16) -> u16 {
    value.parse().unwrap_or_else(|_| {
        log::warn!("ignoring malformed port {value:?}, using default {default}");
        default
    })
}
