//! Proxy policy
//!
//! The policy is an explicit value handed to the connection factory at
//! construction. No configured proxy means direct connections.

use liftoff_types::{LiftoffError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Proxy configuration as written by operators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySettings {
    pub host: String,
    pub port: u16,
    /// Hostname patterns that bypass the proxy, `*` matches any run of characters
    #[serde(default)]
    pub no_proxy: Vec<String>,
}

/// Proxy attached to one connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyDescriptor {
    pub host: String,
    pub port: u16,
}

impl ProxyDescriptor {
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ProxyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProxyPolicy {
    proxy: Option<ProxyDescriptor>,
    bypass: Vec<Regex>,
}

impl ProxyPolicy {
    /// Direct connections only
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(settings: Option<ProxySettings>) -> Result<Self> {
        let Some(settings) = settings else {
            return Ok(Self::none());
        };
        if settings.host.trim().is_empty() {
            return Ok(Self::none());
        }

        let bypass = settings
            .no_proxy
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(compile_host_pattern)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            proxy: Some(ProxyDescriptor {
                host: settings.host.trim().to_string(),
                port: settings.port,
            }),
            bypass,
        })
    }

    /// Build from `HTTPS_PROXY` / `NO_PROXY` style values
    pub fn from_env_values(https_proxy: Option<&str>, no_proxy: Option<&str>) -> Result<Self> {
        let Some(raw) = https_proxy.map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok(Self::none());
        };
        let (host, port) = split_proxy_url(raw)?;
        let no_proxy = no_proxy
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| match p.strip_prefix('.') {
                Some(suffix) => format!("*.{}", suffix),
                None => p.to_string(),
            })
            .collect();
        Self::new(Some(ProxySettings { host, port, no_proxy }))
    }

    pub fn from_env() -> Result<Self> {
        let https_proxy = std::env::var("HTTPS_PROXY")
            .or_else(|_| std::env::var("https_proxy"))
            .ok();
        let no_proxy = std::env::var("NO_PROXY")
            .or_else(|_| std::env::var("no_proxy"))
            .ok();
        Self::from_env_values(https_proxy.as_deref(), no_proxy.as_deref())
    }

    pub fn is_configured(&self) -> bool {
        self.proxy.is_some()
    }

    /// Proxy to use for `host`, or `None` for a direct connection
    pub fn decide(&self, host: &str) -> Option<ProxyDescriptor> {
        let proxy = self.proxy.as_ref()?;
        if self.bypass.iter().any(|p| p.is_match(host)) {
            return None;
        }
        Some(proxy.clone())
    }
}

fn compile_host_pattern(pattern: &str) -> Result<Regex> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    Regex::new(&format!("^(?i:{})$", escaped)).map_err(|e| {
        LiftoffError::InvalidConfiguration(format!("invalid no-proxy pattern '{}': {}", pattern, e))
    })
}

fn split_proxy_url(raw: &str) -> Result<(String, u16)> {
    let without_scheme = raw.split_once("://").map(|(_, rest)| rest).unwrap_or(raw);
    let authority = without_scheme.split('/').next().unwrap_or_default();
    let host_port = authority.rsplit_once('@').map(|(_, hp)| hp).unwrap_or(authority);

    match host_port.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse().map_err(|_| {
                LiftoffError::InvalidConfiguration(format!("invalid proxy port in '{}'", raw))
            })?;
            Ok((host.to_string(), port))
        }
        None if !host_port.is_empty() => Ok((host_port.to_string(), 80)),
        None => Err(LiftoffError::InvalidConfiguration(format!(
            "invalid proxy '{}'",
            raw
        ))),
    }
}
