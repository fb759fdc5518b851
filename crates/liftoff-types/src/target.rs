//! Target endpoint types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw endpoint string as configured, e.g. `api.example.com:443`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetSpec(String);

impl TargetSpec {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetSpec {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized (scheme, host, port) derived from a [`TargetSpec`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEndpoint {
    pub scheme: Scheme,
    pub host: String,
    /// Unset means the connection layer's own default applies
    pub port: Option<u16>,
    /// `Some` only when the target carried an explicit scheme
    pub secure: Option<bool>,
    /// Path component present in the target, which is ignored
    pub discarded_path: Option<String>,
}

impl ResolvedEndpoint {
    pub fn scheme_was_explicit(&self) -> bool {
        self.secure.is_some()
    }

    /// API URL handed to the platform client
    pub fn api_url(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}", self.scheme, self.host, port),
            None => format!("{}://{}", self.scheme, self.host),
        }
    }
}

impl fmt::Display for ResolvedEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.api_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_with_and_without_port() {
        let mut endpoint = ResolvedEndpoint {
            scheme: Scheme::Https,
            host: "api.example.com".into(),
            port: None,
            secure: None,
            discarded_path: None,
        };
        assert_eq!(endpoint.api_url(), "https://api.example.com");
        assert!(!endpoint.scheme_was_explicit());

        endpoint.scheme = Scheme::Http;
        endpoint.port = Some(80);
        endpoint.secure = Some(false);
        assert_eq!(endpoint.api_url(), "http://api.example.com:80");
        assert!(endpoint.scheme_was_explicit());
    }
}
