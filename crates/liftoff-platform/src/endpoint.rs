//! Endpoint resolution
//!
//! A target is written loosely by operators: `api.example.com`,
//! `api.example.com:8443`, `http://api.local`, or even with a stray path.
//! Resolution normalizes it to a [`ResolvedEndpoint`].
//!
//! An explicit `http` scheme defaults the port to 80. `https` and an absent
//! scheme leave the port unset for the connection layer to fill in.

use liftoff_types::{LiftoffError, ResolvedEndpoint, Result, Scheme, TargetSpec};
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

static TARGET_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?P<scheme>[A-Za-z][A-Za-z0-9+.\-]*)://)?(?P<host>[^/:\s?#]+)(?::(?P<port>[^/]*))?(?P<path>/\S*)?$",
    )
    .expect("target pattern is valid")
});

const HTTP_DEFAULT_PORT: u16 = 80;

/// Resolve a target into (scheme, host, port).
///
/// Never fails on a bare hostname; every other failure is
/// [`LiftoffError::MalformedTarget`].
pub fn resolve_target(target: &TargetSpec) -> Result<ResolvedEndpoint> {
    let raw = target.as_str().trim();
    let malformed = |reason: &str| LiftoffError::MalformedTarget {
        target: target.as_str().to_string(),
        reason: reason.to_string(),
    };

    if raw.is_empty() {
        return Err(malformed("target is empty"));
    }

    let caps = TARGET_PATTERN
        .captures(raw)
        .ok_or_else(|| malformed("expected [scheme://]host[:port][/path]"))?;

    let explicit_scheme = match caps.name("scheme").map(|m| m.as_str().to_ascii_lowercase()) {
        None => None,
        Some(s) if s == "https" => Some(Scheme::Https),
        Some(s) if s == "http" => Some(Scheme::Http),
        Some(other) => return Err(malformed(&format!("unsupported scheme '{}'", other))),
    };

    let host = caps
        .name("host")
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| malformed("missing host"))?;

    let explicit_port = match caps.name("port") {
        None => None,
        Some(m) => {
            let port: u16 = m
                .as_str()
                .parse()
                .map_err(|_| malformed(&format!("invalid port '{}'", m.as_str())))?;
            if port == 0 {
                return Err(malformed("port must be positive"));
            }
            Some(port)
        }
    };

    let discarded_path = caps
        .name("path")
        .map(|m| m.as_str())
        .filter(|p| !p.is_empty() && *p != "/")
        .map(str::to_string);

    if let Some(path) = &discarded_path {
        warn!(target = %target, path = %path, "Target path is ignored");
    }

    let port = match (explicit_scheme, explicit_port) {
        (_, Some(port)) => Some(port),
        (Some(Scheme::Http), None) => Some(HTTP_DEFAULT_PORT),
        _ => None,
    };

    Ok(ResolvedEndpoint {
        scheme: explicit_scheme.unwrap_or(Scheme::Https),
        host,
        port,
        secure: explicit_scheme.map(|s| s == Scheme::Https),
        discarded_path,
    })
}

/// Non-fatal observations about a resolved target
pub fn target_warnings(endpoint: &ResolvedEndpoint) -> Vec<String> {
    let mut warnings = Vec::new();
    if !endpoint.host.starts_with("api.") {
        warnings.push(format!(
            "Host '{}' does not start with 'api.', is it really the API endpoint?",
            endpoint.host
        ));
    }
    if let Some(path) = &endpoint.discarded_path {
        warnings.push(format!("Path '{}' of the target will be ignored", path));
    }
    warnings
}

/// Validate a target as typed by an operator.
///
/// A target without `http://` or `https://` is checked as `https://<target>`.
/// Returns the warnings on success.
pub fn validate_target(raw: &str) -> Result<Vec<String>> {
    let trimmed = raw.trim();
    let lowered = trimmed.to_ascii_lowercase();
    let candidate = if lowered.starts_with("http://") || lowered.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let endpoint = resolve_target(&TargetSpec::new(candidate))?;
    Ok(target_warnings(&endpoint))
}
