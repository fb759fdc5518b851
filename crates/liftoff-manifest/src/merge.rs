//! Inline manifest merge
//!
//! Inline fields are first turned into [`ManifestOverrides`], where every
//! field is `None` unless the operator declared a non-blank value. The pure
//! [`merge`] then lays those overrides over a default descriptor.

use crate::error::Result;
use crate::token::TokenExpander;
use crate::units::{optional_memory_mb, parse_count};
use liftoff_types::{InlineManifest, ResolvedManifest};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Declared inline values after token expansion and unit parsing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestOverrides {
    pub name: Option<String>,
    pub path: Option<PathBuf>,
    pub memory_mb: Option<u32>,
    pub instances: Option<u32>,
    pub timeout_secs: Option<u32>,
    pub no_route: Option<bool>,
    pub buildpack: Option<String>,
    pub stack: Option<String>,
    pub command: Option<String>,
    pub domain: Option<String>,
    pub host: Option<String>,
    pub env: BTreeMap<String, String>,
    pub services: Vec<String>,
}

/// Lay `overrides` over `defaults`; unset overrides keep the default
pub fn merge(defaults: ResolvedManifest, overrides: ManifestOverrides) -> ResolvedManifest {
    let mut merged = defaults;

    if let Some(name) = overrides.name {
        merged.name = name;
    }
    if let Some(path) = overrides.path {
        merged.path = Some(path);
    }
    merged.memory_mb = overrides.memory_mb.or(merged.memory_mb);
    merged.instances = overrides.instances.or(merged.instances);
    merged.timeout_secs = overrides.timeout_secs.or(merged.timeout_secs);
    merged.no_route = overrides.no_route.or(merged.no_route);
    merged.buildpack = overrides.buildpack.or(merged.buildpack);
    merged.stack = overrides.stack.or(merged.stack);
    merged.command = overrides.command.or(merged.command);
    if let Some(domain) = overrides.domain {
        merged.domains = vec![domain];
    }
    if let Some(host) = overrides.host {
        merged.hosts = vec![host];
    }
    merged.env.extend(overrides.env);
    for service in overrides.services {
        if !merged.services.contains(&service) {
            merged.services.push(service);
        }
    }

    merged
}

/// Expand and parse inline fields into overrides.
///
/// `no_route` is always set: it is `true` only when the expanded value reads
/// `true` in any case. The path is left to the caller since it depends on
/// where the artifact was staged.
pub fn inline_overrides(
    inline: &InlineManifest,
    expander: &dyn TokenExpander,
) -> Result<ManifestOverrides> {
    let text = |raw: &str| -> Result<Option<String>> {
        let expanded = expander.expand(raw)?;
        Ok(non_blank(expanded))
    };

    let memory = expander.expand(&inline.memory)?;
    let instances = expander.expand(&inline.instances)?;
    let timeout = expander.expand(&inline.timeout)?;
    let no_route = expander.expand(&inline.no_route)?;

    let mut env = BTreeMap::new();
    for var in &inline.env_vars {
        let key = expander.expand(&var.key)?;
        if key.trim().is_empty() {
            continue;
        }
        env.insert(key.trim().to_string(), expander.expand(&var.value)?);
    }

    let mut services = Vec::new();
    for name in &inline.service_names {
        if let Some(name) = non_blank(expander.expand(name)?) {
            services.push(name);
        }
    }

    Ok(ManifestOverrides {
        name: text(&inline.name)?,
        path: None,
        memory_mb: optional_memory_mb(&memory)?,
        instances: parse_count("instances", &instances)?,
        timeout_secs: parse_count("timeout", &timeout)?,
        no_route: Some(no_route.trim().eq_ignore_ascii_case("true")),
        buildpack: text(&inline.buildpack)?,
        stack: text(&inline.stack)?,
        command: text(&inline.command)?,
        domain: text(&inline.domain)?,
        host: text(&inline.host)?,
        env,
        services,
    })
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
