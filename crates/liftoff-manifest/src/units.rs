//! Memory units and numeric fields

use crate::error::{ManifestError, Result};
use tracing::warn;

const MB_PER_GB: i64 = 1024;

/// Parse a memory amount into megabytes.
///
/// Accepts a bare integer (megabytes) or a case-insensitive `M`, `MB`, `G`
/// or `GB` suffix. Zero and negative amounts are rejected.
pub fn parse_memory_mb(raw: &str) -> Result<u32> {
    match parse_signed_memory(raw)? {
        Some(mb) if mb > 0 => to_u32("memory", raw, mb),
        _ => Err(ManifestError::Invalid(format!(
            "memory must be a positive amount, got '{}'",
            raw
        ))),
    }
}

/// Memory for inline fields: blank, zero or negative means unset
pub(crate) fn optional_memory_mb(raw: &str) -> Result<Option<u32>> {
    match parse_signed_memory(raw)? {
        None => Ok(None),
        Some(mb) if mb > 0 => to_u32("memory", raw, mb).map(Some),
        Some(mb) => {
            if mb < 0 {
                warn!(value = %raw, "Ignoring negative memory");
            }
            Ok(None)
        }
    }
}

/// Parse an inline count such as instances or a timeout.
///
/// Blank, zero and negative values mean unset; anything that is not an
/// integer is an error.
pub fn parse_count(field: &'static str, raw: &str) -> Result<Option<u32>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value: i64 = trimmed.parse().map_err(|_| ManifestError::InvalidValue {
        field,
        value: raw.to_string(),
    })?;
    if value <= 0 {
        if value < 0 {
            warn!(field, value, "Ignoring negative value");
        }
        return Ok(None);
    }
    to_u32(field, raw, value).map(Some)
}

fn parse_signed_memory(raw: &str) -> Result<Option<i64>> {
    let upper = raw.trim().to_ascii_uppercase();
    if upper.is_empty() {
        return Ok(None);
    }

    let (digits, factor) = if let Some(n) = upper.strip_suffix("GB") {
        (n, MB_PER_GB)
    } else if let Some(n) = upper.strip_suffix('G') {
        (n, MB_PER_GB)
    } else if let Some(n) = upper.strip_suffix("MB") {
        (n, 1)
    } else if let Some(n) = upper.strip_suffix('M') {
        (n, 1)
    } else {
        (upper.as_str(), 1)
    };

    let amount: i64 = digits.trim().parse().map_err(|_| ManifestError::InvalidValue {
        field: "memory",
        value: raw.to_string(),
    })?;
    amount
        .checked_mul(factor)
        .map(Some)
        .ok_or_else(|| ManifestError::Invalid(format!("memory '{}' is too large", raw)))
}

fn to_u32(field: &'static str, raw: &str, value: i64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| ManifestError::Invalid(format!("{} '{}' is out of range", field, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_units() {
        assert_eq!(parse_memory_mb("1g").unwrap(), 1024);
        assert_eq!(parse_memory_mb("512").unwrap(), 512);
        assert_eq!(parse_memory_mb("512m").unwrap(), 512);
        assert_eq!(parse_memory_mb("512MB").unwrap(), 512);
        assert_eq!(parse_memory_mb("2GB").unwrap(), 2048);
        assert_eq!(parse_memory_mb(" 2gb ").unwrap(), 2048);
    }

    #[test]
    fn test_memory_rejects_garbage() {
        for raw in ["lots", "1.5G", "G", "512K", "", "0", "-1G"] {
            let err = parse_memory_mb(raw).unwrap_err();
            assert!(
                !matches!(err, ManifestError::Token(_) | ManifestError::NotFound { .. }),
                "{}",
                raw
            );
        }
    }

    #[test]
    fn test_optional_memory() {
        assert_eq!(optional_memory_mb("").unwrap(), None);
        assert_eq!(optional_memory_mb("0").unwrap(), None);
        assert_eq!(optional_memory_mb("-5M").unwrap(), None);
        assert_eq!(optional_memory_mb("1G").unwrap(), Some(1024));
        assert!(optional_memory_mb("big").is_err());
    }

    #[test]
    fn test_counts() {
        assert_eq!(parse_count("instances", "").unwrap(), None);
        assert_eq!(parse_count("instances", "  ").unwrap(), None);
        assert_eq!(parse_count("instances", "0").unwrap(), None);
        assert_eq!(parse_count("instances", "-2").unwrap(), None);
        assert_eq!(parse_count("instances", "3").unwrap(), Some(3));
        assert!(matches!(
            parse_count("timeout", "60s"),
            Err(ManifestError::InvalidValue { field: "timeout", .. })
        ));
    }
}
