use crate::utils::error::{EsgError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field_name: &str, value: impl ToString, reason: impl Into<String>) -> EsgError {
    EsgError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Base URL of the CVM open-data directory: absolute http(s) with a host,
/// and no query or fragment since file names are appended to it.
pub fn validate_portal_url(field_name: &str, url: &str) -> Result<()> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| invalid(field_name, url, format!("not an absolute URL ({})", e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(
            field_name,
            url,
            format!("CVM data must be fetched over http(s), not {}", parsed.scheme()),
        ));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(invalid(field_name, url, "URL has no host"));
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(invalid(
            field_name,
            url,
            "catalog file names are appended to this URL, drop the query/fragment",
        ));
    }
    Ok(())
}

/// Temp directory for downloads and extracted files. It may not exist yet,
/// but it cannot be an existing regular file.
pub fn validate_temp_dir(field_name: &str, path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(invalid(field_name, path, "temp directory cannot be empty"));
    }
    if path.contains('\0') {
        return Err(invalid(field_name, path, "temp directory contains a NUL byte"));
    }
    if std::path::Path::new(path).is_file() {
        return Err(invalid(field_name, path, "points to a file, expected a directory"));
    }
    Ok(())
}

/// Accepts `sqlite:` URLs only, including `sqlite::memory:`.
pub fn validate_database_url(field_name: &str, url: &str) -> Result<()> {
    validate_non_empty_string(field_name, url)?;
    if !url.starts_with("sqlite:") {
        return Err(EsgError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url.to_string(),
            reason: "Only sqlite: database URLs are supported".to_string(),
        });
    }
    Ok(())
}

pub fn validate_at_least(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(invalid(field_name, value, format!("must be at least {}", min_value)));
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(EsgError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_one_of(field_name: &str, value: &str, allowed: &[&str]) -> Result<()> {
    let normalized = value.trim().to_ascii_lowercase();
    if !allowed.contains(&normalized.as_str()) {
        return Err(EsgError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Expected one of: {}", allowed.join(", ")),
        });
    }
    Ok(())
}
