use url::Url;

pub const MAX_TARGET_LENGTH: usize = 2048;

/// Checks that `raw` is an absolute http(s) URL with a host and returns it trimmed.
pub fn validate_target_url(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err("url is required".to_string());
    }
    if trimmed.len() > MAX_TARGET_LENGTH {
        return Err(format!("url exceeds {MAX_TARGET_LENGTH} characters"));
    }

    let parsed = Url::parse(trimmed).map_err(|e| format!("{trimmed:?} is not an absolute url: {e}"))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme {other:?}, expected http or https")),
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err("url has no host".to_string());
    }

    Ok(trimmed.to_string())
}
