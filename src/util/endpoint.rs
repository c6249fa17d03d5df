use thiserror::Error;
use url::Url;

/// Errors from endpoint and image-reference validation.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EndpointError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// A service base URL that would send credentials in clear text.
    #[error("Insecure base URL: HTTPS required (except localhost for testing)")]
    Insecure,
    /// An image reference that is neither http(s) nor an inline image.
    #[error("Unsupported image reference scheme: {0}")]
    UnsupportedScheme(String),
}

/// Validate the base URL of a service that receives an API key.
///
/// HTTPS is required; plain HTTP is accepted only for `localhost` and
/// `127.0.0.1`, which is what the mock servers in tests bind to. A trailing
/// slash is stripped so paths can be appended with `format!`.
pub fn require_secure_base(base: &str) -> Result<String, EndpointError> {
    let url = Url::parse(base).map_err(|e| EndpointError::InvalidUrl(e.to_string()))?;
    match url.scheme() {
        "https" => {}
        "http" => {
            let local = matches!(url.host_str(), Some("localhost") | Some("127.0.0.1"));
            if !local {
                tracing::error!(base_url = %base, "Rejecting non-HTTPS base URL");
                return Err(EndpointError::Insecure);
            }
            tracing::warn!(base_url = %base, "Using non-HTTPS base URL (localhost only)");
        }
        _ => return Err(EndpointError::Insecure),
    }
    Ok(base.trim_end_matches('/').to_string())
}

/// Validate an article image reference.
///
/// Accepts `http`/`https` URLs and inline `data:image/...` URIs, which is
/// what the image generator produces.
pub fn validate_image_ref(reference: &str) -> Result<(), EndpointError> {
    let trimmed = reference.trim();
    if trimmed.starts_with("data:image/") {
        return Ok(());
    }
    let url = Url::parse(trimmed).map_err(|e| EndpointError::InvalidUrl(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(EndpointError::UnsupportedScheme(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_base_accepted_and_trimmed() {
        assert_eq!(
            require_secure_base("https://firestore.googleapis.com/").unwrap(),
            "https://firestore.googleapis.com"
        );
    }

    #[test]
    fn test_plain_http_rejected() {
        assert_eq!(
            require_secure_base("http://evil.example.com"),
            Err(EndpointError::Insecure)
        );
    }

    #[test]
    fn test_localhost_http_allowed() {
        assert!(require_secure_base("http://127.0.0.1:8080").is_ok());
        assert!(require_secure_base("http://localhost:9000").is_ok());
    }

    #[test]
    fn test_other_schemes_rejected() {
        assert!(require_secure_base("ftp://example.com").is_err());
        assert!(require_secure_base("not a url").is_err());
    }

    #[test]
    fn test_image_refs() {
        assert!(validate_image_ref("https://images.example.com/a.jpg").is_ok());
        assert!(validate_image_ref("data:image/png;base64,AAAA").is_ok());
        assert!(matches!(
            validate_image_ref("file:///etc/passwd"),
            Err(EndpointError::UnsupportedScheme(_))
        ));
        assert!(validate_image_ref("").is_err());
    }
}
