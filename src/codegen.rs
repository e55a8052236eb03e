use sha2::{Digest, Sha256};
use url::Url;

use crate::error::ShortenError;

/// Length of a short code: a hex-encoded SHA-256 digest.
pub const CODE_LEN: usize = 64;

/// Derive the short code for an already-validated URL.
///
/// The code is the lowercase hex SHA-256 of the exact input string, so equal
/// inputs always collapse to the same code. No canonicalization happens here.
pub fn generate_code(original_url: &str) -> String {
    let digest = Sha256::digest(original_url.as_bytes());
    format!("{digest:x}")
}

/// Whether `code` has the shape `generate_code` produces.
pub fn is_short_code(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Turn create input into the URL string that gets hashed and stored.
///
/// Accepts either a full `http(s)://` URL or a bare domain name, which is
/// promoted to `https://{domain}`. The returned string is the trimmed input,
/// not `Url`'s re-serialization, so `https://example.com` stays without a
/// trailing slash.
pub fn normalize_input(
    original_url: Option<&str>,
    domain_name: Option<&str>,
) -> Result<String, ShortenError> {
    let candidate = match (
        original_url.map(str::trim).filter(|s| !s.is_empty()),
        domain_name.map(str::trim).filter(|s| !s.is_empty()),
    ) {
        (Some(url), _) => url.to_owned(),
        (None, Some(domain)) => format!("https://{domain}"),
        (None, None) => {
            return Err(ShortenError::Validation(
                "originalUrl or domainName is required".into(),
            ))
        }
    };

    validate_url(&candidate)?;
    Ok(candidate)
}

/// Check that `url` is a well-formed absolute `http(s)` URL with a host.
pub fn validate_url(url: &str) -> Result<(), ShortenError> {
    let parsed =
        Url::parse(url).map_err(|e| ShortenError::Validation(format!("malformed URL: {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ShortenError::Validation(
            "URL must start with http:// or https://".into(),
        ));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(ShortenError::Validation("URL must have a host".into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn same_url_always_yields_same_code() {
        let a = generate_code("https://example.com");
        let b = generate_code("https://example.com");
        assert_eq!(a, b);
        assert_eq!(a.len(), CODE_LEN);
    }

    #[test]
    fn short_code_shape() {
        assert!(is_short_code(&generate_code("https://example.com")));
        assert!(!is_short_code("favicon.ico"));
        assert!(!is_short_code(&"A".repeat(CODE_LEN)));
    }

    #[test]
    fn known_digest() {
        // sha256("https://example.com")
        assert_eq!(
            generate_code("https://example.com"),
            "100680ad546ce6a577f42f52df33b4cfdca756859e664b8d7de329b150d09ce9"
        );
    }

    #[test]
    fn distinct_urls_yield_distinct_codes() {
        let codes: HashSet<String> = (0..10_000)
            .map(|i| generate_code(&format!("https://example.com/page/{i}?ref={}", i * 7)))
            .collect();
        assert_eq!(codes.len(), 10_000);
    }

    #[test]
    fn trailing_slash_is_a_different_url() {
        assert_ne!(
            generate_code("https://example.com"),
            generate_code("https://example.com/")
        );
    }

    #[test]
    fn normalize_prefers_original_url() {
        let url = normalize_input(Some("  https://rust-lang.org  "), Some("ignored.dev")).unwrap();
        assert_eq!(url, "https://rust-lang.org");
    }

    #[test]
    fn normalize_promotes_domain_name() {
        let url = normalize_input(None, Some("example.com")).unwrap();
        assert_eq!(url, "https://example.com");
    }

    #[test]
    fn normalize_rejects_missing_input() {
        assert!(matches!(
            normalize_input(None, Some("   ")),
            Err(ShortenError::Validation(_))
        ));
    }

    #[test]
    fn normalize_rejects_bad_scheme_and_garbage() {
        assert!(matches!(
            normalize_input(Some("ftp://example.com"), None),
            Err(ShortenError::Validation(_))
        ));
        assert!(matches!(
            normalize_input(Some("not a url"), None),
            Err(ShortenError::Validation(_))
        ));
        assert!(matches!(
            normalize_input(None, Some("exa mple.com")),
            Err(ShortenError::Validation(_))
        ));
    }
}
