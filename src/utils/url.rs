//! URL utilities for consistent URL handling
//!
//! This module provides utilities for normalizing URLs to prevent issues
//! with trailing slashes when constructing API endpoints.

/// Normalize a base URL by removing trailing slashes
///
/// This ensures consistent URL construction when appending endpoints,
/// preventing double slashes in the final URLs.
///
/// # Examples
///
/// ```
/// use chatgate::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("https://api.example.com/v1"), "https://api.example.com/v1");
/// assert_eq!(normalize_base_url("https://api.example.com/v1/"), "https://api.example.com/v1");
/// assert_eq!(normalize_base_url("https://api.example.com/v1///"), "https://api.example.com/v1");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Construct a complete API endpoint URL from a base URL and endpoint path
///
/// This function normalizes the base URL and safely appends the endpoint,
/// ensuring there are no double slashes in the result.
///
/// # Examples
///
/// ```
/// use chatgate::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://api.example.com/v1", "chat/completions"),
///     "https://api.example.com/v1/chat/completions"
/// );
/// assert_eq!(
///     construct_api_url("https://api.example.com/v1/", "chat/completions"),
///     "https://api.example.com/v1/chat/completions"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

/// Prefix a scheme onto a bare host, leaving URLs that already carry one untouched
///
/// Loopback hosts get `http://`, everything else `https://`. Trailing slashes are
/// removed either way.
///
/// # Examples
///
/// ```
/// use chatgate::utils::url::ensure_scheme;
///
/// assert_eq!(ensure_scheme("search.example.org/"), "https://search.example.org");
/// assert_eq!(ensure_scheme("localhost:8080"), "http://localhost:8080");
/// assert_eq!(ensure_scheme("http://10.0.0.2"), "http://10.0.0.2");
/// ```
pub fn ensure_scheme(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.contains("://") {
        return normalize_base_url(trimmed);
    }

    let host = trimmed.split(['/', ':']).next().unwrap_or_default();
    let scheme = if host == "localhost" || host.starts_with("127.") || host == "0.0.0.0" {
        "http"
    } else {
        "https"
    };
    normalize_base_url(&format!("{scheme}://{trimmed}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        // No trailing slash - should remain unchanged
        assert_eq!(
            normalize_base_url("https://api.example.com/v1"),
            "https://api.example.com/v1"
        );

        // Single trailing slash - should be removed
        assert_eq!(
            normalize_base_url("https://api.example.com/v1/"),
            "https://api.example.com/v1"
        );

        // Multiple trailing slashes - should all be removed
        assert_eq!(
            normalize_base_url("https://api.example.com/v1///"),
            "https://api.example.com/v1"
        );

        // Root URL with trailing slash
        assert_eq!(
            normalize_base_url("https://api.example.com/"),
            "https://api.example.com"
        );

        // Root URL without trailing slash
        assert_eq!(
            normalize_base_url("https://api.example.com"),
            "https://api.example.com"
        );

        // Empty string
        assert_eq!(normalize_base_url(""), "");

        // Just slashes
        assert_eq!(normalize_base_url("///"), "");
    }

    #[test]
    fn test_ensure_scheme() {
        assert_eq!(ensure_scheme("https://searx.be"), "https://searx.be");
        assert_eq!(ensure_scheme("searx.be"), "https://searx.be");
        assert_eq!(ensure_scheme("  searx.be/  "), "https://searx.be");
        assert_eq!(ensure_scheme("127.0.0.1:8888"), "http://127.0.0.1:8888");
        assert_eq!(ensure_scheme("localhost/searxng"), "http://localhost/searxng");
    }

    #[test]
    fn test_construct_api_url() {
        // Normal case - no trailing slash on base URL
        assert_eq!(
            construct_api_url("https://api.example.com/v1", "chat/completions"),
            "https://api.example.com/v1/chat/completions"
        );

        // Base URL with trailing slash
        assert_eq!(
            construct_api_url("https://api.example.com/v1/", "chat/completions"),
            "https://api.example.com/v1/chat/completions"
        );

        // Endpoint with leading slash
        assert_eq!(
            construct_api_url("https://api.example.com/v1", "/chat/completions"),
            "https://api.example.com/v1/chat/completions"
        );

        // Both base URL with trailing slash and endpoint with leading slash
        assert_eq!(
            construct_api_url("https://api.example.com/v1/", "/chat/completions"),
            "https://api.example.com/v1/chat/completions"
        );

        // Multiple trailing slashes on base URL
        assert_eq!(
            construct_api_url("https://api.example.com/v1///", "models"),
            "https://api.example.com/v1/models"
        );

        // Multiple leading slashes on endpoint
        assert_eq!(
            construct_api_url("https://api.example.com/v1", "///models"),
            "https://api.example.com/v1/models"
        );

        // Endpoint with a query string
        assert_eq!(
            construct_api_url(
                "https://generativelanguage.googleapis.com/",
                "v1beta/models/m:streamGenerateContent?alt=sse"
            ),
            "https://generativelanguage.googleapis.com/v1beta/models/m:streamGenerateContent?alt=sse"
        );
    }
}
