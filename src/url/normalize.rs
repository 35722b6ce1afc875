use crate::UrlError;
use url::Url;

/// Normalizes a URL into the canonical form used as identity everywhere
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Require an http:// or https:// scheme
/// 3. Lowercase the host
/// 4. Remove the fragment (everything after #)
/// 5. Canonicalize the trailing slash: a last path segment containing a dot
///    is file-like and kept verbatim; otherwise any trailing slash is
///    dropped. The root path stays `/`.
///
/// Two URLs are duplicates iff their normalized forms are equal.
///
/// # Examples
///
/// ```
/// use docmirror::url::normalize_url;
///
/// let url = normalize_url("https://DOCS.Example.com/en/docs/#intro").unwrap();
/// assert_eq!(url.as_str(), "https://docs.example.com/en/docs");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    // Lowercase the host
    if let Some(host) = url.host_str() {
        let lowered = host.to_lowercase();
        if lowered != host {
            url.set_host(Some(&lowered))
                .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;
        }
    } else {
        return Err(UrlError::MissingHost);
    }

    // Remove fragment
    url.set_fragment(None);

    // Canonicalize trailing slash
    let path = url.path().to_string();
    let canonical = canonicalize_trailing_slash(&path);
    if canonical != path {
        url.set_path(&canonical);
    }

    Ok(url)
}

/// Drops a trailing slash unless the path is the root or its last segment is
/// file-like (contains a dot)
fn canonicalize_trailing_slash(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    if path == "/" || !path.ends_with('/') {
        // Paths without a trailing slash are already canonical; a dotted last
        // segment never carries one in the first place.
        return path.to_string();
    }

    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }

    let last_segment = trimmed.rsplit('/').next().unwrap_or("");
    if last_segment.contains('.') {
        // File-like segment followed by a slash is unusual; keep the
        // slash-free form so /a/b.html/ and /a/b.html collapse together.
        return trimmed.to_string();
    }

    trimmed.to_string()
}

/// Extracts the lowercased host from a normalized URL
pub fn host_of(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}
