//! URL admission policy and deterministic local filenames
//!
//! Policy checks run in page workers before a link is offered to the
//! frontier; a rejected URL is recorded as skipped with the reason returned
//! here. Filenames derive from the normalized URL so repeated runs map the
//! same page to the same file.

use crate::config::PolicyConfig;
use crate::url::host_of;
use sha2::{Digest, Sha256};
use url::Url;

/// Why the admission policy rejected a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyVerdict {
    /// The URL may be admitted to the frontier
    Admit,
    /// The URL's host is not on the allow-list
    WrongDomain,
    /// The URL's path ends in an excluded extension
    ExcludedExtension(String),
    /// The URL matches an excluded substring pattern
    ExcludedPattern(String),
    /// The URL's path is outside the allowed prefixes
    OutsidePathPrefixes,
}

impl PolicyVerdict {
    /// Short reason string recorded with skipped URLs
    pub fn reason(&self) -> String {
        match self {
            PolicyVerdict::Admit => "admitted".to_string(),
            PolicyVerdict::WrongDomain => "wrong domain".to_string(),
            PolicyVerdict::ExcludedExtension(ext) => format!("excluded extension {}", ext),
            PolicyVerdict::ExcludedPattern(pat) => format!("excluded pattern {}", pat),
            PolicyVerdict::OutsidePathPrefixes => "outside allowed path prefixes".to_string(),
        }
    }
}

/// Evaluates a normalized URL against the admission policy
pub fn evaluate(url: &Url, policy: &PolicyConfig) -> PolicyVerdict {
    let host = match host_of(url) {
        Some(h) => h,
        None => return PolicyVerdict::WrongDomain,
    };

    if !policy.allowed_domains.iter().any(|d| d == &host) {
        return PolicyVerdict::WrongDomain;
    }

    let path = url.path().to_lowercase();
    for ext in &policy.excluded_extensions {
        if path.ends_with(ext.as_str()) {
            return PolicyVerdict::ExcludedExtension(ext.clone());
        }
    }

    let full = url.as_str().to_lowercase();
    for pattern in &policy.excluded_patterns {
        if full.contains(pattern.as_str()) {
            return PolicyVerdict::ExcludedPattern(pattern.clone());
        }
    }

    if !policy.allowed_path_prefixes.is_empty() {
        let path = url.path();
        let allowed = path == "/"
            || policy
                .allowed_path_prefixes
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str()));
        if !allowed {
            return PolicyVerdict::OutsidePathPrefixes;
        }
    }

    PolicyVerdict::Admit
}

/// Path prefixes stripped before building a filename, so common
/// documentation roots produce short names
const STRIP_PREFIXES: &[&str] = &["en/api/", "en/docs/", "api/", "docs/"];

/// Longest filename produced before truncation
const MAX_FILENAME_LEN: usize = 100;

/// Derives a deterministic filename stem from a normalized URL
///
/// The URL path is flattened to `a_b_c` form with non-portable characters
/// replaced. Replacement can alias distinct URLs (`/a/logo.png` and
/// `/a_logo.png` would both flatten to `a_logo.png`), so any name whose
/// sanitization was lossy carries a short SHA-256 digest of the full URL
/// before its extension. URLs whose path sanitizes to nothing fall back to
/// the digest alone.
pub fn file_name_for(url: &Url) -> String {
    let mut path = url.path().trim_matches('/').to_string();

    if path.is_empty() {
        return "index".to_string();
    }

    for prefix in STRIP_PREFIXES {
        if let Some(rest) = path.strip_prefix(prefix) {
            path = rest.to_string();
            break;
        }
    }

    let mut name: String = path
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    // Collapse runs of underscores left by replaced separators
    while name.contains("__") {
        name = name.replace("__", "_");
    }
    name = name.trim_matches('_').to_string();

    if name.is_empty() || name == "." {
        return format!("page_{}", short_digest(url));
    }

    let (mut stem, ext) = split_extension(&name);

    if name != path {
        let digest = short_digest(url);
        let budget = MAX_FILENAME_LEN - ext.len() - digest.len() - 1;
        if stem.len() > budget {
            stem.truncate(budget);
        }
        return format!("{}_{}{}", stem, digest, ext);
    }

    if name.len() > MAX_FILENAME_LEN {
        stem.truncate(MAX_FILENAME_LEN - ext.len());
        return format!("{}{}", stem, ext);
    }

    name
}

/// First eight hex characters of the URL's SHA-256
fn short_digest(url: &Url) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_str().as_bytes());
    hex::encode(hasher.finalize())[..8].to_string()
}

/// Splits `a_b.png` into (`a_b`, `.png`); names without a dot, or with an
/// implausibly long trailing segment, keep an empty extension
fn split_extension(name: &str) -> (String, String) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && name.len() - idx <= 10 => {
            (name[..idx].to_string(), name[idx..].to_string())
        }
        _ => (name.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyConfig;

    fn test_policy() -> PolicyConfig {
        PolicyConfig {
            allowed_domains: vec!["docs.example.com".to_string()],
            excluded_extensions: vec![".pdf".to_string(), ".zip".to_string()],
            excluded_patterns: vec!["/legal".to_string(), "?q=".to_string()],
            allowed_path_prefixes: vec!["/en/docs/".to_string(), "/en/api/".to_string()],
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_allowed_url_admitted() {
        let verdict = evaluate(&url("https://docs.example.com/en/docs/intro"), &test_policy());
        assert_eq!(verdict, PolicyVerdict::Admit);
    }

    #[test]
    fn test_root_admitted_despite_prefixes() {
        let verdict = evaluate(&url("https://docs.example.com/"), &test_policy());
        assert_eq!(verdict, PolicyVerdict::Admit);
    }

    #[test]
    fn test_wrong_domain_rejected() {
        let verdict = evaluate(&url("https://github.com/example"), &test_policy());
        assert_eq!(verdict, PolicyVerdict::WrongDomain);
    }

    #[test]
    fn test_excluded_extension_rejected() {
        let verdict = evaluate(
            &url("https://docs.example.com/en/docs/manual.pdf"),
            &test_policy(),
        );
        assert!(matches!(verdict, PolicyVerdict::ExcludedExtension(_)));
    }

    #[test]
    fn test_excluded_pattern_rejected() {
        let verdict = evaluate(
            &url("https://docs.example.com/legal/terms"),
            &test_policy(),
        );
        assert!(matches!(verdict, PolicyVerdict::ExcludedPattern(_)));
    }

    #[test]
    fn test_outside_prefixes_rejected() {
        let verdict = evaluate(
            &url("https://docs.example.com/blog/announcement"),
            &test_policy(),
        );
        assert_eq!(verdict, PolicyVerdict::OutsidePathPrefixes);
    }

    #[test]
    fn test_empty_prefixes_admit_any_path() {
        let mut policy = test_policy();
        policy.allowed_path_prefixes.clear();
        let verdict = evaluate(&url("https://docs.example.com/anywhere"), &policy);
        assert_eq!(verdict, PolicyVerdict::Admit);
    }

    #[test]
    fn test_filename_root_is_index() {
        assert_eq!(file_name_for(&url("https://docs.example.com/")), "index");
    }

    #[test]
    fn test_filename_strips_docs_prefix() {
        assert_eq!(
            file_name_for(&url("https://docs.example.com/en/docs/getting-started")),
            "getting-started"
        );
    }

    #[test]
    fn test_filename_flattens_path() {
        let name = file_name_for(&url("https://docs.example.com/en/api/messages/create"));
        // Flattening is lossy, so the name carries a disambiguating digest
        assert!(name.starts_with("messages_create_"));
        assert_eq!(name.len(), "messages_create_".len() + 8);
    }

    #[test]
    fn test_filename_collisions_disambiguated() {
        let a = file_name_for(&url("https://docs.example.com/a/logo.png"));
        let b = file_name_for(&url("https://docs.example.com/a_logo.png"));
        // Both flatten to a_logo.png without the digest
        assert_ne!(a, b);
        assert_eq!(b, "a_logo.png");
    }

    #[test]
    fn test_filename_digest_keeps_extension() {
        let name = file_name_for(&url("https://docs.example.com/assets/logo.png"));
        assert!(name.starts_with("assets_logo_"));
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn test_filename_sanitizes_odd_characters() {
        let name = file_name_for(&url("https://docs.example.com/a%20b/c"));
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric()
            || c == '.'
            || c == '-'
            || c == '_'));
    }

    #[test]
    fn test_filename_hash_fallback() {
        let name = file_name_for(&url("https://docs.example.com/%2F%2F/"));
        // Either sanitized content or the hash fallback; never empty
        assert!(!name.is_empty());
    }

    #[test]
    fn test_filename_length_capped() {
        let long = format!("https://docs.example.com/{}", "a/".repeat(200));
        let name = file_name_for(&url(&long));
        assert!(name.len() <= MAX_FILENAME_LEN);
    }

    #[test]
    fn test_filename_deterministic() {
        let u = url("https://docs.example.com/en/docs/tools/use");
        assert_eq!(file_name_for(&u), file_name_for(&u));
    }

    #[test]
    fn test_verdict_reasons() {
        assert_eq!(PolicyVerdict::WrongDomain.reason(), "wrong domain");
        assert!(PolicyVerdict::ExcludedExtension(".pdf".to_string())
            .reason()
            .contains(".pdf"));
    }
}
