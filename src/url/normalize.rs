use crate::url::scope::CrawlScope;
use crate::{UrlError, UrlResult};
use url::Url;

/// Reference prefixes that never point at a fetchable resource
const REJECTED_PREFIXES: &[&str] = &["mailto:", "javascript:", "tel:", "data:"];

/// Validates and normalizes the root URL of a crawl
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace and parse; reject if malformed
/// 2. Reject any scheme other than `http` and `https`
/// 3. Reject URLs without a host
/// 4. Drop the fragment and query string (they are not part of a resource's identity)
///
/// # Examples
///
/// ```
/// use site_mirror::url::validate_root_url;
///
/// let url = validate_root_url(" https://example.com/docs?page=2#top ").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/docs");
///
/// assert!(validate_root_url("ftp://example.com/").is_err());
/// ```
pub fn validate_root_url(raw: &str) -> UrlResult<Url> {
    let mut url = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    strip_identity_noise(&mut url);
    Ok(url)
}

/// Removes the fragment and query string from a URL in place
///
/// Two URLs that differ only in these parts are the same resource for the
/// mirror. Query-driven pages collapse into one file as a consequence.
pub fn strip_identity_noise(url: &mut Url) {
    url.set_fragment(None);
    url.set_query(None);
}

/// Normalizes a raw link reference found in a document
///
/// The reference is resolved against the URL of the document it appears in,
/// so absolute, protocol-relative (`//host/x`), root-relative (`/x`) and
/// path-relative (`x`, `../x`) forms are all supported.
///
/// Returns `None` when the reference is rejected:
/// - empty or fragment-only
/// - `mailto:`, `javascript:`, `tel:` or `data:` references
/// - unparseable, or resolving to a non-HTTP(S) URL
/// - a host outside the crawl scope
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_mirror::url::{normalize_link, CrawlScope};
///
/// let base = Url::parse("https://example.com/docs/").unwrap();
/// let scope = CrawlScope::from_root(&base).unwrap();
///
/// let link = normalize_link("guide?x=1#intro", &base, &scope).unwrap();
/// assert_eq!(link.as_str(), "https://example.com/docs/guide");
///
/// assert!(normalize_link("https://other.com/", &base, &scope).is_none());
/// ```
pub fn normalize_link(raw: &str, base: &Url, scope: &CrawlScope) -> Option<Url> {
    let raw = raw.trim();

    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }

    let lowered = raw.to_ascii_lowercase();
    if REJECTED_PREFIXES.iter().any(|p| lowered.starts_with(p)) {
        return None;
    }

    let mut url = base.join(raw).ok()?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    if !scope.contains(&url) {
        tracing::trace!("Rejecting out-of-scope link {}", url);
        return None;
    }

    strip_identity_noise(&mut url);
    Some(url)
}
