use crate::{UrlError, UrlResult};
use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_mirror::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks whether `host` is `base` itself or one of its subdomains
///
/// Comparison is case-insensitive. A subdomain must be separated by a dot, so
/// `notexample.com` is not inside `example.com`.
///
/// # Examples
///
/// ```
/// use site_mirror::url::is_same_or_subdomain;
///
/// assert!(is_same_or_subdomain("example.com", "example.com"));
/// assert!(is_same_or_subdomain("blog.Example.com", "example.com"));
/// assert!(!is_same_or_subdomain("notexample.com", "example.com"));
/// ```
pub fn is_same_or_subdomain(host: &str, base: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let base = base.to_ascii_lowercase();

    host == base || host.ends_with(&format!(".{}", base))
}

/// The set of hosts a crawl is allowed to visit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlScope {
    root_host: String,
}

impl CrawlScope {
    /// Builds the scope of a crawl rooted at `root`
    pub fn from_root(root: &Url) -> UrlResult<Self> {
        let root_host = extract_domain(root).ok_or(UrlError::MissingHost)?;
        Ok(Self { root_host })
    }

    /// The lowercase root host
    pub fn root_host(&self) -> &str {
        &self.root_host
    }

    /// Returns true if the host is the root host or a subdomain of it
    pub fn contains_host(&self, host: &str) -> bool {
        is_same_or_subdomain(host, &self.root_host)
    }

    /// Returns true if the URL's host is within the scope
    pub fn contains(&self, url: &Url) -> bool {
        url.host_str()
            .map(|host| self.contains_host(host))
            .unwrap_or(false)
    }
}
