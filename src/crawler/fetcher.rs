//! HTTP fetcher implementation
//!
//! This module handles all network access for the mirror:
//! - Building the shared HTTP client from the run options
//! - Fetch-or-return-cached for a single URL through the `ResourceStore`
//! - Error classification (transport error, timeout, non-2xx status)
//!
//! There are no retries. A failed URL is reported once and its branch stops.

use crate::config::MirrorOptions;
use crate::storage::{Resource, ResourceStore};
use crate::MirrorError;
use reqwest::{header::CONTENT_TYPE, redirect::Policy, Client};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Upper bound on the connect phase of a request
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum number of redirects followed per request
const MAX_REDIRECTS: usize = 10;

/// Result of a successful fetch
#[derive(Debug, Clone)]
pub struct Fetched {
    /// The stored resource
    pub resource: Arc<Resource>,

    /// True if the resource was served from the store without network I/O
    pub from_cache: bool,
}

/// Builds an HTTP client with the run's timeout and user agent
///
/// # Example
///
/// ```no_run
/// use site_mirror::config::MirrorOptions;
/// use site_mirror::crawler::build_http_client;
///
/// let options = MirrorOptions::new("https://example.com/");
/// let client = build_http_client(&options).unwrap();
/// ```
pub fn build_http_client(options: &MirrorOptions) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(options.user_agent.clone())
        .timeout(options.timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(options.timeout))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches resources, consulting the store before touching the network
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    store: Arc<ResourceStore>,
}

impl Fetcher {
    /// Creates a fetcher over a client and a store
    pub fn new(client: Client, store: Arc<ResourceStore>) -> Self {
        Self { client, store }
    }

    /// The store this fetcher reads from and saves into
    pub fn store(&self) -> &Arc<ResourceStore> {
        &self.store
    }

    /// Returns the stored resource for `url`, fetching and saving it if needed
    ///
    /// # Request Flow
    ///
    /// 1. Consult the store; a hit returns with `from_cache = true`
    /// 2. GET the URL with the configured timeout
    /// 3. Any transport error or non-2xx status is returned as an error
    /// 4. Build a `Resource` from the body and Content-Type header
    /// 5. Save it through the store and return it with `from_cache = false`
    pub async fn fetch(&self, url: &Url) -> Result<Fetched, MirrorError> {
        if let Some(resource) = self.store.get(url) {
            tracing::debug!("Cache hit for {}", url);
            return Ok(Fetched {
                resource,
                from_cache: true,
            });
        }

        let (body, content_type, final_url) = self.get_content(url).await?;
        let mut resource = Resource::new(url.clone(), body, content_type);
        resource.base_url = final_url;

        let resource = self.store.save(resource).await?;
        tracing::debug!(
            "Fetched {} ({} bytes, {})",
            url,
            resource.content.len(),
            if resource.content_type.is_empty() {
                "no content-type"
            } else {
                resource.content_type.as_str()
            }
        );

        Ok(Fetched {
            resource,
            from_cache: false,
        })
    }

    /// Like `fetch`, but gives up as soon as `cancel` fires
    pub async fn fetch_with_cancellation(
        &self,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<Fetched, MirrorError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(MirrorError::Cancelled),
            result = self.fetch(url) => result,
        }
    }

    /// Performs the GET and returns body, Content-Type and final URL
    async fn get_content(&self, url: &Url) -> Result<(Vec<u8>, String, Url), MirrorError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MirrorError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let final_url = response.url().clone();

        let body = response
            .bytes()
            .await
            .map_err(|e| classify_error(url, e))?;

        Ok((body.to_vec(), content_type, final_url))
    }
}

/// Maps a transport error onto the mirror's error taxonomy
fn classify_error(url: &Url, error: reqwest::Error) -> MirrorError {
    if error.is_timeout() {
        MirrorError::Timeout {
            url: url.to_string(),
        }
    } else {
        MirrorError::Fetch {
            url: url.to_string(),
            source: error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(dir: &TempDir) -> Fetcher {
        let options = MirrorOptions {
            timeout: Duration::from_secs(5),
            ..MirrorOptions::default()
        };
        let client = build_http_client(&options).unwrap();
        let store = Arc::new(ResourceStore::open(dir.path()).unwrap());
        Fetcher::new(client, store)
    }

    #[test]
    fn test_build_http_client() {
        let options = MirrorOptions::new("https://example.com/");
        assert!(build_http_client(&options).is_ok());
    }

    #[tokio::test]
    async fn test_second_fetch_served_from_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html>OK</html>", "text/html"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let fetcher = fetcher(&dir);
        let url = Url::parse(&format!("{}/ok", server.uri())).unwrap();

        let first = fetcher.fetch(&url).await.unwrap();
        assert!(!first.from_cache);
        assert!(first.resource.is_document);
        assert_eq!(first.resource.content, b"<html>OK</html>");

        let second = fetcher.fetch(&url).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.resource.local_path, first.resource.local_path);

        assert!(dir.path().join(&first.resource.local_path).is_file());
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let fetcher = fetcher(&dir);
        let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();

        let result = fetcher.fetch(&url).await;
        assert!(matches!(
            result,
            Err(MirrorError::HttpStatus { status: 404, .. })
        ));
        assert!(fetcher.store().get(&url).is_none());
    }

    #[tokio::test]
    async fn test_non_html_resource() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/logo.png"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x89, 0x50, 0x4e], "image/png"))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let fetcher = fetcher(&dir);
        let url = Url::parse(&format!("{}/logo.png", server.uri())).unwrap();

        let fetched = fetcher.fetch(&url).await.unwrap();
        assert!(!fetched.resource.is_document);
        assert_eq!(fetched.resource.content_type, "image/png");
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("late", "text/html")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let options = MirrorOptions {
            timeout: Duration::from_millis(200),
            ..MirrorOptions::default()
        };
        let client = build_http_client(&options).unwrap();
        let fetcher = Fetcher::new(client, Arc::new(ResourceStore::open(dir.path()).unwrap()));
        let url = Url::parse(&format!("{}/slow", server.uri())).unwrap();

        let result = fetcher.fetch(&url).await;
        assert!(matches!(result, Err(MirrorError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_fetch_returns_promptly() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("late", "text/html")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let fetcher = fetcher(&dir);
        let url = Url::parse(&format!("{}/slow", server.uri())).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = fetcher.fetch_with_cancellation(&url, &cancel).await;
        assert!(matches!(result, Err(MirrorError::Cancelled)));
    }
}
