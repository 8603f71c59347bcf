//! Integration tests for the mirror
//!
//! These tests use wiremock to create mock HTTP servers and run the full
//! mirror cycle end-to-end into a temporary output directory.

use site_mirror::{local_path_for, mirror, Mirror, MirrorError, MirrorOptions};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates test options rooted at `root` writing into `dir`
fn create_test_options(root: &str, dir: &Path, max_depth: u32) -> MirrorOptions {
    MirrorOptions {
        root_url: root.to_string(),
        max_depth,
        output_dir: dir.to_path_buf(),
        workers: 4,
        timeout: Duration::from_secs(5),
        ..MirrorOptions::default()
    }
}

/// Mounts an HTML page that must be requested exactly `times` times
async fn mount_html(server: &MockServer, route: &str, body: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html"))
        .expect(times)
        .mount(server)
        .await;
}

/// Reads a mirrored file by the URL it was fetched from
fn read_mirrored(dir: &Path, server: &MockServer, route: &str) -> Vec<u8> {
    let url = Url::parse(&format!("{}{}", server.uri(), route)).unwrap();
    std::fs::read(dir.join(local_path_for(&url))).unwrap()
}

#[tokio::test]
async fn test_end_to_end_depth_one() {
    let server = MockServer::start().await;
    let other = MockServer::start().await;

    // Same port space, different host: out of scope
    let other_url = other.uri().replace("127.0.0.1", "localhost");

    mount_html(
        &server,
        "/",
        &format!(
            r#"<html><body><a href="/a.html">A</a><a href="{}/x">Other</a></body></html>"#,
            other_url
        ),
        1,
    )
    .await;
    mount_html(&server, "/a.html", r#"<a href="/b.html">B</a>"#, 1).await;
    mount_html(&server, "/b.html", "<p>too deep</p>", 0).await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&other)
        .await;

    let dir = TempDir::new().unwrap();
    let report = mirror(create_test_options(&server.uri(), dir.path(), 1))
        .await
        .unwrap();

    assert_eq!(report.totals.resources_fetched, 2);
    assert_eq!(report.resources_stored, 2);
    assert_eq!(report.totals.tasks_failed, 0);

    let root = String::from_utf8(read_mirrored(dir.path(), &server, "/")).unwrap();
    assert!(root.contains(r#"href="a.html""#), "{}", root);
    assert!(root.contains(&format!(r#"href="{}/x""#, other_url)));

    // Documents at max depth are stored as fetched
    let a = String::from_utf8(read_mirrored(dir.path(), &server, "/a.html")).unwrap();
    assert_eq!(a, r#"<a href="/b.html">B</a>"#);
}

#[tokio::test]
async fn test_depth_zero_fetches_only_root() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/",
        r#"<a href="/a">A</a><a href="/b">B</a><img src="/c.png">"#,
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let report = mirror(create_test_options(&server.uri(), dir.path(), 0))
        .await
        .unwrap();

    assert_eq!(report.totals.resources_fetched, 1);
    assert_eq!(report.totals.links_enqueued, 1);
    assert_eq!(report.totals.documents_rewritten, 0);

    // The root is not expanded, so it is not rewritten either
    let root = String::from_utf8(read_mirrored(dir.path(), &server, "/")).unwrap();
    assert!(root.contains(r#"href="/a""#));
}

#[tokio::test]
async fn test_dead_link_does_not_abort_crawl() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/",
        r#"<a href="/missing">dead</a><a href="/ok">ok</a>"#,
        1,
    )
    .await;
    mount_html(&server, "/ok", "<p>fine</p>", 1).await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let report = Mirror::new(create_test_options(&server.uri(), dir.path(), 1))
        .unwrap()
        .run()
        .await;

    assert_eq!(report.totals.tasks_completed, 2);
    assert_eq!(report.totals.tasks_failed, 1);
    assert_eq!(report.error_count, 1);
    assert!(!report.is_success());

    assert_eq!(read_mirrored(dir.path(), &server, "/ok"), b"<p>fine</p>");

    match report.into_result() {
        Err(MirrorError::HttpStatus { status, url }) => {
            assert_eq!(status, 404);
            assert!(url.ends_with("/missing"));
        }
        other => panic!("expected HttpStatus, got {:?}", other.map(|r| r.totals)),
    }
}

#[tokio::test]
async fn test_each_url_fetched_at_most_once() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/",
        r#"<a href="/a">A</a><a href="/b">B</a><a href="/a#again">A</a>"#,
        1,
    )
    .await;
    mount_html(&server, "/a", r#"<a href="/">home</a><a href="/b?x=1">B</a>"#, 1).await;
    mount_html(&server, "/b", r#"<a href="/a">A</a><a href="/c">C</a>"#, 1).await;
    mount_html(&server, "/c", r#"<a href="/">home</a><a href="/b">B</a>"#, 1).await;

    let dir = TempDir::new().unwrap();
    let mut options = create_test_options(&server.uri(), dir.path(), 5);
    options.workers = 8;

    let report = mirror(options).await.unwrap();

    assert_eq!(report.totals.resources_fetched, 4);
    assert_eq!(report.totals.links_enqueued, 4);
    assert_eq!(report.totals.tasks_completed, 4);
}

#[tokio::test]
async fn test_invalid_root_scheme_is_fatal() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");

    let result = mirror(create_test_options("ftp://example.com/", &out, 1)).await;

    match result {
        Err(e) => {
            assert!(matches!(e, MirrorError::InvalidRootUrl(_)));
            assert!(e.is_fatal());
        }
        Ok(_) => panic!("ftp root must be rejected"),
    }
    assert!(!out.exists());
}

#[tokio::test]
async fn test_cancelled_run_does_no_network_io() {
    let server = MockServer::start().await;
    mount_html(&server, "/", r#"<a href="/a">A</a>"#, 0).await;

    let dir = TempDir::new().unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = Mirror::new(create_test_options(&server.uri(), dir.path(), 2))
        .unwrap()
        .run_with_cancellation(cancel)
        .await;

    assert_eq!(report.totals.tasks_skipped, 1);
    assert_eq!(report.totals.resources_fetched, 0);
    assert!(matches!(report.first_error, Some(MirrorError::Cancelled)));
}

#[tokio::test]
async fn test_assets_are_stored_and_referenced_locally() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/",
        r#"<html><head><link rel="stylesheet" href="/css/site.css"></head>
        <body><img src="/img/logo.png"></body></html>"#,
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/css/site.css"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("body{}", "text/css"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x89, 0x50, 0x4e, 0x47], "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let report = mirror(create_test_options(&server.uri(), dir.path(), 1))
        .await
        .unwrap();

    assert_eq!(report.totals.resources_fetched, 3);
    assert_eq!(report.totals.documents_rewritten, 1);
    assert_eq!(report.totals.links_rewritten, 2);

    assert_eq!(read_mirrored(dir.path(), &server, "/css/site.css"), b"body{}");
    assert_eq!(
        read_mirrored(dir.path(), &server, "/img/logo.png"),
        vec![0x89, 0x50, 0x4e, 0x47]
    );

    let root = String::from_utf8(read_mirrored(dir.path(), &server, "/")).unwrap();
    assert!(root.contains(r#"href="css/site.css""#));
    assert!(root.contains(r#"src="img/logo.png""#));
}

#[tokio::test]
async fn test_relative_links_resolve_against_final_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/docs/"))
        .expect(1)
        .mount(&server)
        .await;
    mount_html(&server, "/docs/", r#"<a href="page">next</a>"#, 1).await;
    mount_html(&server, "/docs/page", "<p>page</p>", 1).await;

    let dir = TempDir::new().unwrap();
    let root = format!("{}/start", server.uri());
    let report = mirror(create_test_options(&root, dir.path(), 1))
        .await
        .unwrap();

    assert_eq!(report.totals.resources_fetched, 2);

    let start = String::from_utf8(read_mirrored(dir.path(), &server, "/start")).unwrap();
    assert!(start.contains(r#"href="docs/page.html""#), "{}", start);
    assert_eq!(read_mirrored(dir.path(), &server, "/docs/page"), b"<p>page</p>");
}

#[tokio::test]
async fn test_escaped_links_resolve_to_files_on_disk() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/",
        r#"<a href="/my%20page">spaced</a><a href="/caf%C3%A9">accented</a>"#,
        1,
    )
    .await;
    mount_html(&server, "/my%20page", "<p>spaced</p>", 1).await;
    mount_html(&server, "/caf%C3%A9", "<p>accented</p>", 1).await;

    let dir = TempDir::new().unwrap();
    let report = mirror(create_test_options(&server.uri(), dir.path(), 1))
        .await
        .unwrap();
    assert_eq!(report.totals.resources_fetched, 3);
    assert_eq!(report.totals.tasks_failed, 0);

    let root_url = Url::parse(&format!("{}/", server.uri())).unwrap();
    let root_file = dir.path().join(local_path_for(&root_url));
    let root = String::from_utf8(std::fs::read(&root_file).unwrap()).unwrap();

    // Open the mirrored root the way a browser would and follow each link
    let base = Url::from_file_path(&root_file).unwrap();
    for (href, body) in [("my%20page.html", "<p>spaced</p>"), ("caf%C3%A9.html", "<p>accented</p>")] {
        assert!(root.contains(&format!(r#"href="{}""#, href)), "{}", root);

        let target = base.join(href).unwrap().to_file_path().unwrap();
        assert!(target.exists(), "{} does not exist", target.display());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), body);
    }
}
