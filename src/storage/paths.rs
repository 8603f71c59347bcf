use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use url::Url;

/// Bytes escaped when a local path segment is written back into an href
const HREF_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b':')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Upper bound on the length of a derived local path, in bytes
pub const MAX_LOCAL_PATH_LEN: usize = 300;

/// Derives the local path of a URL under the output root
///
/// # Derivation Steps
///
/// 1. Start from the lowercase host; a non-default port is appended as `_port`
/// 2. Split the URL path into segments and percent-decode each one; a decoded
///    `/`, `\` or NUL becomes `_`, and empty, `.` and `..` segments are dropped
/// 3. Empty or `/`-terminated paths get `index.html`
/// 4. A final segment without an extension gets `.html` (assumed to be a page)
/// 5. Join host and segments with `/`
/// 6. Truncate to `MAX_LOCAL_PATH_LEN` bytes on a character boundary
///
/// The result is a pure function of the URL. Distinct URLs can still collide,
/// for example `/a` and `/a.html`, or two long paths sharing a 300-byte prefix.
/// Because segments are decoded, the result names the file as it exists on
/// disk; use [`encode_href`] before placing it in a link.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_mirror::storage::local_path_for;
///
/// let url = Url::parse("https://example.com/").unwrap();
/// assert_eq!(local_path_for(&url), "example.com/index.html");
///
/// let url = Url::parse("https://example.com/docs/intro").unwrap();
/// assert_eq!(local_path_for(&url), "example.com/docs/intro.html");
/// ```
pub fn local_path_for(url: &Url) -> String {
    let mut host = url.host_str().unwrap_or_default().to_lowercase();
    if let Some(port) = url.port() {
        host.push('_');
        host.push_str(&port.to_string());
    }

    let path = url.path();
    let mut segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(decode_segment)
        .filter(|s| !s.is_empty() && s != "." && s != "..")
        .collect();

    if path.ends_with('/') || segments.is_empty() {
        segments.push("index.html".to_string());
    } else if let Some(last) = segments.last_mut() {
        if !last.contains('.') {
            last.push_str(".html");
        }
    }

    let mut local = format!("{}/{}", host, segments.join("/"));
    truncate_on_char_boundary(&mut local, MAX_LOCAL_PATH_LEN);
    local
}

fn decode_segment(segment: &str) -> String {
    percent_decode_str(segment)
        .decode_utf8_lossy()
        .replace(&['/', '\\', '\0'][..], "_")
}

/// Percent-encodes a `/`-separated local path for use as an href
///
/// Each segment is encoded on its own, so the separators survive and a
/// browser resolving the href lands on the decoded file name.
///
/// # Examples
///
/// ```
/// use site_mirror::storage::encode_href;
///
/// assert_eq!(encode_href("../docs/my page.html"), "../docs/my%20page.html");
/// ```
pub fn encode_href(local: &str) -> String {
    local
        .split('/')
        .map(|segment| utf8_percent_encode(segment, HREF_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn truncate_on_char_boundary(s: &mut String, max_len: usize) {
    if s.len() <= max_len {
        return;
    }
    let mut cut = max_len;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

/// Computes a `/`-separated reference from a document to a target
///
/// Both arguments are local paths under the output root. The result is
/// relative to the directory containing `from_document`.
///
/// # Examples
///
/// ```
/// use site_mirror::storage::relative_path;
///
/// assert_eq!(relative_path("example.com/index.html", "example.com/a.html"), "a.html");
/// assert_eq!(relative_path("example.com/docs/x.html", "example.com/img/y.png"), "../img/y.png");
/// ```
pub fn relative_path(from_document: &str, target: &str) -> String {
    let mut from_dir: Vec<&str> = from_document.split('/').filter(|s| !s.is_empty()).collect();
    from_dir.pop();
    let target_parts: Vec<&str> = target.split('/').filter(|s| !s.is_empty()).collect();

    let common = from_dir
        .iter()
        .zip(target_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = Vec::with_capacity(from_dir.len() - common + target_parts.len());
    parts.extend(std::iter::repeat("..").take(from_dir.len() - common));
    parts.extend(&target_parts[common..]);

    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Resolves a relative reference against the directory of a local document path
///
/// Returns `None` when the reference climbs above the output root.
pub(crate) fn resolve_local(from_document: &str, reference: &str) -> Option<String> {
    let mut parts: Vec<&str> = from_document.split('/').filter(|s| !s.is_empty()).collect();
    parts.pop();

    for segment in reference.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }

    Some(parts.join("/"))
}
