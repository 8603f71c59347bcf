//! Document rewriter
//!
//! Replaces link attribute values in a saved HTML document with paths relative
//! to the document's own local path. Targets are located with the store's
//! deterministic path derivation, so a link can be rewritten before the
//! resource it points at has been downloaded.
//!
//! Rewriting streams through `lol_html`; markup that is not touched is kept
//! byte-for-byte.

use crate::crawler::parser::{LinkParser, LINK_ATTRIBUTES};
use crate::storage::paths::resolve_local;
use crate::storage::{encode_href, local_path_for, relative_path, Resource, ResourceStore};
use crate::MirrorError;
use lol_html::{element, HtmlRewriter, Settings};
use std::cell::Cell;
use std::collections::HashSet;
use url::Url;

/// Outcome of rewriting one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// No attribute needed a new value; nothing was written
    Unchanged,

    /// This many attributes were rewritten and the document was re-saved
    Rewritten(usize),
}

/// Rewrites the links of one document
pub struct DocumentRewriter<'a> {
    parser: &'a LinkParser,
    document: &'a Resource,
    targets: HashSet<&'a str>,
}

impl<'a> DocumentRewriter<'a> {
    /// Creates a rewriter for `document`, limited to the discovered `links`
    pub fn new(parser: &'a LinkParser, document: &'a Resource, links: &'a [Url]) -> Self {
        Self {
            parser,
            document,
            targets: links.iter().map(Url::as_str).collect(),
        }
    }

    /// Produces the rewritten document bytes
    ///
    /// # Returns
    ///
    /// * `Ok(Some(bytes))` - At least one attribute changed
    /// * `Ok(None)` - The document already references every target locally
    /// * `Err(String)` - The streaming rewriter failed
    pub fn rewrite(&self) -> Result<Option<(Vec<u8>, usize)>, String> {
        let changed = Cell::new(0usize);
        let mut output = Vec::with_capacity(self.document.content.len());

        {
            let changed = &changed;
            let handlers: Vec<_> = LINK_ATTRIBUTES
                .iter()
                .map(|&(tag, attrs)| {
                    element!(tag, move |el| {
                        for attr in attrs.iter().copied() {
                            let Some(value) = el.get_attribute(attr) else {
                                continue;
                            };

                            let replacement = if attr == "srcset" {
                                self.rewrite_srcset(&value)
                            } else {
                                self.rewrite_reference(&value)
                            };

                            if let Some(new_value) = replacement {
                                el.set_attribute(attr, &new_value)?;
                                changed.set(changed.get() + 1);
                            }
                        }
                        Ok(())
                    })
                })
                .collect();

            let mut rewriter = HtmlRewriter::new(
                Settings {
                    element_content_handlers: handlers,
                    ..Settings::default()
                },
                |chunk: &[u8]| output.extend_from_slice(chunk),
            );

            rewriter
                .write(&self.document.content)
                .map_err(|e| e.to_string())?;
            rewriter.end().map_err(|e| e.to_string())?;
        }

        match changed.get() {
            0 => Ok(None),
            count => Ok(Some((output, count))),
        }
    }

    /// Computes the new value of a single link attribute
    ///
    /// Returns `None` when the value should stay as it is.
    pub fn rewrite_reference(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();

        if self.is_mirror_reference_to_other_host(trimmed) {
            return None;
        }

        let target = self.parser.normalize(trimmed, &self.document.base_url)?;
        if !self.targets.contains(target.as_str()) {
            return None;
        }

        let mut local = encode_href(&relative_path(
            &self.document.local_path,
            &local_path_for(&target),
        ));
        if let Some((_, fragment)) = trimmed.split_once('#') {
            local.push('#');
            local.push_str(fragment);
        }

        (local != raw).then_some(local)
    }

    /// Computes the new value of a `srcset` attribute
    ///
    /// Each candidate URL is rewritten on its own; descriptors are kept.
    pub fn rewrite_srcset(&self, raw: &str) -> Option<String> {
        let mut any_changed = false;
        let candidates: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|candidate| {
                let mut parts = candidate.split_whitespace();
                let Some(url) = parts.next() else {
                    return candidate.to_string();
                };
                let descriptors: Vec<&str> = parts.collect();

                let url = match self.rewrite_reference(url) {
                    Some(local) => {
                        any_changed = true;
                        local
                    }
                    None => url.to_string(),
                };

                if descriptors.is_empty() {
                    url
                } else {
                    format!("{} {}", url, descriptors.join(" "))
                }
            })
            .collect();

        any_changed.then(|| candidates.join(", "))
    }

    /// Detects values that already point into another in-scope host's
    /// directory of the mirror, such as `../sub.example.com/x.html`
    ///
    /// Resolved as URLs these would land on the document's own host, so they
    /// are left alone to keep rewriting idempotent.
    fn is_mirror_reference_to_other_host(&self, value: &str) -> bool {
        if !value.starts_with("../") {
            return false;
        }

        let path = value.split(&['#', '?'][..]).next().unwrap_or(value);
        let Some(resolved) = resolve_local(&self.document.local_path, path) else {
            return false;
        };

        let own_dir = self.document.local_path.split('/').next().unwrap_or("");
        let Some(target_dir) = resolved.split('/').next() else {
            return false;
        };

        target_dir != own_dir
            && self
                .parser
                .scope()
                .contains_host(host_of_local_dir(target_dir))
    }
}

/// Strips the `_port` suffix from a host directory name
fn host_of_local_dir(dir: &str) -> &str {
    match dir.rsplit_once('_') {
        Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => host,
        _ => dir,
    }
}

/// Rewrites a document's links and re-saves it through the store
///
/// Nothing is written when no attribute changes. Both a failed rewrite and a
/// failed re-save surface as `MirrorError::Rewrite`.
pub async fn rewrite_document(
    store: &ResourceStore,
    parser: &LinkParser,
    document: &Resource,
    links: &[Url],
) -> Result<RewriteOutcome, MirrorError> {
    let rewritten = DocumentRewriter::new(parser, document, links)
        .rewrite()
        .map_err(|message| MirrorError::Rewrite {
            url: document.source_url.to_string(),
            message,
        })?;

    let Some((content, count)) = rewritten else {
        tracing::trace!("No links to rewrite in {}", document.source_url);
        return Ok(RewriteOutcome::Unchanged);
    };

    store
        .replace(document.with_content(content))
        .await
        .map_err(|e| MirrorError::Rewrite {
            url: document.source_url.to_string(),
            message: format!("re-save failed: {}", e),
        })?;
    tracing::debug!("Rewrote {} link(s) in {}", count, document.local_path);

    Ok(RewriteOutcome::Rewritten(count))
}
