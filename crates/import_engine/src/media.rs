use std::collections::HashMap;

use ego_tree::{NodeId, NodeRef};
use import_core::AssetId;
use import_logging::import_warn;
use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html};

use crate::caption::CAPTION_CONTAINER_CLASS;
use crate::hash::bytes_hash;
use crate::sanitize::{escape_text, is_void, push_attr};
use crate::srcset::{best_srcset_candidate, is_http_url, normalize_protocol};
use crate::stores::MediaStore;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff"];

/// Per-batch resolution cache: one entry per remote URL, covering both
/// successful resolutions and failures. Scoped to a single import or resync
/// invocation; never shared across batches.
#[derive(Debug, Default)]
pub struct MediaCache {
    resolved: HashMap<String, Option<AssetId>>,
}

impl MediaCache {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Result of localizing one HTML body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalizedHtml {
    pub html: String,
    /// First successfully localized asset, the cover candidate.
    pub cover: Option<AssetId>,
}

/// Downloads remote images into the host media store and rewrites the HTML
/// to reference the local copies.
pub struct MediaLocalizer<'a> {
    store: &'a dyn MediaStore,
}

impl<'a> MediaLocalizer<'a> {
    pub fn new(store: &'a dyn MediaStore) -> Self {
        Self { store }
    }

    /// Localize every image reference in `html`. A failed download or store
    /// for one URL leaves that reference untouched as a remote fallback and
    /// never aborts the rest.
    pub fn localize(&self, html: &str, cache: &mut MediaCache) -> LocalizedHtml {
        let mut html = html.to_string();
        let mut cover = None;

        for url in collect_image_urls(&html) {
            let Some(asset) = self.resolve_or_create(&url, cache) else {
                continue;
            };
            let Some(local_url) = self.store.resolve_url(asset) else {
                continue;
            };
            html = rewrite_url(&html, &url, &local_url);
            if cover.is_none() {
                cover = Some(asset);
            }
        }

        LocalizedHtml { html, cover }
    }

    /// Resolve a remote URL to a local asset, creating one only when it is
    /// truly novel: batch cache, then source-URL index, then filename
    /// match, then download + byte-hash dedup, then store.
    fn resolve_or_create(&self, url: &str, cache: &mut MediaCache) -> Option<AssetId> {
        if let Some(cached) = cache.resolved.get(url) {
            return *cached;
        }

        let resolved = self.lookup_existing(url).or_else(|| self.download_and_store(url));
        cache.resolved.insert(url.to_string(), resolved);
        resolved
    }

    fn lookup_existing(&self, url: &str) -> Option<AssetId> {
        if let Some(asset) = self.store.find_by_source_url(url) {
            return Some(asset);
        }
        self.store.find_by_filename(&filename_for(url))
    }

    fn download_and_store(&self, url: &str) -> Option<AssetId> {
        let bytes = match self.store.download(url) {
            Ok(bytes) => bytes,
            Err(err) => {
                import_warn!("image download failed for {url}: {err}");
                return None;
            }
        };
        let hash = bytes_hash(&bytes);
        if let Some(asset) = self.store.find_by_content_hash(&hash) {
            // Byte-identical file already stored under another URL.
            return Some(asset);
        }
        match self.store.store(&bytes, &filename_for(url), &hash, url) {
            Ok(asset) => Some(asset),
            Err(err) => {
                import_warn!("image store failed for {url}: {err}");
                None
            }
        }
    }
}

/// Every image URL referenced via `src`, `data-src`, or the widest `srcset`
/// candidate, in first-seen document order, deduplicated, protocol
/// normalized, non-http(s) discarded.
pub(crate) fn collect_image_urls(html: &str) -> Vec<String> {
    let fragment = Html::parse_fragment(html);
    let mut urls: Vec<String> = Vec::new();
    let mut push = |raw: &str| {
        let url = normalize_protocol(raw.trim());
        if is_http_url(&url) && !urls.contains(&url) {
            urls.push(url);
        }
    };

    for node in fragment.root_element().descendants() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        if element.value().name() != "img" {
            continue;
        }
        if let Some(src) = element.value().attr("src") {
            push(src);
        }
        if let Some(src) = element.value().attr("data-src") {
            push(src);
        }
        if let Some(best) = element.value().attr("srcset").and_then(best_srcset_candidate) {
            push(&best);
        }
    }
    urls
}

/// Replace every occurrence of `url`, with or without a trailing query
/// string, by `replacement`.
fn rewrite_url(html: &str, url: &str, replacement: &str) -> String {
    let pattern = match Regex::new(&format!("{}(\\?[^\\s\"']*)?", regex::escape(url))) {
        Ok(pattern) => pattern,
        Err(_) => return html.to_string(),
    };
    pattern.replace_all(html, replacement).into_owned()
}

/// Filename portion of a URL, given a recognizable image extension when the
/// upstream path carries none.
fn filename_for(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url).trim_end_matches('/');
    let base = path.rsplit('/').next().unwrap_or("image");
    let base = if base.is_empty() { "image" } else { base };
    let has_ext = base
        .rsplit_once('.')
        .is_some_and(|(_, ext)| IMAGE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)));
    if has_ext {
        base.to_string()
    } else {
        format!("{base}.jpg")
    }
}

/// Remove the inline occurrence of the cover image from the body. Removes
/// the captioned wrapper around the image when one exists, else the
/// enclosing figure, else the enclosing paragraph when the image is its
/// only meaningful child, else the bare `<img>`.
pub(crate) fn remove_cover_image(html: &str, cover_url: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let Some(target) = removal_target(&fragment, cover_url) else {
        return html.to_string();
    };

    let mut out = String::new();
    for child in fragment.root_element().children() {
        write_verbatim(child, target, &mut out);
    }
    out
}

fn removal_target(fragment: &Html, cover_url: &str) -> Option<NodeId> {
    let cover_base = strip_query(cover_url);
    let img = fragment
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| {
            el.value().name() == "img"
                && el
                    .value()
                    .attr("src")
                    .or_else(|| el.value().attr("data-src"))
                    .is_some_and(|src| strip_query(src) == cover_base)
        })?;

    for ancestor in img.ancestors().filter_map(ElementRef::wrap) {
        if ancestor.value().name() == "div"
            && ancestor
                .value()
                .attr("class")
                .is_some_and(|c| c.split_whitespace().any(|cl| cl == CAPTION_CONTAINER_CLASS))
        {
            return Some(ancestor.id());
        }
    }
    for ancestor in img.ancestors().filter_map(ElementRef::wrap) {
        if ancestor.value().name() == "figure" {
            return Some(ancestor.id());
        }
    }
    if let Some(parent) = img.parent().and_then(ElementRef::wrap) {
        if parent.value().name() == "p" && only_meaningful_child(parent, img.id()) {
            return Some(parent.id());
        }
    }
    Some(img.id())
}

fn only_meaningful_child(parent: ElementRef<'_>, img_id: NodeId) -> bool {
    for child in parent.children() {
        if child.id() == img_id {
            continue;
        }
        match child.value() {
            Node::Text(text) => {
                if !text.trim().is_empty() {
                    return false;
                }
            }
            Node::Element(el) => {
                if el.name() != "br" {
                    return false;
                }
            }
            _ => {}
        }
    }
    true
}

fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

fn write_verbatim(node: NodeRef<'_, Node>, skip: NodeId, out: &mut String) {
    if node.id() == skip {
        return;
    }
    match node.value() {
        Node::Text(text) => escape_text(text, out),
        Node::Element(_) => {
            let Some(element) = ElementRef::wrap(node) else {
                return;
            };
            let tag = element.value().name();
            out.push('<');
            out.push_str(tag);
            for (name, value) in element.value().attrs() {
                push_attr(out, name, value);
            }
            out.push('>');
            if is_void(tag) {
                return;
            }
            for child in node.children() {
                write_verbatim(child, skip, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::{collect_image_urls, filename_for, remove_cover_image, rewrite_url};
    use pretty_assertions::assert_eq;

    #[test]
    fn collects_src_data_src_and_best_srcset() {
        let html = r#"<img src="https://a.test/x.jpg" srcset="https://a.test/s.jpg 400w, https://a.test/l.jpg 800w"><img data-src="//b.test/y.png">"#;
        assert_eq!(
            collect_image_urls(html),
            vec![
                "https://a.test/x.jpg".to_string(),
                "https://a.test/l.jpg".to_string(),
                "https://b.test/y.png".to_string(),
            ]
        );
    }

    #[test]
    fn discards_non_http_and_duplicates() {
        let html = r#"<img src="data:image/png;base64,xx"><img src="https://a.test/x.jpg"><img src="https://a.test/x.jpg">"#;
        assert_eq!(collect_image_urls(html), vec!["https://a.test/x.jpg".to_string()]);
    }

    #[test]
    fn rewrite_ignores_query_string() {
        let html = r#"<img src="https://a.test/x.jpg?w=1200&q=80">"#;
        let out = rewrite_url(html, "https://a.test/x.jpg", "/media/1/x.jpg");
        assert_eq!(out, r#"<img src="/media/1/x.jpg">"#);
    }

    #[test]
    fn filename_gains_extension_when_missing() {
        assert_eq!(filename_for("https://a.test/img/abc123"), "abc123.jpg");
        assert_eq!(filename_for("https://a.test/img/pic.PNG"), "pic.PNG");
    }

    #[test]
    fn cover_removal_takes_enclosing_figure() {
        let html = r#"<figure><img src="/media/1/x.jpg"><figcaption>c</figcaption></figure><p>body</p>"#;
        assert_eq!(remove_cover_image(html, "/media/1/x.jpg"), "<p>body</p>");
    }

    #[test]
    fn cover_removal_takes_paragraph_when_image_is_sole_child() {
        let html = r#"<p><img src="/media/1/x.jpg"><br></p><p>body</p>"#;
        assert_eq!(remove_cover_image(html, "/media/1/x.jpg"), "<p>body</p>");
    }

    #[test]
    fn cover_removal_keeps_paragraph_with_other_text() {
        let html = r#"<p>lead <img src="/media/1/x.jpg"> tail</p>"#;
        assert_eq!(
            remove_cover_image(html, "/media/1/x.jpg"),
            "<p>lead  tail</p>"
        );
    }
}
