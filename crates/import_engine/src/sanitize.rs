use ego_tree::NodeRef;
use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html};
use url::Url;

use crate::blocks::SEPARATOR_CLASS;

/// Tags preserved by the allow-list pass. Anything else is unwrapped: the
/// tag is dropped but its children survive.
const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "b", "blockquote", "br", "caption", "cite", "code", "dd", "del", "div", "dl",
    "dt", "em", "figcaption", "figure", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i", "iframe",
    "img", "ins", "li", "mark", "ol", "p", "pre", "q", "s", "small", "span", "strong", "sub",
    "sup", "table", "tbody", "td", "tfoot", "th", "thead", "tr", "u", "ul",
];

/// Tags whose entire subtree is discarded. The security boundary for
/// scripting content.
const DROPPED_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Embed providers whose iframes keep their `src`. Anything else gets the
/// `src` blanked rather than the whole element dropped.
const EMBED_HOSTS: &[&str] = &["youtube.com", "youtu.be", "player.vimeo.com", "w.soundcloud.com"];

/// Sanitize feed HTML. Total: never fails, and empty input yields an empty
/// string. The output of this function is what gets fingerprinted for
/// change detection, so it must be stable under re-sanitization.
pub fn sanitize(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    // Entity repair must happen on the raw string: the parser decodes
    // entities, so a double-escaped `&amp;lt;` would otherwise survive as
    // literal text.
    let repaired = repair_double_escaped_entities(html);

    let fragment = Html::parse_fragment(&repaired);
    let mut out = String::new();
    for child in fragment.root_element().children() {
        write_node(child, &mut out);
    }
    out
}

/// Restore single escaping for named or numeric entities that were escaped
/// twice upstream. A bare `&amp;` in running text never matches.
fn repair_double_escaped_entities(html: &str) -> String {
    let pattern = Regex::new(r"&amp;(amp|lt|gt|quot|apos|nbsp|#[0-9]{1,7}|#x[0-9a-fA-F]{1,6});")
        .expect("entity pattern is valid");
    pattern.replace_all(html, "&$1;").into_owned()
}

fn write_node(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => escape_text(text, out),
        Node::Element(_) => {
            if let Some(element) = ElementRef::wrap(node) {
                write_element(element, out);
            }
        }
        // Comments, processing instructions and doctypes are dropped.
        _ => {}
    }
}

fn write_element(element: ElementRef<'_>, out: &mut String) {
    let tag = element.value().name();

    if DROPPED_TAGS.contains(&tag) {
        return;
    }

    if tag == "div" {
        if let Some(hr) = sole_hr_child(element) {
            write_collapsed_separator(element, hr, out);
            return;
        }
    }

    if !ALLOWED_TAGS.contains(&tag) {
        // Unknown wrapper: keep the content, lose the tag.
        for child in element.children() {
            write_node(child, out);
        }
        return;
    }

    let synthesize_alt = tag == "img" && needs_alt(element);
    out.push('<');
    out.push_str(tag);
    for (name, value) in element.value().attrs() {
        if synthesize_alt && name == "alt" {
            continue;
        }
        if let Some(value) = filtered_attr(tag, name, value) {
            push_attr(out, name, &value);
        }
    }
    if synthesize_alt {
        let src = element
            .value()
            .attr("src")
            .or_else(|| element.value().attr("data-src"))
            .unwrap_or("");
        push_attr(out, "alt", &crate::alt::alt_text_from_url(src));
    }
    out.push('>');

    if is_void(tag) {
        return;
    }
    for child in element.children() {
        write_node(child, out);
    }
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

/// Decide whether an attribute survives, and with what value.
fn filtered_attr(tag: &str, name: &str, value: &str) -> Option<String> {
    // Event handlers never survive, regardless of tag.
    if name.starts_with("on") {
        return None;
    }

    let allowed = match tag {
        "div" | "span" | "p" => matches!(name, "class" | "style" | "id" | "align"),
        "hr" => matches!(name, "class" | "style" | "id"),
        "a" => matches!(name, "href" | "title" | "rel" | "target" | "class" | "id"),
        "img" => matches!(
            name,
            "src" | "data-src" | "srcset" | "alt" | "width" | "height" | "loading" | "class" | "id"
        ),
        "iframe" => matches!(
            name,
            "src" | "width" | "height" | "frameborder" | "allow" | "allowfullscreen" | "loading"
                | "title"
        ),
        _ => matches!(name, "class" | "style" | "id" | "title"),
    };
    if !allowed {
        return None;
    }

    if matches!(name, "href" | "src" | "data-src") {
        let trimmed = value.trim();
        if trimmed.to_ascii_lowercase().starts_with("javascript:") {
            return None;
        }
        if tag == "iframe" && name == "src" {
            return Some(if approved_embed(trimmed) {
                trimmed.to_string()
            } else {
                String::new()
            });
        }
    }

    Some(value.to_string())
}

fn approved_embed(src: &str) -> bool {
    let normalized = crate::srcset::normalize_protocol(src);
    let Ok(url) = Url::parse(&normalized) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.strip_prefix("www.").unwrap_or(host);
    EMBED_HOSTS.iter().any(|allowed| host.eq_ignore_ascii_case(allowed))
}

fn needs_alt(img: ElementRef<'_>) -> bool {
    match img.value().attr("alt") {
        None => true,
        Some(alt) => alt.trim().is_empty(),
    }
}

/// A `<div>` wrapping solely an `<hr>` (ignoring whitespace) collapses to a
/// bare separator carrying the canonical marker class merged with the
/// classes of both elements.
fn sole_hr_child<'a>(div: ElementRef<'a>) -> Option<ElementRef<'a>> {
    let mut hr = None;
    for child in div.children() {
        match child.value() {
            Node::Text(text) => {
                if !text.trim().is_empty() {
                    return None;
                }
            }
            Node::Element(el) => {
                if el.name() != "hr" || hr.is_some() {
                    return None;
                }
                hr = ElementRef::wrap(child);
            }
            _ => {}
        }
    }
    hr
}

fn write_collapsed_separator(div: ElementRef<'_>, hr: ElementRef<'_>, out: &mut String) {
    let mut classes: Vec<String> = Vec::new();
    for source in [div.value().attr("class"), hr.value().attr("class")] {
        for class in source.unwrap_or("").split_whitespace() {
            if !classes.iter().any(|c| c == class) {
                classes.push(class.to_string());
            }
        }
    }
    if !classes.iter().any(|c| c == SEPARATOR_CLASS) {
        classes.push(SEPARATOR_CLASS.to_string());
    }
    out.push_str("<hr");
    push_attr(out, "class", &classes.join(" "));
    if let Some(id) = hr.value().attr("id") {
        push_attr(out, "id", id);
    }
    out.push('>');
}

pub(crate) fn is_void(tag: &str) -> bool {
    matches!(tag, "br" | "hr" | "img" | "col" | "wbr" | "source" | "embed" | "input")
}

pub(crate) fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    escape_attr(value, out);
    out.push('"');
}

// Ampersands are serialized in the numeric form. The entity-repair pattern
// only matches the `&amp;` spelling, so serialized output can never
// re-trigger a repair on the next pass even when a literal `lt;` or `gt;`
// follows the ampersand in running text.
pub(crate) fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&#38;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&#38;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{repair_double_escaped_entities, sanitize};
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_input_yields_empty_string() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("   \n "), "");
    }

    #[test]
    fn scripts_and_styles_are_dropped_with_content() {
        let html = "<p>keep</p><script>alert(1)</script><style>p{}</style>";
        assert_eq!(sanitize(html), "<p>keep</p>");
    }

    #[test]
    fn entity_repair_restores_single_escaping() {
        assert_eq!(repair_double_escaped_entities("a &amp;amp; b"), "a &amp; b");
        assert_eq!(repair_double_escaped_entities("x &amp;lt; y"), "x &lt; y");
        // A legitimately escaped ampersand is untouched.
        assert_eq!(
            repair_double_escaped_entities("Tom &amp; Jerry"),
            "Tom &amp; Jerry"
        );
    }

    #[test]
    fn literal_entity_text_is_stable_under_resanitization() {
        // The text node holds a literal `&lt;` after one repair pass; the
        // serialized ampersand must not look like another double escape.
        let once = sanitize("<p>x &amp;amp;lt; y</p>");
        assert_eq!(once, "<p>x &#38;lt; y</p>");
        assert_eq!(sanitize(&once), once);

        let attr = sanitize(r#"<a title="a &amp;amp;gt; b">x</a>"#);
        assert_eq!(attr, r#"<a title="a &#38;gt; b">x</a>"#);
        assert_eq!(sanitize(&attr), attr);
    }

    #[test]
    fn event_handlers_never_survive() {
        let html = r#"<p onclick="evil()" class="x">hi</p>"#;
        assert_eq!(sanitize(html), r#"<p class="x">hi</p>"#);
    }

    #[test]
    fn javascript_urls_are_removed() {
        let html = r#"<a href="javascript:evil()">x</a>"#;
        assert_eq!(sanitize(html), "<a>x</a>");
    }

    #[test]
    fn unapproved_iframe_src_is_blanked() {
        let html = r#"<iframe src="https://evil.example.com/x"></iframe>"#;
        assert_eq!(sanitize(html), r#"<iframe src=""></iframe>"#);

        let ok = r#"<iframe src="https://www.youtube.com/embed/abc"></iframe>"#;
        assert_eq!(
            sanitize(ok),
            r#"<iframe src="https://www.youtube.com/embed/abc"></iframe>"#
        );
    }

    #[test]
    fn unknown_wrapper_is_unwrapped_keeping_content() {
        let html = "<video controls><p>fallback</p></video>";
        assert_eq!(sanitize(html), "<p>fallback</p>");
    }
}
