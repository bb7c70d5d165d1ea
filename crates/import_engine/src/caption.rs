use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html};

use crate::alt::alt_text_from_url;
use crate::sanitize::{escape_text, is_void, push_attr};
use crate::srcset::best_img_src;

/// Class marker the upstream feed puts on its captioned-image wrappers.
pub const CAPTION_CONTAINER_CLASS: &str = "captioned-image-container";

/// Canonical classes on the rewritten figure.
pub(crate) const FIGURE_CLASS: &str = "block-image";
pub(crate) const FIGCAPTION_CLASS: &str = "block-caption";

/// Replace every captioned-image wrapper with a canonical
/// `<figure class="block-image">` holding a plain `<img>` and, when a
/// caption existed, a `<figcaption>` with the caption *text only*. Markup
/// inside the original caption is deliberately flattened to text so broken
/// caption HTML can never leak into the block output.
pub fn normalize_captioned_images(html: &str) -> String {
    if html.trim().is_empty() {
        return html.to_string();
    }
    let fragment = Html::parse_fragment(html);
    let mut out = String::new();
    for child in fragment.root_element().children() {
        write_node(child, &mut out);
    }
    out
}

fn write_node(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => escape_text(text, out),
        Node::Element(_) => {
            if let Some(element) = ElementRef::wrap(node) {
                write_element(element, out);
            }
        }
        _ => {}
    }
}

fn write_element(element: ElementRef<'_>, out: &mut String) {
    if is_caption_container(element) {
        if write_canonical_figure(element, out) {
            return;
        }
        // No usable image inside the wrapper; fall through and keep the
        // original subtree untouched.
    }

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
    for child in element.children() {
        write_node(child, out);
    }
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn is_caption_container(element: ElementRef<'_>) -> bool {
    element.value().name() == "div"
        && element
            .value()
            .attr("class")
            .is_some_and(|c| c.split_whitespace().any(|cl| cl == CAPTION_CONTAINER_CLASS))
}

/// Emit the canonical figure for a wrapper. Returns false when the wrapper
/// holds no resolvable image.
fn write_canonical_figure(container: ElementRef<'_>, out: &mut String) -> bool {
    let Some(img) = descendant(container, "img") else {
        return false;
    };
    let Some(src) = best_img_src(img) else {
        return false;
    };
    let alt = match img.value().attr("alt") {
        Some(alt) if !alt.trim().is_empty() => alt.to_string(),
        _ => alt_text_from_url(&src),
    };

    let caption = descendant(container, "figcaption")
        .map(|fc| fc.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    out.push_str("<figure");
    push_attr(out, "class", FIGURE_CLASS);
    out.push_str("><img");
    push_attr(out, "src", &src);
    push_attr(out, "alt", &alt);
    out.push('>');
    if !caption.is_empty() {
        out.push_str("<figcaption");
        push_attr(out, "class", FIGCAPTION_CLASS);
        out.push('>');
        escape_text(&caption, out);
        out.push_str("</figcaption>");
    }
    out.push_str("</figure>");
    true
}

fn descendant<'a>(element: ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
    element
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == tag)
}

#[cfg(test)]
mod tests {
    use super::normalize_captioned_images;
    use pretty_assertions::assert_eq;

    #[test]
    fn caption_markup_is_flattened_to_text() {
        let html = r#"<div class="captioned-image-container"><figure><img src="https://cdn.example.com/pic.jpg" alt="Pic"><figcaption><b>bold</b> note</figcaption></figure></div>"#;
        let out = normalize_captioned_images(html);
        assert_eq!(
            out,
            r#"<figure class="block-image"><img src="https://cdn.example.com/pic.jpg" alt="Pic"><figcaption class="block-caption">bold note</figcaption></figure>"#
        );
    }

    #[test]
    fn wrapper_without_image_is_left_alone() {
        let html = r#"<div class="captioned-image-container"><p>just text</p></div>"#;
        let out = normalize_captioned_images(html);
        assert_eq!(out, html);
    }

    #[test]
    fn figure_without_caption_gets_no_figcaption() {
        let html = r#"<div class="captioned-image-container"><figure><img src="https://cdn.example.com/only.jpg" alt="Only"></figure></div>"#;
        let out = normalize_captioned_images(html);
        assert_eq!(
            out,
            r#"<figure class="block-image"><img src="https://cdn.example.com/only.jpg" alt="Only"></figure>"#
        );
    }

    #[test]
    fn surrounding_content_is_preserved() {
        let html = r#"<p>before</p><div class="captioned-image-container"><figure><img src="https://x.test/a.png" alt="A"></figure></div><p>after</p>"#;
        let out = normalize_captioned_images(html);
        assert!(out.starts_with("<p>before</p>"));
        assert!(out.ends_with("<p>after</p>"));
        assert!(out.contains(r#"<figure class="block-image">"#));
    }
}
