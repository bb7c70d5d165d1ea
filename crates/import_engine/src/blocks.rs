use import_core::BlockStyle;
use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html};
use serde_json::json;

use crate::alt::alt_text_from_url;
use crate::caption::{FIGCAPTION_CLASS, FIGURE_CLASS};
use crate::srcset::best_img_src;

/// Canonical marker class carried by every separator block.
pub const SEPARATOR_CLASS: &str = "block-separator";

const QUOTE_CLASS: &str = "block-quote";
const GROUP_CLASS: &str = "block-group";
const CODE_CLASS: &str = "block-code";

/// Minimal spacing kept on separators for renderers that ignore the marker
/// class.
const SEPARATOR_SPACING: &str = "margin:2em 0;";

/// Closed set of recognized top-level tag categories. Everything outside it
/// falls into the mandatory passthrough arm: the converter degrades, it
/// never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Heading(u8),
    List { ordered: bool },
    Quote,
    Figure,
    Image,
    Paragraph,
    Separator,
    Preformatted,
    InlineCode,
    Container,
    Inline,
    Other,
}

fn classify(tag: &str) -> TagKind {
    match tag {
        "h1" => TagKind::Heading(1),
        "h2" => TagKind::Heading(2),
        "h3" => TagKind::Heading(3),
        "h4" => TagKind::Heading(4),
        "h5" => TagKind::Heading(5),
        "h6" => TagKind::Heading(6),
        "ul" => TagKind::List { ordered: false },
        "ol" => TagKind::List { ordered: true },
        "blockquote" => TagKind::Quote,
        "figure" => TagKind::Figure,
        "img" => TagKind::Image,
        "p" => TagKind::Paragraph,
        "hr" => TagKind::Separator,
        "pre" => TagKind::Preformatted,
        "code" => TagKind::InlineCode,
        "div" | "section" | "article" | "aside" => TagKind::Container,
        "a" | "abbr" | "b" | "br" | "cite" | "del" | "em" | "i" | "ins" | "mark" | "q" | "s"
        | "small" | "span" | "strong" | "sub" | "sup" | "u" => TagKind::Inline,
        _ => TagKind::Other,
    }
}

/// Convert sanitized HTML into the serialized block document.
///
/// Walks the top-level nodes in document order and emits one typed block per
/// node. The enhanced style additionally coalesces adjacent inline/text runs
/// into a single paragraph and wraps generic containers into group blocks;
/// both styles share the per-tag mapping.
pub fn convert_to_blocks(html: &str, style: BlockStyle) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    let fragment = Html::parse_fragment(html);
    let mut blocks: Vec<String> = Vec::new();
    let mut inline_run = String::new();

    for node in fragment.root_element().children() {
        match node.value() {
            Node::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                match style {
                    BlockStyle::Basic => blocks.push(paragraph_block(&escaped(text))),
                    BlockStyle::Enhanced => {
                        if !inline_run.is_empty() {
                            inline_run.push(' ');
                        }
                        inline_run.push_str(&escaped(text));
                    }
                }
            }
            Node::Element(_) => {
                let Some(element) = ElementRef::wrap(node) else {
                    continue;
                };
                let kind = classify(element.value().name());

                if style == BlockStyle::Enhanced && kind == TagKind::Inline {
                    if !inline_run.is_empty() {
                        inline_run.push(' ');
                    }
                    inline_run.push_str(element.html().trim());
                    continue;
                }
                // A block-level tag interrupts the buffered run; the run is
                // flushed first so document order is preserved.
                flush_inline_run(&mut inline_run, &mut blocks);
                convert_element(element, kind, style, &mut blocks);
            }
            _ => {}
        }
    }
    flush_inline_run(&mut inline_run, &mut blocks);

    if blocks.is_empty() {
        // Nothing recognizable came out of the parse: degrade to a single
        // passthrough block wrapping the original input verbatim.
        return finalize_separators(&passthrough_raw(html));
    }

    finalize_separators(&blocks.join("\n\n"))
}

fn convert_element(
    element: ElementRef<'_>,
    kind: TagKind,
    style: BlockStyle,
    blocks: &mut Vec<String>,
) {
    match kind {
        TagKind::Heading(level) => {
            let tag = element.value().name();
            let content = element.inner_html().trim().to_string();
            // Level 2 is the canonical default and is omitted.
            let attrs = (level != 2).then(|| json!({ "level": level }));
            blocks.push(block(
                "heading",
                attrs,
                &format!("<{tag}>{content}</{tag}>"),
            ));
        }
        TagKind::List { ordered } => {
            let tag = element.value().name();
            let mut items = String::new();
            for li in element
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|el| el.value().name() == "li")
            {
                items.push_str("<li>");
                items.push_str(li.inner_html().trim());
                items.push_str("</li>");
            }
            let attrs = ordered.then(|| json!({ "ordered": true }));
            blocks.push(block("list", attrs, &format!("<{tag}>\n{items}\n</{tag}>")));
        }
        TagKind::Quote => {
            let content = element.inner_html().trim().to_string();
            blocks.push(block(
                "quote",
                None,
                &format!("<blockquote class=\"{QUOTE_CLASS}\">{content}</blockquote>"),
            ));
        }
        TagKind::Figure => {
            let img = element
                .descendants()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "img");
            let src = img.and_then(best_img_src);
            match (img, src) {
                (Some(img), Some(src)) => {
                    let caption = element
                        .descendants()
                        .filter_map(ElementRef::wrap)
                        .find(|el| el.value().name() == "figcaption")
                        .map(|fc| fc.text().collect::<String>().trim().to_string())
                        .unwrap_or_default();
                    blocks.push(image_block(&src, img.value().attr("alt"), &caption));
                }
                _ => blocks.push(passthrough(element)),
            }
        }
        TagKind::Image => match best_img_src(element) {
            Some(src) => blocks.push(image_block(&src, element.value().attr("alt"), "")),
            None => blocks.push(passthrough(element)),
        },
        TagKind::Paragraph => {
            let content = element.inner_html().trim().to_string();
            if !content.is_empty() {
                blocks.push(paragraph_block(&content));
            }
        }
        TagKind::Separator => {
            blocks.push(block(
                "separator",
                None,
                &format!("<hr class=\"{SEPARATOR_CLASS}\">"),
            ));
        }
        TagKind::Preformatted => {
            let content = element.inner_html().trim().to_string();
            if !content.is_empty() {
                blocks.push(block(
                    "code",
                    None,
                    &format!(
                        "<pre class=\"{CODE_CLASS}\"><code>{}</code></pre>",
                        escaped(&content)
                    ),
                ));
            }
        }
        TagKind::InlineCode => {
            let content = element.inner_html().trim().to_string();
            if !content.is_empty() {
                blocks.push(block(
                    "code",
                    None,
                    &format!("<code class=\"{CODE_CLASS}\">{}</code>", escaped(&content)),
                ));
            }
        }
        TagKind::Container => match style {
            BlockStyle::Basic => blocks.push(passthrough(element)),
            BlockStyle::Enhanced => {
                // Group wrappers keep their inner markup verbatim; the
                // converter does not recurse into them.
                let content = element.inner_html().trim().to_string();
                if !content.is_empty() {
                    blocks.push(block(
                        "group",
                        None,
                        &format!("<div class=\"{GROUP_CLASS}\">{content}</div>"),
                    ));
                }
            }
        },
        TagKind::Inline | TagKind::Other => blocks.push(passthrough(element)),
    }
}

fn flush_inline_run(run: &mut String, blocks: &mut Vec<String>) {
    let content = run.trim().to_string();
    run.clear();
    if !content.is_empty() {
        blocks.push(paragraph_block(&content));
    }
}

fn block(kind: &str, attrs: Option<serde_json::Value>, inner: &str) -> String {
    match attrs {
        Some(attrs) => format!("<!-- block:{kind} {attrs} -->\n{inner}\n<!-- /block:{kind} -->"),
        None => format!("<!-- block:{kind} -->\n{inner}\n<!-- /block:{kind} -->"),
    }
}

fn paragraph_block(inner: &str) -> String {
    block("paragraph", None, &format!("<p>{inner}</p>"))
}

fn image_block(src: &str, alt: Option<&str>, caption: &str) -> String {
    let alt = match alt {
        Some(alt) if !alt.trim().is_empty() => alt.to_string(),
        _ => alt_text_from_url(src),
    };
    let mut figure = format!("<figure class=\"{FIGURE_CLASS}\">");
    figure.push_str("<img");
    crate::sanitize::push_attr(&mut figure, "src", src);
    crate::sanitize::push_attr(&mut figure, "alt", &alt);
    figure.push('>');
    if !caption.is_empty() {
        figure.push_str(&format!("<figcaption class=\"{FIGCAPTION_CLASS}\">"));
        crate::sanitize::escape_text(caption, &mut figure);
        figure.push_str("</figcaption>");
    }
    figure.push_str("</figure>");
    block("image", None, &figure)
}

fn passthrough(element: ElementRef<'_>) -> String {
    passthrough_raw(element.html().trim())
}

fn passthrough_raw(markup: &str) -> String {
    block("html", None, markup)
}

fn escaped(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    crate::sanitize::escape_text(text, &mut out);
    out
}

/// Post-processing over the serialized document: every separator block is
/// re-normalized to carry the marker class exactly once, stray inline style
/// is dropped, and the minimal spacing style is re-applied for renderers
/// that ignore the marker class.
fn finalize_separators(doc: &str) -> String {
    let pattern = Regex::new(r"<!-- block:separator -->\n<hr[^>]*>\n<!-- /block:separator -->")
        .expect("separator pattern is valid");
    let class_pattern = Regex::new(r#"class="([^"]*)""#).expect("class pattern is valid");
    pattern
        .replace_all(doc, |caps: &regex::Captures<'_>| {
            let found = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            let mut classes: Vec<&str> = Vec::new();
            if let Some(class_caps) = class_pattern.captures(found) {
                if let Some(value) = class_caps.get(1) {
                    for class in value.as_str().split_whitespace() {
                        if class != SEPARATOR_CLASS && !classes.contains(&class) {
                            classes.push(class);
                        }
                    }
                }
            }
            classes.push(SEPARATOR_CLASS);
            format!(
                "<!-- block:separator -->\n<hr class=\"{}\" style=\"{SEPARATOR_SPACING}\">\n<!-- /block:separator -->",
                classes.join(" ")
            )
        })
        .into_owned()
}
