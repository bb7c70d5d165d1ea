use chrono::{DateTime, Datelike, Utc};
use ego_tree::NodeRef;
use import_core::{DocumentId, UtmSettings, UtmStats};
use scraper::node::Node;
use scraper::{ElementRef, Html};
use url::Url;

use crate::sanitize::{escape_text, is_void, push_attr};

/// Per-domain override of the global UTM settings. The first rule whose
/// `domain_substring` occurs in the link host wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtmRule {
    pub domain_substring: String,
    pub source: Option<String>,
    pub medium: Option<String>,
    pub campaign_template: Option<String>,
    pub external_only: Option<bool>,
}

/// Document context substituted into campaign templates.
#[derive(Debug, Clone)]
pub struct UtmContext<'a> {
    pub slug: &'a str,
    pub doc_id: DocumentId,
    pub source_host: &'a str,
    pub publish_date: Option<DateTime<Utc>>,
}

/// Append `utm_*` parameters to anchor hrefs according to the settings and
/// per-domain rules. Existing UTM parameters are never overwritten.
pub fn apply_utm(
    html: &str,
    settings: &UtmSettings,
    rules: &[UtmRule],
    ctx: &UtmContext<'_>,
) -> (String, UtmStats) {
    let mut stats = UtmStats::default();
    if !settings.enabled || html.trim().is_empty() {
        return (html.to_string(), stats);
    }

    let fragment = Html::parse_fragment(html);
    let mut out = String::new();
    for child in fragment.root_element().children() {
        write_node(child, settings, rules, ctx, &mut stats, &mut out);
    }
    (out, stats)
}

fn write_node(
    node: NodeRef<'_, Node>,
    settings: &UtmSettings,
    rules: &[UtmRule],
    ctx: &UtmContext<'_>,
    stats: &mut UtmStats,
    out: &mut String,
) {
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
                if tag == "a" && name == "href" {
                    stats.scanned += 1;
                    match tagged_href(value, settings, rules, ctx, stats) {
                        Some(href) => push_attr(out, name, &href),
                        None => push_attr(out, name, value),
                    }
                } else {
                    push_attr(out, name, value);
                }
            }
            out.push('>');
            if is_void(tag) {
                return;
            }
            for child in node.children() {
                write_node(child, settings, rules, ctx, stats, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        _ => {}
    }
}

/// Returns the rewritten href, or None when the link is left untouched.
fn tagged_href(
    href: &str,
    settings: &UtmSettings,
    rules: &[UtmRule],
    ctx: &UtmContext<'_>,
    stats: &mut UtmStats,
) -> Option<String> {
    let trimmed = href.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("mailto:") || lower.starts_with("tel:") || lower.starts_with("javascript:")
    {
        stats.skipped_non_http += 1;
        return None;
    }

    let absolute = crate::srcset::normalize_protocol(trimmed);
    if !crate::srcset::is_http_url(&absolute) {
        // Relative links stay on the publishing site.
        stats.skipped_internal += 1;
        return None;
    }
    let mut url = Url::parse(&absolute).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();

    let is_external =
        settings.site_host.is_empty() || !host.eq_ignore_ascii_case(&settings.site_host);

    if !settings.domain_whitelist.is_empty()
        && !settings
            .domain_whitelist
            .iter()
            .any(|needle| host.contains(&needle.to_ascii_lowercase()))
    {
        return None;
    }

    let mut source = settings.source.clone();
    let mut medium = settings.medium.clone();
    let mut campaign_template = settings.campaign_template.clone();
    let mut external_only = settings.external_only;
    if let Some(rule) = rules
        .iter()
        .find(|rule| !rule.domain_substring.is_empty() && host.contains(&rule.domain_substring))
    {
        if let Some(value) = &rule.source {
            source = value.clone();
        }
        if let Some(value) = &rule.medium {
            medium = value.clone();
        }
        if let Some(value) = &rule.campaign_template {
            campaign_template = value.clone();
        }
        if let Some(value) = rule.external_only {
            external_only = value;
        }
    }

    if external_only && !is_external {
        stats.skipped_internal += 1;
        return None;
    }

    let campaign = render_campaign(&campaign_template, ctx);

    let had_utm = url
        .query_pairs()
        .any(|(key, _)| matches!(key.as_ref(), "utm_source" | "utm_medium" | "utm_campaign"));
    let missing: Vec<(&str, &str)> = [
        ("utm_source", source.as_str()),
        ("utm_medium", medium.as_str()),
        ("utm_campaign", campaign.as_str()),
    ]
    .into_iter()
    .filter(|(key, _)| !url.query_pairs().any(|(existing, _)| existing == *key))
    .collect();
    if !missing.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &missing {
            pairs.append_pair(key, value);
        }
    }

    if had_utm {
        stats.skipped_existing += 1;
    } else {
        stats.tagged += 1;
    }
    *stats.by_domain.entry(host).or_insert(0) += 1;

    Some(url.to_string())
}

fn render_campaign(template: &str, ctx: &UtmContext<'_>) -> String {
    let date = ctx.publish_date.unwrap_or_else(Utc::now);
    let rendered = template
        .replace("{slug}", ctx.slug)
        .replace("{doc_id}", &ctx.doc_id.0.to_string())
        .replace("{source_host}", ctx.source_host)
        .replace("{y}", &format!("{:04}", date.year()))
        .replace("{m}", &format!("{:02}", date.month()))
        .replace("{d}", &format!("{:02}", date.day()));
    slugify(&rendered)
}

pub(crate) fn slugify(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut last_dash = true;
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}
