use scraper::ElementRef;

/// Pick the highest-resolution candidate from a `srcset` attribute value.
///
/// Candidates are `url NNNw` pairs; the largest width wins and the
/// first-listed candidate wins a width tie. A candidate without a width
/// descriptor only wins when no described candidate exists.
pub(crate) fn best_srcset_candidate(srcset: &str) -> Option<String> {
    let mut best: Option<&str> = None;
    let mut best_width: u64 = 0;
    let mut fallback: Option<&str> = None;

    for candidate in srcset.split(',') {
        let mut parts = candidate.split_whitespace();
        let Some(url) = parts.next() else { continue };
        if fallback.is_none() {
            fallback = Some(url);
        }
        let width = parts
            .next()
            .and_then(|d| d.strip_suffix('w'))
            .and_then(|n| n.parse::<u64>().ok());
        if let Some(width) = width {
            if width > best_width {
                best_width = width;
                best = Some(url);
            }
        }
    }

    best.or(fallback).map(|s| s.to_string())
}

/// Best source URL for an `<img>` element: `src`, else `data-src`, else the
/// widest `srcset` candidate. Protocol-relative URLs are normalized to
/// `https:`.
pub(crate) fn best_img_src(img: ElementRef<'_>) -> Option<String> {
    let element = img.value();
    let raw = element
        .attr("src")
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.trim().to_string())
        .or_else(|| {
            element
                .attr("data-src")
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.trim().to_string())
        })
        .or_else(|| element.attr("srcset").and_then(best_srcset_candidate))?;
    Some(normalize_protocol(&raw))
}

/// `//host/...` becomes `https://host/...`; everything else is untouched.
pub(crate) fn normalize_protocol(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        url.to_string()
    }
}

pub(crate) fn is_http_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::{best_srcset_candidate, normalize_protocol};

    #[test]
    fn max_width_wins() {
        let srcset = "a.jpg 400w, b.jpg 800w, c.jpg 200w";
        assert_eq!(best_srcset_candidate(srcset).as_deref(), Some("b.jpg"));
    }

    #[test]
    fn first_listed_wins_width_tie() {
        let srcset = "a.jpg 800w, b.jpg 800w";
        assert_eq!(best_srcset_candidate(srcset).as_deref(), Some("a.jpg"));
    }

    #[test]
    fn falls_back_to_first_token_without_descriptors() {
        assert_eq!(
            best_srcset_candidate("a.jpg, b.jpg").as_deref(),
            Some("a.jpg")
        );
    }

    #[test]
    fn protocol_relative_becomes_https() {
        assert_eq!(
            normalize_protocol("//cdn.example.com/x.png"),
            "https://cdn.example.com/x.png"
        );
        assert_eq!(normalize_protocol("http://a/x.png"), "http://a/x.png");
    }
}
