/// Synthesize human-readable alt text from the filename portion of an image
/// URL: strip the extension, turn separators into spaces, drop a trailing
/// numeric or hex id suffix, and title-case the words. Falls back to a
/// generic label when nothing usable remains.
pub fn alt_text_from_url(url: &str) -> String {
    let path = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .trim_end_matches('/');
    let base = path.rsplit('/').next().unwrap_or("");
    let stem = match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.len() <= 5 => stem,
        _ => base,
    };

    let spaced: String = stem
        .chars()
        .map(|c| if c == '-' || c == '_' { ' ' } else { c })
        .collect();
    let mut words: Vec<&str> = spaced.split_whitespace().collect();
    if let Some(last) = words.last() {
        if is_id_suffix(last) {
            words.pop();
        }
    }

    if words.is_empty() {
        return "Imported image".to_string();
    }

    let mut out = String::new();
    for word in words {
        if !out.is_empty() {
            out.push(' ');
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

/// Trailing tokens like `01234` or `9f86d081ab` are upload ids, not words.
fn is_id_suffix(word: &str) -> bool {
    if word.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    word.len() >= 6 && word.chars().all(|c| c.is_ascii_hexdigit())
}
