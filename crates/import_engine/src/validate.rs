use import_core::ValidationReport;
use regex::Regex;

use crate::blocks::SEPARATOR_CLASS;

/// Scan a serialized block document for structural violations.
///
/// Non-blocking by contract: callers persist the document regardless of the
/// report and surface errors/warnings through the log sink.
pub fn validate_blocks(doc: &str) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let hr_pattern = Regex::new(r"<hr[^>]*>").expect("hr pattern is valid");
    let marker_pattern = Regex::new(&format!(r#"class="[^"]*\b{SEPARATOR_CLASS}\b[^"]*""#))
        .expect("marker pattern is valid");
    for hr in hr_pattern.find_iter(doc) {
        if !marker_pattern.is_match(hr.as_str()) {
            warnings.push(format!("separator missing {SEPARATOR_CLASS} class: {}", hr.as_str()));
        }
    }

    // A container directly wrapping only a separator means a normalization
    // pass was missed upstream.
    let wrapper_pattern =
        Regex::new(r"<div[^>]*>\s*<hr[^>]*>\s*</div>").expect("wrapper pattern is valid");
    for found in wrapper_pattern.find_iter(doc) {
        warnings.push(format!("unconverted separator wrapper: {}", found.as_str()));
    }

    let tag_pattern = Regex::new(r"<[a-zA-Z][^>]*>").expect("tag pattern is valid");
    let handler_pattern =
        Regex::new(r#"(?i)\son[a-z]+\s*=|javascript:"#).expect("handler pattern is valid");
    for tag in tag_pattern.find_iter(doc) {
        if handler_pattern.is_match(tag.as_str()) {
            errors.push(format!("unsafe markup: {}", tag.as_str()));
        }
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}
