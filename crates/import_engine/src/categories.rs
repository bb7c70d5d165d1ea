use import_core::TermId;
use import_logging::import_warn;
use regex::Regex;
use thiserror::Error;

use crate::stores::TaxonomyStore;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("empty label pattern")]
    EmptyPattern,
    #[error("invalid regex pattern {pattern:?}: {message}")]
    InvalidRegex { pattern: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Exact,
    CaseInsensitive,
    Regex,
}

/// One ordered mapping entry: feed label pattern to target term.
///
/// Regex patterns are compiled here, at save time; `matches` can therefore
/// never fail on a bad pattern.
#[derive(Debug, Clone)]
pub struct CategoryMappingRule {
    pattern: String,
    match_type: MatchType,
    target: TermId,
    compiled: Option<Regex>,
}

impl CategoryMappingRule {
    pub fn new(pattern: &str, match_type: MatchType, target: TermId) -> Result<Self, RuleError> {
        if pattern.trim().is_empty() {
            return Err(RuleError::EmptyPattern);
        }
        let compiled = match match_type {
            MatchType::Regex => Some(Regex::new(pattern).map_err(|err| RuleError::InvalidRegex {
                pattern: pattern.to_string(),
                message: err.to_string(),
            })?),
            _ => None,
        };
        Ok(Self {
            pattern: pattern.to_string(),
            match_type,
            target,
            compiled,
        })
    }

    pub fn target(&self) -> TermId {
        self.target
    }

    fn matches(&self, label: &str) -> bool {
        match self.match_type {
            MatchType::Exact => label == self.pattern,
            MatchType::CaseInsensitive => label.eq_ignore_ascii_case(&self.pattern),
            MatchType::Regex => self
                .compiled
                .as_ref()
                .is_some_and(|regex| regex.is_match(label)),
        }
    }
}

/// Maps feed-supplied category labels to taxonomy terms.
pub struct CategoryResolver<'a> {
    rules: &'a [CategoryMappingRule],
    taxonomy: &'a dyn TaxonomyStore,
    default_term: TermId,
}

impl<'a> CategoryResolver<'a> {
    pub fn new(
        rules: &'a [CategoryMappingRule],
        taxonomy: &'a dyn TaxonomyStore,
        default_term: TermId,
    ) -> Self {
        Self {
            rules,
            taxonomy,
            default_term,
        }
    }

    /// Resolution ladder: an explicit manual selection wins outright; then
    /// the rule list (first matching rule per label); then find-or-create
    /// by exact name; then the configured default term.
    pub fn resolve(&self, labels: &[String], manual: &[TermId]) -> Vec<TermId> {
        if !manual.is_empty() {
            return dedup(manual.to_vec());
        }

        let mut terms: Vec<TermId> = Vec::new();
        for label in labels {
            if let Some(rule) = self.rules.iter().find(|rule| rule.matches(label)) {
                terms.push(rule.target());
            }
        }
        if !terms.is_empty() {
            return dedup(terms);
        }

        for label in labels {
            let label = label.trim();
            if label.is_empty() {
                continue;
            }
            let term = match self.taxonomy.find_term_by_name(label) {
                Some(term) => Some(term),
                None => match self.taxonomy.create_term(label) {
                    Ok(term) => Some(term),
                    Err(err) => {
                        import_warn!("failed to create term {label:?}: {err}");
                        None
                    }
                },
            };
            if let Some(term) = term {
                terms.push(term);
            }
        }
        if !terms.is_empty() {
            return dedup(terms);
        }

        vec![self.default_term]
    }
}

fn dedup(terms: Vec<TermId>) -> Vec<TermId> {
    let mut out: Vec<TermId> = Vec::with_capacity(terms.len());
    for term in terms {
        if !out.contains(&term) {
            out.push(term);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{CategoryMappingRule, MatchType, RuleError};
    use import_core::TermId;

    #[test]
    fn invalid_regex_is_rejected_at_save_time() {
        let err = CategoryMappingRule::new("[broken", MatchType::Regex, TermId(3));
        assert!(matches!(err, Err(RuleError::InvalidRegex { .. })));
    }

    #[test]
    fn empty_pattern_is_rejected() {
        let err = CategoryMappingRule::new("  ", MatchType::Exact, TermId(3));
        assert!(matches!(err, Err(RuleError::EmptyPattern)));
    }
}
