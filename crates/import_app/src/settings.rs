use std::fs;
use std::path::Path;

use import_core::{BlockStyle, DocumentStatus, ImportSettings, ScheduleSettings, TermId, UtmSettings};
use import_engine::{CategoryMappingRule, MatchType, RuleError, UtmRule};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse settings file: {0}")]
    Parse(String),
    #[error("bad category rule: {0}")]
    Rule(#[from] RuleError),
    #[error("unknown {field} value {value:?}")]
    UnknownValue { field: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize)]
struct SettingsFile {
    feed_urls: Vec<String>,
    #[serde(default)]
    feed_window: Option<usize>,
    #[serde(default)]
    default_status: Option<String>,
    #[serde(default)]
    block_style: Option<String>,
    #[serde(default)]
    default_term: Option<u64>,
    #[serde(default)]
    category_rules: Vec<RuleEntry>,
    #[serde(default)]
    utm: Option<UtmEntry>,
    #[serde(default)]
    utm_rules: Vec<UtmRuleEntry>,
    #[serde(default)]
    schedule: Option<ScheduleEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct RuleEntry {
    pattern: String,
    match_type: String,
    target: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct UtmEntry {
    enabled: bool,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    medium: Option<String>,
    #[serde(default)]
    campaign_template: Option<String>,
    #[serde(default)]
    external_only: Option<bool>,
    #[serde(default)]
    domain_whitelist: Vec<String>,
    #[serde(default)]
    site_host: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct UtmRuleEntry {
    domain_substring: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    medium: Option<String>,
    #[serde(default)]
    campaign_template: Option<String>,
    #[serde(default)]
    external_only: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
struct ScheduleEntry {
    enabled: bool,
    #[serde(default)]
    import_limit: Option<usize>,
    #[serde(default)]
    check_updates: Option<bool>,
    #[serde(default)]
    auto_resync: Option<bool>,
}

/// Everything the host needs to build an importer.
pub struct LoadedSettings {
    pub settings: ImportSettings,
    pub category_rules: Vec<CategoryMappingRule>,
    pub utm_rules: Vec<UtmRule>,
}

/// Load a RON settings file. Category rule patterns are validated here,
/// before any pipeline work starts.
pub fn load(path: &Path) -> Result<LoadedSettings, SettingsError> {
    let content = fs::read_to_string(path)?;
    let file: SettingsFile =
        ron::from_str(&content).map_err(|err| SettingsError::Parse(err.to_string()))?;

    let defaults = ImportSettings::default();
    let settings = ImportSettings {
        feed_urls: file.feed_urls,
        feed_window: file.feed_window.unwrap_or(defaults.feed_window),
        default_status: match file.default_status.as_deref() {
            None | Some("draft") => DocumentStatus::Draft,
            Some("published") => DocumentStatus::Published,
            Some(other) => {
                return Err(SettingsError::UnknownValue {
                    field: "default_status",
                    value: other.to_string(),
                })
            }
        },
        block_style: match file.block_style.as_deref() {
            None | Some("enhanced") => BlockStyle::Enhanced,
            Some("basic") => BlockStyle::Basic,
            Some(other) => {
                return Err(SettingsError::UnknownValue {
                    field: "block_style",
                    value: other.to_string(),
                })
            }
        },
        default_term: file.default_term.map(TermId).unwrap_or(defaults.default_term),
        utm: match file.utm {
            Some(entry) => {
                let base = UtmSettings::default();
                UtmSettings {
                    enabled: entry.enabled,
                    source: entry.source.unwrap_or(base.source),
                    medium: entry.medium.unwrap_or(base.medium),
                    campaign_template: entry.campaign_template.unwrap_or(base.campaign_template),
                    external_only: entry.external_only.unwrap_or(base.external_only),
                    domain_whitelist: entry.domain_whitelist,
                    site_host: entry.site_host.unwrap_or(base.site_host),
                }
            }
            None => defaults.utm,
        },
        schedule: match file.schedule {
            Some(entry) => {
                let base = ScheduleSettings::default();
                ScheduleSettings {
                    enabled: entry.enabled,
                    import_limit: entry.import_limit.unwrap_or(base.import_limit),
                    check_updates: entry.check_updates.unwrap_or(base.check_updates),
                    auto_resync: entry.auto_resync.unwrap_or(base.auto_resync),
                }
            }
            None => defaults.schedule,
        },
    };

    let mut category_rules = Vec::with_capacity(file.category_rules.len());
    for entry in file.category_rules {
        let match_type = match entry.match_type.as_str() {
            "exact" => MatchType::Exact,
            "case_insensitive" => MatchType::CaseInsensitive,
            "regex" => MatchType::Regex,
            other => {
                return Err(SettingsError::UnknownValue {
                    field: "match_type",
                    value: other.to_string(),
                })
            }
        };
        category_rules.push(CategoryMappingRule::new(
            &entry.pattern,
            match_type,
            TermId(entry.target),
        )?);
    }

    let utm_rules = file
        .utm_rules
        .into_iter()
        .map(|entry| UtmRule {
            domain_substring: entry.domain_substring,
            source: entry.source,
            medium: entry.medium,
            campaign_template: entry.campaign_template,
            external_only: entry.external_only,
        })
        .collect();

    Ok(LoadedSettings {
        settings,
        category_rules,
        utm_rules,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use import_core::{BlockStyle, DocumentStatus};

    #[test]
    fn minimal_settings_use_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, r#"(feed_urls: ["https://example.substack.com/feed"])"#).expect("write");
        let loaded = super::load(file.path()).expect("load");
        assert_eq!(loaded.settings.feed_urls.len(), 1);
        assert_eq!(loaded.settings.feed_window, 50);
        assert_eq!(loaded.settings.default_status, DocumentStatus::Draft);
        assert_eq!(loaded.settings.block_style, BlockStyle::Enhanced);
        assert!(loaded.category_rules.is_empty());
    }

    #[test]
    fn invalid_regex_rule_is_rejected_at_load() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(
            file,
            r#"(
                feed_urls: ["https://example.substack.com/feed"],
                category_rules: [(pattern: "[broken", match_type: "regex", target: 3)],
            )"#
        )
        .expect("write");
        assert!(super::load(file.path()).is_err());
    }
}
