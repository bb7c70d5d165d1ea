use crate::document::{DocumentStatus, TermId};

/// How many recent items per feed the change detector scans. Items older
/// than this window are reported not-found rather than unchanged.
pub const DEFAULT_FEED_WINDOW: usize = 50;

/// Which block converter variant to run. A plain host switch; both variants
/// honor the same per-tag contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockStyle {
    Basic,
    #[default]
    Enhanced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSettings {
    pub enabled: bool,
    /// Upper bound on items imported per tick; 0 means unlimited.
    pub import_limit: usize,
    /// Scan recently imported documents for upstream drift after importing.
    pub check_updates: bool,
    /// When drift is found, resync immediately. Independent of
    /// `check_updates` detection itself.
    pub auto_resync: bool,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            import_limit: 10,
            check_updates: false,
            auto_resync: false,
        }
    }
}

/// Global UTM tagging settings. Per-domain overrides live in the engine's
/// rule list and win over these defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtmSettings {
    pub enabled: bool,
    pub source: String,
    pub medium: String,
    /// Campaign template; placeholders `{slug}`, `{doc_id}`,
    /// `{source_host}`, `{y}`, `{m}`, `{d}` are substituted per document.
    pub campaign_template: String,
    /// Only tag links whose host differs from the site host.
    pub external_only: bool,
    /// When non-empty, only hosts containing one of these substrings are
    /// tagged at all.
    pub domain_whitelist: Vec<String>,
    /// Host of the publishing site, used for the external-only check.
    pub site_host: String,
}

impl Default for UtmSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            source: "newsletter".to_string(),
            medium: "referral".to_string(),
            campaign_template: "{slug}".to_string(),
            external_only: true,
            domain_whitelist: Vec::new(),
            site_host: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSettings {
    /// Feed URLs in configured order; the change detector scans them in
    /// this order and the first match wins.
    pub feed_urls: Vec<String>,
    /// Most recent N items fetched per feed.
    pub feed_window: usize,
    pub default_status: DocumentStatus,
    pub block_style: BlockStyle,
    /// Fallback term when no category could be resolved.
    pub default_term: TermId,
    pub utm: UtmSettings,
    pub schedule: ScheduleSettings,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            feed_urls: Vec::new(),
            feed_window: DEFAULT_FEED_WINDOW,
            default_status: DocumentStatus::Draft,
            block_style: BlockStyle::default(),
            default_term: TermId(1),
            utm: UtmSettings::default(),
            schedule: ScheduleSettings::default(),
        }
    }
}
