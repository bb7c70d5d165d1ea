use std::collections::BTreeMap;

/// Tri-count result of a batch import. A zero-item outcome with zero errors
/// is a valid "nothing new" result, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchOutcome {
    pub imported: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl BatchOutcome {
    pub fn total_processed(&self) -> usize {
        self.imported + self.skipped + self.errors
    }
}

/// Result of comparing a stored document against its upstream feed item.
///
/// `found == false` means the item has scrolled out of the feed's visible
/// window; it says nothing about whether the content changed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateCheck {
    pub found: bool,
    pub changed: bool,
    pub new_hash: Option<String>,
    pub old_hash: Option<String>,
}

/// Validator report. Non-blocking: callers persist regardless and surface
/// the report through the log sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn clean() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Counters from one UTM tagging pass over a document body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UtmStats {
    pub scanned: usize,
    pub tagged: usize,
    pub skipped_existing: usize,
    pub skipped_non_http: usize,
    pub skipped_internal: usize,
    pub by_domain: BTreeMap<String, usize>,
}

/// Summary of one scheduled run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TickReport {
    pub batch: BatchOutcome,
    pub offset_before: usize,
    pub offset_after: usize,
    pub drift_detected: usize,
    pub resynced: usize,
}
