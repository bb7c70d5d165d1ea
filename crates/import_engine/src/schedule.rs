use import_core::TickReport;
use import_logging::{import_info, import_warn};

use crate::import::Importer;
use crate::resync::ChangeDetector;
use crate::stores::ImportError;

/// Persisted position inside the feed stream. The host stores this between
/// ticks; the engine only advances or resets it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleState {
    pub offset: usize,
}

impl ScheduleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restart the walk from the top of the feeds.
    pub fn reset(&mut self) {
        self.offset = 0;
    }
}

/// One scheduled run: fetch a window at the persisted offset, import up to
/// the configured limit, then optionally scan recent documents for drift
/// and resync them.
///
/// The offset advances by the number of items actually processed, so an
/// empty run leaves it unchanged and the next tick retries the same window.
pub fn run_tick(
    importer: &Importer<'_>,
    state: &mut ScheduleState,
) -> Result<TickReport, ImportError> {
    let schedule = &importer.settings().schedule;
    let mut report = TickReport {
        offset_before: state.offset,
        offset_after: state.offset,
        ..TickReport::default()
    };
    if !schedule.enabled {
        return Ok(report);
    }

    let mut items = importer.fetch_window(state.offset)?;
    if schedule.import_limit > 0 {
        items.truncate(schedule.import_limit);
    }
    report.batch = importer.import_batch(&items);
    if report.batch.total_processed() > 0 {
        state.offset += report.batch.total_processed();
        report.offset_after = state.offset;
    }

    if schedule.check_updates {
        let detector = ChangeDetector::new(importer);
        let recent = importer
            .deps()
            .documents
            .recent_imported_ids(schedule.import_limit.max(1));
        for id in recent {
            let check = match detector.check_for_update(id) {
                Ok(check) => check,
                Err(err) => {
                    import_warn!("update check failed for {id:?}: {err}");
                    continue;
                }
            };
            if !(check.found && check.changed) {
                continue;
            }
            report.drift_detected += 1;
            if schedule.auto_resync {
                match detector.resync(id) {
                    Ok(true) => report.resynced += 1,
                    Ok(false) => {}
                    Err(err) => import_warn!("resync failed for {id:?}: {err}"),
                }
            }
        }
    }

    import_info!(
        "tick done: {} imported, {} skipped, {} errors, offset {} -> {}, drift {}, resynced {}",
        report.batch.imported,
        report.batch.skipped,
        report.batch.errors,
        report.offset_before,
        report.offset_after,
        report.drift_detected,
        report.resynced
    );
    Ok(report)
}
