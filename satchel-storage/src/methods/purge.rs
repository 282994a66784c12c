//! Bounded retention for dead actions.

use crate::provider::rows;
use crate::{StorageError, StorageProvider};
use chrono::{DateTime, Duration, Utc};
use satchel_codec::envelope::ActionStatus;
use tracing::info;

/// Retention windows. There is no normative default; callers choose
/// both cutoffs explicitly.
#[derive(Debug, Clone)]
pub struct PurgeParams {
    pub purge_failed_after: Duration,
    pub purge_nosend_after: Duration,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PurgeSummary {
    pub actions_purged: usize,
    pub rows_deleted: u64,
}

/// Delete `failed` and `nosend` actions older than their window,
/// together with their orphan outputs. An output spent by a surviving
/// action is kept as a historical record.
pub fn purge_data(
    provider: &StorageProvider,
    params: &PurgeParams,
) -> Result<PurgeSummary, StorageError> {
    let now = Utc::now();
    purge_data_at(provider, params, now)
}

/// Purge against an explicit clock; the testable entry point.
pub fn purge_data_at(
    provider: &StorageProvider,
    params: &PurgeParams,
    now: DateTime<Utc>,
) -> Result<PurgeSummary, StorageError> {
    provider.with_tx(|c| {
        let mut doomed = rows::actions_older_than(
            c,
            ActionStatus::Failed,
            now - params.purge_failed_after,
        )?;
        doomed.extend(rows::actions_older_than(
            c,
            ActionStatus::Nosend,
            now - params.purge_nosend_after,
        )?);

        let purged_ids: Vec<i64> = doomed.iter().map(|a| a.action_id).collect();
        let mut summary = PurgeSummary::default();
        for action in &doomed {
            summary.rows_deleted += rows::delete_action_cascade(c, action.action_id, &purged_ids)?;
            summary.actions_purged += 1;
        }
        if summary.actions_purged > 0 {
            info!(
                actions = summary.actions_purged,
                rows = summary.rows_deleted,
                "purged dead actions"
            );
        }
        Ok(summary)
    })
}
