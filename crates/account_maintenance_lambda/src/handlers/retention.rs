use account_maintenance_core::contract::{RetentionReport, RetentionResponse};
use account_maintenance_core::error::ProviderError;
use account_maintenance_core::pagination::paginate;
use account_maintenance_core::retention::{CutoffOutOfRange, RetentionPolicy, SnapshotRecord};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::adapters::snapshots::{AccountIdentity, SnapshotCatalog};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetentionError {
    #[error(transparent)]
    Cutoff(#[from] CutoffOutOfRange),
    #[error("could not resolve the calling account: {0}")]
    Identity(#[source] ProviderError),
    #[error("could not list snapshots: {0}")]
    Listing(#[source] ProviderError),
}

/// Deletes every snapshot owned by the calling account that is older than
/// the policy cutoff. An out-of-range cutoff, identity failures and listing
/// failures abort before any delete;
/// a failed delete is logged and counted as skipped.
pub fn enforce_retention(
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
    identity: &impl AccountIdentity,
    catalog: &impl SnapshotCatalog,
) -> RetentionResponse {
    match run_retention(policy, now, identity, catalog) {
        Ok(report) => RetentionResponse::Success(report),
        Err(failure) => {
            error!(event = "retention_failed", error = %failure, "snapshot cleanup aborted");
            RetentionResponse::Error {
                message: failure.to_string(),
            }
        }
    }
}

fn run_retention(
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
    identity: &impl AccountIdentity,
    catalog: &impl SnapshotCatalog,
) -> Result<RetentionReport, RetentionError> {
    policy.cutoff(now)?;
    let account_id = identity
        .caller_account_id()
        .map_err(RetentionError::Identity)?;
    info!(
        event = "retention_started",
        account_id = %account_id,
        retention_days = policy.retention_days,
        "running snapshot cleanup"
    );

    let snapshots = paginate(|token| catalog.snapshot_page(&account_id, token))
        .collect::<Result<Vec<SnapshotRecord>, _>>()
        .map_err(RetentionError::Listing)?;
    let total = snapshots.len();

    let plan = policy.partition(snapshots, now)?;
    info!(
        event = "retention_planned",
        cutoff = %plan.cutoff.to_rfc3339(),
        listed = total,
        expired = plan.expired.len(),
        "partitioned snapshots by age"
    );

    let mut deleted_snapshots = Vec::with_capacity(plan.expired.len());
    let mut failed_snapshots = Vec::new();
    for snapshot in plan.expired {
        match catalog.delete_snapshot(&snapshot.snapshot_id) {
            Ok(()) => {
                info!(
                    event = "snapshot_deleted",
                    snapshot_id = %snapshot.snapshot_id,
                    created_at = ?snapshot.created_at,
                    "deleted snapshot"
                );
                deleted_snapshots.push(snapshot.snapshot_id);
            }
            Err(failure) => {
                warn!(
                    event = "snapshot_delete_failed",
                    snapshot_id = %snapshot.snapshot_id,
                    error = %failure,
                    "failed to delete snapshot"
                );
                failed_snapshots.push(snapshot.snapshot_id);
            }
        }
    }

    let report = RetentionReport {
        deleted_count: deleted_snapshots.len(),
        skipped_count: plan.retained.len() + failed_snapshots.len(),
        deleted_snapshots,
        failed_snapshots,
    };
    info!(
        event = "retention_completed",
        deleted = report.deleted_count,
        skipped = report.skipped_count,
        failed = report.failed_snapshots.len(),
        "snapshot cleanup complete"
    );
    Ok(report)
}
