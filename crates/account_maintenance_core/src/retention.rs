use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::contract::DEFAULT_RETENTION_DAYS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub snapshot_id: String,
    /// `None` when the provider omitted the start time; such snapshots never expire.
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub retention_days: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("retention period of {retention_days} days is out of range")]
pub struct CutoffOutOfRange {
    pub retention_days: u32,
}

impl RetentionPolicy {
    pub fn cutoff(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, CutoffOutOfRange> {
        Duration::try_days(i64::from(self.retention_days))
            .and_then(|period| now.checked_sub_signed(period))
            .ok_or(CutoffOutOfRange {
                retention_days: self.retention_days,
            })
    }

    /// Splits snapshots into those strictly older than the cutoff and the rest,
    /// preserving listing order in both halves.
    pub fn partition(
        &self,
        snapshots: Vec<SnapshotRecord>,
        now: DateTime<Utc>,
    ) -> Result<RetentionPlan, CutoffOutOfRange> {
        let cutoff = self.cutoff(now)?;
        let (expired, retained): (Vec<_>, Vec<_>) = snapshots
            .into_iter()
            .partition(|snapshot| is_expired(snapshot, cutoff));
        Ok(RetentionPlan {
            cutoff,
            expired,
            retained,
        })
    }
}

fn is_expired(snapshot: &SnapshotRecord, cutoff: DateTime<Utc>) -> bool {
    snapshot
        .created_at
        .map(|created_at| created_at < cutoff)
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPlan {
    pub cutoff: DateTime<Utc>,
    pub expired: Vec<SnapshotRecord>,
    pub retained: Vec<SnapshotRecord>,
}
