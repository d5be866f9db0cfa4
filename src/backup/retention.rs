//! Tiered retention
//!
//! Every backup falls into exactly one age tier. Within a tier only the
//! newest `N` backups survive, where `N` comes from the [`RetentionPolicy`].

use std::fmt;

use chrono::{DateTime, Utc};

use super::types::BackupInfo;
use crate::config::RetentionPolicy;

/// Age bucket used by retention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetentionTier {
    /// 0-7 days old
    Daily,
    /// 8-30 days old
    Weekly,
    /// Older than 30 days
    Monthly,
}

impl RetentionTier {
    /// Bucket for an age in whole days
    pub fn for_age_days(days: i64) -> Self {
        match days {
            d if d <= 7 => RetentionTier::Daily,
            d if d <= 30 => RetentionTier::Weekly,
            _ => RetentionTier::Monthly,
        }
    }

    /// Bucket for a backup taken at `timestamp`
    pub fn for_timestamp(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self::for_age_days(now.signed_duration_since(timestamp).num_days())
    }

    /// How many backups the policy keeps in this tier
    pub fn limit(&self, policy: &RetentionPolicy) -> usize {
        match self {
            RetentionTier::Daily => policy.daily as usize,
            RetentionTier::Weekly => policy.weekly as usize,
            RetentionTier::Monthly => policy.monthly as usize,
        }
    }
}

impl fmt::Display for RetentionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetentionTier::Daily => write!(f, "daily"),
            RetentionTier::Weekly => write!(f, "weekly"),
            RetentionTier::Monthly => write!(f, "monthly"),
        }
    }
}

/// Which backups a cleanup pass keeps and deletes
#[derive(Debug, Default)]
pub struct RetentionPlan<'a> {
    pub keep: Vec<&'a BackupInfo>,
    pub delete: Vec<(&'a BackupInfo, RetentionTier)>,
}

/// Decide what a cleanup pass at `now` should delete
pub fn plan_retention<'a>(
    backups: &'a [BackupInfo],
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> RetentionPlan<'a> {
    let mut plan = RetentionPlan::default();

    for tier in [RetentionTier::Daily, RetentionTier::Weekly, RetentionTier::Monthly] {
        let mut bucket: Vec<&BackupInfo> = backups
            .iter()
            .filter(|b| RetentionTier::for_timestamp(b.timestamp(), now) == tier)
            .collect();

        // Newest first
        bucket.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()).then_with(|| b.id().cmp(a.id())));

        let limit = tier.limit(policy);
        for (index, backup) in bucket.into_iter().enumerate() {
            if index < limit {
                plan.keep.push(backup);
            } else {
                plan.delete.push((backup, tier));
            }
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::types::{ArtifactKind, BackupComponents, BackupMetadata, BackupType};
    use chrono::Duration;
    use std::path::PathBuf;

    fn backup_aged(now: DateTime<Utc>, days: i64) -> BackupInfo {
        let id = format!("aged-{:03}", days);
        BackupInfo {
            metadata: BackupMetadata {
                id: id.clone(),
                backup_type: BackupType::Full,
                base_backup_id: None,
                timestamp: now - Duration::days(days) - Duration::minutes(1),
                duration: 10,
                size: 100,
                components: BackupComponents::default(),
                scheduled: false,
                cadence: None,
            },
            path: PathBuf::from(format!("/backups/full-{}", id)),
            kind: ArtifactKind::Directory,
            artifact_size: 100,
        }
    }

    fn ids<'a>(items: impl IntoIterator<Item = &'a BackupInfo>) -> Vec<String> {
        let mut ids: Vec<String> = items.into_iter().map(|b| b.id().to_string()).collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(RetentionTier::for_age_days(0), RetentionTier::Daily);
        assert_eq!(RetentionTier::for_age_days(7), RetentionTier::Daily);
        assert_eq!(RetentionTier::for_age_days(8), RetentionTier::Weekly);
        assert_eq!(RetentionTier::for_age_days(30), RetentionTier::Weekly);
        assert_eq!(RetentionTier::for_age_days(31), RetentionTier::Monthly);
        // Clock skew: a backup from the future is the newest daily
        assert_eq!(RetentionTier::for_age_days(-1), RetentionTier::Daily);
    }

    #[test]
    fn test_keeps_newest_per_tier() {
        let now = Utc::now();
        let backups: Vec<_> = [2, 5, 9, 20, 40, 100]
            .iter()
            .map(|d| backup_aged(now, *d))
            .collect();
        let policy = RetentionPolicy {
            daily: 1,
            weekly: 1,
            monthly: 1,
        };

        let plan = plan_retention(&backups, &policy, now);

        assert_eq!(plan.keep.len(), 3);
        assert_eq!(ids(plan.keep.iter().copied()), vec!["aged-002", "aged-009", "aged-040"]);
        assert_eq!(
            ids(plan.delete.iter().map(|(b, _)| *b)),
            vec!["aged-005", "aged-020", "aged-100"]
        );
    }

    #[test]
    fn test_zero_daily_deletes_everything_recent() {
        let now = Utc::now();
        let backups: Vec<_> = [0, 1, 3, 7, 12].iter().map(|d| backup_aged(now, *d)).collect();
        let policy = RetentionPolicy {
            daily: 0,
            weekly: 4,
            monthly: 12,
        };

        let plan = plan_retention(&backups, &policy, now);

        assert_eq!(ids(plan.keep.iter().copied()), vec!["aged-012"]);
        assert_eq!(plan.delete.len(), 4);
        assert!(plan.delete.iter().all(|(_, tier)| *tier == RetentionTier::Daily));
    }

    #[test]
    fn test_under_limit_keeps_all() {
        let now = Utc::now();
        let backups: Vec<_> = [1, 2, 3].iter().map(|d| backup_aged(now, *d)).collect();

        let plan = plan_retention(&backups, &RetentionPolicy::default(), now);
        assert_eq!(plan.keep.len(), 3);
        assert!(plan.delete.is_empty());
    }
}
