//! Cron-driven backup scheduling
//!
//! One tokio task per configured cadence. Each task sleeps until the next
//! fire time, runs a full backup and loops. A cadence's task awaits its
//! backup before computing the next fire time, so runs of one cadence never
//! overlap and triggers that pass during a run are skipped. Different
//! cadences run independently.

mod cadence;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::backup::{BackupOptions, BackupService};
use crate::config::ScheduleSettings;
use crate::error::{KeepsakeError, KeepsakeResult};

pub use cadence::{next_fire_time, Cadence};

/// A cadence bound to its cron expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub cadence: Cadence,
    pub expression: String,
}

/// Snapshot of one entry for status output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleStatus {
    pub cadence: Cadence,
    pub expression: String,
    pub running: bool,
    pub next_run: Option<DateTime<Utc>>,
}

/// Runs scheduled backups against a shared [`BackupService`]
pub struct BackupScheduler {
    service: Arc<BackupService>,
    enabled: bool,
    entries: Vec<ScheduleEntry>,
    tasks: Mutex<HashMap<Cadence, JoinHandle<()>>>,
}

impl BackupScheduler {
    /// Register an entry for every configured cadence
    ///
    /// Invalid cron expressions are configuration errors.
    pub fn new(service: Arc<BackupService>, settings: &ScheduleSettings) -> KeepsakeResult<Self> {
        let mut entries = Vec::new();

        for cadence in Cadence::ALL {
            let Some(expression) = settings.expression(cadence) else {
                continue;
            };
            let expression = expression.trim();
            if expression.is_empty() {
                continue;
            }

            next_fire_time(expression, Utc::now()).map_err(|_| {
                KeepsakeError::Config(format!(
                    "{} is not a valid cron expression: '{}'",
                    cadence.env_key(),
                    expression
                ))
            })?;

            entries.push(ScheduleEntry {
                cadence,
                expression: expression.to_string(),
            });
        }

        Ok(Self {
            service,
            enabled: settings.enabled,
            entries,
            tasks: Mutex::new(HashMap::new()),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<Cadence, JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn a task for every entry not already running
    ///
    /// Returns the number of tasks started. Must be called inside a tokio
    /// runtime.
    pub fn start(&self) -> usize {
        if !self.enabled {
            info!("Backup scheduler is disabled");
            return 0;
        }

        let mut tasks = self.tasks();
        let mut started = 0;

        for entry in &self.entries {
            if tasks.get(&entry.cadence).is_some_and(|h| !h.is_finished()) {
                continue;
            }

            let handle = tokio::spawn(run_cadence(self.service.clone(), entry.clone()));
            tasks.insert(entry.cadence, handle);
            started += 1;
            info!(cadence = %entry.cadence, expression = %entry.expression, "Scheduled backups started");
        }

        started
    }

    /// Abort every running task
    pub fn stop(&self) {
        for (cadence, handle) in self.tasks().drain() {
            handle.abort();
            info!(cadence = %cadence, "Scheduled backups stopped");
        }
    }

    /// Per-cadence expression, running flag and next fire time
    pub fn get_status(&self) -> Vec<ScheduleStatus> {
        let tasks = self.tasks();
        let now = Utc::now();

        self.entries
            .iter()
            .map(|entry| ScheduleStatus {
                cadence: entry.cadence,
                expression: entry.expression.clone(),
                running: tasks.get(&entry.cadence).is_some_and(|h| !h.is_finished()),
                next_run: next_fire_time(&entry.expression, now).ok(),
            })
            .collect()
    }
}

impl Drop for BackupScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run one scheduled backup, reporting success instead of propagating errors
pub async fn run_scheduled_backup(service: &BackupService, cadence: Cadence) -> bool {
    info!(cadence = %cadence, "Scheduled backup starting");

    match service
        .create_full_backup(BackupOptions::scheduled(cadence))
        .await
    {
        Ok(result) => {
            info!(
                cadence = %cadence,
                backup_id = %result.backup_id,
                size = result.metadata.size,
                "Scheduled backup completed"
            );
            true
        }
        Err(e) => {
            error!(cadence = %cadence, error = %e, "Scheduled backup failed");
            false
        }
    }
}

async fn run_cadence(service: Arc<BackupService>, entry: ScheduleEntry) {
    loop {
        let now = Utc::now();
        let next = match next_fire_time(&entry.expression, now) {
            Ok(next) => next,
            Err(e) => {
                warn!(cadence = %entry.cadence, error = %e, "No further fire time");
                return;
            }
        };

        let wait = (next - now).to_std().unwrap_or_default();
        info!(cadence = %entry.cadence, next_run = %next, "Next scheduled backup");
        tokio::time::sleep(wait).await;

        run_scheduled_backup(&service, entry.cadence).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackupSettings;
    use crate::process::testing::FakeRunner;
    use tempfile::TempDir;

    fn service(temp: &TempDir, runner: FakeRunner) -> Arc<BackupService> {
        Arc::new(BackupService::new(
            BackupSettings::rooted_at(temp.path()),
            Arc::new(runner),
        ))
    }

    fn schedule(enabled: bool) -> ScheduleSettings {
        ScheduleSettings {
            enabled,
            daily: Some("0 2 * * *".to_string()),
            weekly: None,
            monthly: Some("0 4 1 * *".to_string()),
        }
    }

    #[test]
    fn test_entries_only_for_configured_cadences() {
        let temp = TempDir::new().unwrap();
        let scheduler = BackupScheduler::new(service(&temp, FakeRunner::default()), &schedule(true)).unwrap();

        let cadences: Vec<Cadence> = scheduler.entries().iter().map(|e| e.cadence).collect();
        assert_eq!(cadences, vec![Cadence::Daily, Cadence::Monthly]);
    }

    #[test]
    fn test_invalid_expression_is_config_error() {
        let temp = TempDir::new().unwrap();
        let settings = ScheduleSettings {
            enabled: true,
            weekly: Some("every sunday".to_string()),
            ..Default::default()
        };

        let err = BackupScheduler::new(service(&temp, FakeRunner::default()), &settings)
            .err()
            .unwrap();
        assert!(err.is_config());
        assert!(err.to_string().contains("BACKUP_SCHEDULE_WEEKLY"));
    }

    #[tokio::test]
    async fn test_start_stop_status() {
        let temp = TempDir::new().unwrap();
        let scheduler = BackupScheduler::new(service(&temp, FakeRunner::default()), &schedule(true)).unwrap();

        assert!(scheduler.get_status().iter().all(|s| !s.running));

        assert_eq!(scheduler.start(), 2);
        // Already running
        assert_eq!(scheduler.start(), 0);

        let status = scheduler.get_status();
        assert_eq!(status.len(), 2);
        assert!(status.iter().all(|s| s.running && s.next_run.is_some()));
        assert_eq!(status[0].expression, "0 2 * * *");

        scheduler.stop();
        assert!(scheduler.get_status().iter().all(|s| !s.running));
    }

    #[tokio::test]
    async fn test_disabled_scheduler_starts_nothing() {
        let temp = TempDir::new().unwrap();
        let scheduler = BackupScheduler::new(service(&temp, FakeRunner::default()), &schedule(false)).unwrap();

        assert!(!scheduler.is_enabled());
        assert_eq!(scheduler.start(), 0);
        assert!(scheduler.get_status().iter().all(|s| !s.running));
    }

    #[tokio::test]
    async fn test_scheduled_run_records_cadence() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, FakeRunner::default());

        assert!(run_scheduled_backup(&service, Cadence::Weekly).await);

        let backups = service.list_backups().await.unwrap();
        assert_eq!(backups.len(), 1);
        assert!(backups[0].metadata.scheduled);
        assert_eq!(backups[0].metadata.cadence, Some(Cadence::Weekly));
    }

    #[tokio::test]
    async fn test_scheduled_failure_is_isolated() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, FakeRunner::failing("mongodump"));

        assert!(!run_scheduled_backup(&service, Cadence::Daily).await);
        // The next trigger still runs
        assert!(!run_scheduled_backup(&service, Cadence::Daily).await);
        assert!(service.list_backups().await.unwrap().is_empty());
    }
}
