//! Backup cadences and cron evaluation

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{KeepsakeError, KeepsakeResult};

/// How often a scheduled backup recurs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Daily,
    Weekly,
    Monthly,
}

impl Cadence {
    pub const ALL: [Cadence; 3] = [Cadence::Daily, Cadence::Weekly, Cadence::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Daily => "daily",
            Cadence::Weekly => "weekly",
            Cadence::Monthly => "monthly",
        }
    }

    /// Environment key holding this cadence's cron expression
    pub fn env_key(&self) -> &'static str {
        match self {
            Cadence::Daily => "BACKUP_SCHEDULE_DAILY",
            Cadence::Weekly => "BACKUP_SCHEDULE_WEEKLY",
            Cadence::Monthly => "BACKUP_SCHEDULE_MONTHLY",
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cadence {
    type Err = KeepsakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(Cadence::Daily),
            "weekly" => Ok(Cadence::Weekly),
            "monthly" => Ok(Cadence::Monthly),
            other => Err(KeepsakeError::Validation(format!("Unknown cadence '{}'", other))),
        }
    }
}

/// Next time after `after` that matches a five-field cron expression
pub fn next_fire_time(expression: &str, after: DateTime<Utc>) -> KeepsakeResult<DateTime<Utc>> {
    cron_parser::parse(expression, &after).map_err(|e| {
        KeepsakeError::Schedule(format!("Invalid cron expression '{}': {:?}", expression, e))
    })
}
