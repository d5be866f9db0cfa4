//! Scheduler status formatting

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::scheduler::ScheduleStatus;

#[derive(Tabled)]
struct ScheduleRow {
    #[tabled(rename = "Cadence")]
    cadence: String,
    #[tabled(rename = "Expression")]
    expression: String,
    #[tabled(rename = "Running")]
    running: String,
    #[tabled(rename = "Next run")]
    next_run: String,
}

pub fn format_schedule_status(enabled: bool, statuses: &[ScheduleStatus]) -> String {
    if statuses.is_empty() {
        return "No backup schedules configured (set BACKUP_SCHEDULE_DAILY, _WEEKLY or _MONTHLY)"
            .to_string();
    }

    let rows: Vec<ScheduleRow> = statuses
        .iter()
        .map(|s| ScheduleRow {
            cadence: s.cadence.to_string(),
            expression: s.expression.clone(),
            running: if s.running { "yes" } else { "no" }.to_string(),
            next_run: s
                .next_run
                .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    let header = if enabled {
        "Scheduler: enabled"
    } else {
        "Scheduler: disabled (BACKUP_SCHEDULER_ENABLED=false)"
    };
    format!("{}\n{}", header, Table::new(rows).with(Style::rounded()))
}
