//! Periodic read-only jobs and the ticker that fires them.
//!
//! A [`Scheduler`] keeps the next due time of each job. Every `tick` runs the
//! jobs whose time has passed; several missed firings collapse into one run.

pub mod jobs;
pub mod schedule;

pub use schedule::Cadence;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::ScheduleConfig;
use crate::ledger::Ledger;
use crate::store::LedgerStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Job {
    WeeklyPaymentReminders,
    DailyRevenueSummary,
    OverdueDebtAlerts,
    MonthlySummary,
}

impl Job {
    pub const ALL: [Job; 4] = [
        Job::WeeklyPaymentReminders,
        Job::DailyRevenueSummary,
        Job::OverdueDebtAlerts,
        Job::MonthlySummary,
    ];

    pub fn cadence(&self, schedule: &ScheduleConfig) -> Cadence {
        match self {
            Job::WeeklyPaymentReminders => schedule.weekly_reminders,
            Job::DailyRevenueSummary => schedule.daily_revenue,
            Job::OverdueDebtAlerts => schedule.overdue_alerts,
            Job::MonthlySummary => schedule.monthly_summary,
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Job::WeeklyPaymentReminders => "weekly_payment_reminders",
            Job::DailyRevenueSummary => "daily_revenue_summary",
            Job::OverdueDebtAlerts => "overdue_debt_alerts",
            Job::MonthlySummary => "monthly_summary",
        };
        f.write_str(name)
    }
}

/// outcome of one job run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    pub job: Job,
    pub ran_at: DateTime<Utc>,
    /// notifications built by the job
    pub prepared: usize,
    /// notifications the notifier accepted
    pub delivered: usize,
}

#[derive(Debug, Clone)]
struct Entry {
    job: Job,
    cadence: Cadence,
    next_run: DateTime<Utc>,
}

/// fires jobs when their cadence comes due
#[derive(Debug, Clone)]
pub struct Scheduler {
    entries: Vec<Entry>,
}

impl Scheduler {
    /// schedule every job from `schedule`, first runs strictly after `now`
    pub fn new(schedule: &ScheduleConfig, now: DateTime<Utc>) -> Self {
        let entries = Job::ALL
            .iter()
            .map(|&job| {
                let cadence = job.cadence(schedule);
                Entry {
                    job,
                    cadence,
                    next_run: cadence.next_after(now),
                }
            })
            .collect();
        Self { entries }
    }

    pub fn for_ledger<S: LedgerStore>(ledger: &Ledger<S>) -> Self {
        Self::new(&ledger.config().schedule, ledger.now())
    }

    pub fn next_run(&self, job: Job) -> Option<DateTime<Utc>> {
        self.entries.iter().find(|e| e.job == job).map(|e| e.next_run)
    }

    /// Run every due job once. A failing job is logged and rescheduled.
    pub fn tick<S: LedgerStore>(&mut self, ledger: &Ledger<S>) -> Vec<JobReport> {
        let now = ledger.now();
        let mut reports = Vec::new();
        for entry in self.entries.iter_mut().filter(|e| e.next_run <= now) {
            match ledger.run_job(entry.job) {
                Ok(report) => reports.push(report),
                Err(err) => error!(job = %entry.job, error = %err, "scheduled job failed"),
            }
            entry.next_run = entry.cadence.next_after(now);
            debug!(job = %entry.job, next_run = %entry.next_run, "job rescheduled");
        }
        reports
    }

    /// Tick every `poll` until `stop` returns true.
    pub fn run<S, F>(&mut self, ledger: &Ledger<S>, poll: std::time::Duration, mut stop: F) -> usize
    where
        S: LedgerStore,
        F: FnMut() -> bool,
    {
        let mut runs = 0;
        while !stop() {
            runs += self.tick(ledger).len();
            std::thread::sleep(poll);
        }
        runs
    }
}
