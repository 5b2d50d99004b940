use chrono::{Duration, NaiveTime, Weekday};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::scheduler::Cadence;

/// ledger tuning knobs; every field has a default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// payments above this amount raise a high-payment alert
    pub high_payment_threshold: Money,
    /// a client with no payment in this many days gets a reminder
    pub reminder_window_days: i64,
    pub recent_payments_limit: usize,
    pub top_debtors_limit: usize,
    pub dashboard_trend_months: u32,
    pub priority: PriorityThresholds,
    /// trailing window used for average payment statistics
    pub payment_statistics_window_months: u32,
    /// collection history feeding the business projection
    pub projection_history_months: u32,
    pub log_level: String,
    pub schedule: ScheduleConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            high_payment_threshold: Money::from_major(1000),
            reminder_window_days: 7,
            recent_payments_limit: 10,
            top_debtors_limit: 5,
            dashboard_trend_months: 6,
            priority: PriorityThresholds::default(),
            payment_statistics_window_months: 12,
            projection_history_months: 6,
            log_level: "info".to_string(),
            schedule: ScheduleConfig::default(),
        }
    }
}

/// cut-offs for high-priority debt listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityThresholds {
    /// admin view: active debts with at least this much remaining
    pub admin_min_remaining: Money,
    /// client view: own active debts with at least this total
    pub client_min_total: Money,
}

impl Default for PriorityThresholds {
    fn default() -> Self {
        Self {
            admin_min_remaining: Money::from_major(1000),
            client_min_total: Money::from_major(500),
        }
    }
}

/// firing times for the periodic jobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub weekly_reminders: Cadence,
    pub daily_revenue: Cadence,
    pub overdue_alerts: Cadence,
    pub monthly_summary: Cadence,
}

fn time_of_day(hour: i64, minute: i64) -> NaiveTime {
    NaiveTime::MIN + Duration::hours(hour) + Duration::minutes(minute)
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            weekly_reminders: Cadence::Weekly {
                weekday: Weekday::Sun,
                at: time_of_day(9, 0),
            },
            daily_revenue: Cadence::Daily { at: time_of_day(8, 0) },
            overdue_alerts: Cadence::Daily { at: time_of_day(9, 30) },
            monthly_summary: Cadence::Monthly { day: 1, at: time_of_day(10, 0) },
        }
    }
}

impl LedgerConfig {
    /// Load from `config/ledger.toml` (optional) overlaid with `LEDGER__*` env vars.
    pub fn load() -> Result<Self> {
        Self::build(
            Config::builder()
                .add_source(File::with_name("config/ledger").required(false))
                .add_source(Environment::with_prefix("LEDGER").separator("__")),
        )
    }

    /// Load from an inline TOML document.
    pub fn from_toml(source: &str) -> Result<Self> {
        Self::build(Config::builder().add_source(File::from_str(source, FileFormat::Toml)))
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config: LedgerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let positive_money = [
            ("high_payment_threshold", self.high_payment_threshold),
            ("priority.admin_min_remaining", self.priority.admin_min_remaining),
            ("priority.client_min_total", self.priority.client_min_total),
        ];
        for (field, value) in positive_money {
            if !value.is_positive() {
                return Err(invalid(field, value));
            }
        }

        if self.reminder_window_days <= 0 {
            return Err(invalid("reminder_window_days", self.reminder_window_days));
        }

        let positive_counts = [
            ("recent_payments_limit", self.recent_payments_limit as u64),
            ("top_debtors_limit", self.top_debtors_limit as u64),
            ("dashboard_trend_months", self.dashboard_trend_months as u64),
            ("payment_statistics_window_months", self.payment_statistics_window_months as u64),
            ("projection_history_months", self.projection_history_months as u64),
        ];
        for (field, value) in positive_counts {
            if value == 0 {
                return Err(invalid(field, value));
            }
        }

        for cadence in [
            &self.schedule.weekly_reminders,
            &self.schedule.daily_revenue,
            &self.schedule.overdue_alerts,
            &self.schedule.monthly_summary,
        ] {
            cadence.validate()?;
        }
        Ok(())
    }
}

fn invalid(field: &str, value: impl std::fmt::Display) -> LedgerError {
    LedgerError::Configuration {
        message: format!("{} must be positive, got {}", field, value),
    }
}
