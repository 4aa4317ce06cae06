//! Cron-driven scheduled sync.
//!
//! [`CronSchedule`] parses five-field expressions (`min hour dom month dow`)
//! with `*`, single values, `a-b` ranges, `,` lists and `/n` steps. Times are
//! evaluated at a fixed UTC offset.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, FixedOffset, Timelike, Utc};
use tokio::task::JoinHandle;

use instasync_core::config::ScheduleConfig;
use instasync_core::{SyncError, SyncRunner};

/// Search horizon for the next fire time.
const MAX_LOOKAHEAD_DAYS: i64 = 366 * 5;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    allowed: Vec<bool>,
    min: u32,
    restricted: bool,
}

impl Field {
    fn parse(expr: &str, min: u32, max: u32, name: &str) -> Result<Self, SyncError> {
        let invalid = |detail: &str| SyncError::Config(format!("cron {name} field '{expr}': {detail}"));
        let mut allowed = vec![false; (max - min + 1) as usize];

        for part in expr.split(',') {
            let (range, step) = match part.split_once('/') {
                Some((r, s)) => {
                    let step: u32 = s.parse().map_err(|_| invalid("bad step"))?;
                    if step == 0 {
                        return Err(invalid("step must be positive"));
                    }
                    (r, step)
                }
                None => (part, 1),
            };
            let (lo, hi) = if range == "*" {
                (min, max)
            } else if let Some((a, b)) = range.split_once('-') {
                let a: u32 = a.parse().map_err(|_| invalid("bad range start"))?;
                let b: u32 = b.parse().map_err(|_| invalid("bad range end"))?;
                (a, b)
            } else {
                let v: u32 = range.parse().map_err(|_| invalid("bad value"))?;
                // `5/15` means 5, 20, 35, ...
                if part.contains('/') {
                    (v, max)
                } else {
                    (v, v)
                }
            };
            if lo < min || hi > max || lo > hi {
                return Err(invalid("out of range"));
            }
            for v in (lo..=hi).step_by(step as usize) {
                allowed[(v - min) as usize] = true;
            }
        }

        Ok(Self {
            allowed,
            min,
            restricted: expr != "*",
        })
    }

    fn matches(&self, v: u32) -> bool {
        v.checked_sub(self.min)
            .and_then(|i| self.allowed.get(i as usize))
            .copied()
            .unwrap_or(false)
    }
}

/// A parsed five-field cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expr: String,
    minute: Field,
    hour: Field,
    day_of_month: Field,
    month: Field,
    day_of_week: Field,
}

impl CronSchedule {
    pub fn parse(expr: &str) -> Result<Self, SyncError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        let [minute, hour, dom, month, dow] = fields.as_slice() else {
            return Err(SyncError::Config(format!(
                "cron expression '{expr}' must have 5 fields"
            )));
        };
        let mut day_of_week = Field::parse(dow, 0, 7, "day-of-week")?;
        // 7 is Sunday too.
        if day_of_week.matches(7) {
            day_of_week.allowed[0] = true;
        }
        Ok(Self {
            expr: expr.to_string(),
            minute: Field::parse(minute, 0, 59, "minute")?,
            hour: Field::parse(hour, 0, 23, "hour")?,
            day_of_month: Field::parse(dom, 1, 31, "day-of-month")?,
            month: Field::parse(month, 1, 12, "month")?,
            day_of_week,
        })
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }

    fn day_matches(&self, t: &DateTime<FixedOffset>) -> bool {
        if !self.month.matches(t.month()) {
            return false;
        }
        let dom = self.day_of_month.matches(t.day());
        let dow = self.day_of_week.matches(t.weekday().num_days_from_sunday());
        match (self.day_of_month.restricted, self.day_of_week.restricted) {
            (true, true) => dom || dow,
            (true, false) => dom,
            (false, true) => dow,
            (false, false) => true,
        }
    }

    /// First fire time strictly after `after`, evaluated at `offset`.
    pub fn next_after(&self, after: DateTime<Utc>, offset: FixedOffset) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&offset);
        let mut t = local.with_second(0)?.with_nanosecond(0)? + ChronoDuration::minutes(1);
        let horizon = local + ChronoDuration::days(MAX_LOOKAHEAD_DAYS);

        while t <= horizon {
            if !self.day_matches(&t) {
                t = (t + ChronoDuration::days(1)).with_hour(0)?.with_minute(0)?;
                continue;
            }
            if !self.hour.matches(t.hour()) {
                t = (t + ChronoDuration::hours(1)).with_minute(0)?;
                continue;
            }
            if !self.minute.matches(t.minute()) {
                t = t + ChronoDuration::minutes(1);
                continue;
            }
            return Some(t.with_timezone(&Utc));
        }
        None
    }
}

fn offset_from_minutes(minutes: i32) -> Result<FixedOffset, SyncError> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| SyncError::Config(format!("UTC offset of {minutes} minutes is out of range")))
}

/// Runs a full sync at every fire time of the configured schedule.
pub struct DailyScheduler {
    runner: Arc<SyncRunner>,
    schedule: CronSchedule,
    offset: FixedOffset,
}

impl DailyScheduler {
    pub fn new(runner: Arc<SyncRunner>, config: &ScheduleConfig) -> Result<Self, SyncError> {
        Ok(Self {
            runner,
            schedule: CronSchedule::parse(&config.cron)?,
            offset: offset_from_minutes(config.utc_offset_minutes)?,
        })
    }

    pub fn next_fire(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.next_after(now, self.offset)
    }

    /// Run one scheduled sync. Failures are logged, never raised.
    pub async fn tick(&self) {
        match self.runner.sync_all().await {
            Ok(report) => tracing::info!(
                run_id = %report.run_id,
                written = report.written,
                skipped = report.skipped,
                "scheduled sync finished"
            ),
            Err(SyncError::AlreadyRunning) => {
                tracing::warn!("scheduled sync skipped, a run is already in progress")
            }
            Err(e) => tracing::error!(error = %e, "scheduled sync failed"),
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let Some(next) = self.next_fire(now) else {
                    tracing::error!(cron = self.schedule.expr(), "schedule never fires, stopping");
                    return;
                };
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                tracing::info!(
                    cron = self.schedule.expr(),
                    next = %next.with_timezone(&self.offset),
                    wait_secs = wait.as_secs(),
                    "next scheduled sync"
                );
                tokio::time::sleep(wait).await;
                self.tick().await;
            }
        })
    }
}
