//! Five-field cron evaluation (minute, hour, day-of-month, month,
//! day-of-week).
//!
//! Each field accepts `*`, `*/N` or a single integer. Day-of-month and
//! day-of-week are always OR'ed: a minute matches when either day field
//! matches, so a `*` in one day field makes every day eligible. Vixie cron
//! ignores a wildcard day field instead; existing schedules rely on the OR.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use thiserror::Error;

/// Upper bound on the forward scan: two (non-leap) years of minutes.
const MAX_SCAN_MINUTES: i64 = 2 * 525_600;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    #[error("invalid cron expression: expected 5 fields, got {0}")]
    FieldCount(usize),

    #[error("invalid step in {field} field: {value:?}")]
    InvalidStep { field: &'static str, value: String },

    #[error("invalid {field} field: {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("{field} value {value} out of range {min}-{max}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    #[error("unable to compute next run time after {0}")]
    Unsatisfiable(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Minute,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
}

impl FieldKind {
    const ALL: [FieldKind; 5] = [
        FieldKind::Minute,
        FieldKind::Hour,
        FieldKind::DayOfMonth,
        FieldKind::Month,
        FieldKind::DayOfWeek,
    ];

    fn name(self) -> &'static str {
        match self {
            FieldKind::Minute => "minute",
            FieldKind::Hour => "hour",
            FieldKind::DayOfMonth => "day-of-month",
            FieldKind::Month => "month",
            FieldKind::DayOfWeek => "day-of-week",
        }
    }

    fn bounds(self) -> (u32, u32) {
        match self {
            FieldKind::Minute => (0, 59),
            FieldKind::Hour => (0, 23),
            FieldKind::DayOfMonth => (1, 31),
            FieldKind::Month => (1, 12),
            // 7 is accepted as an alias for Sunday.
            FieldKind::DayOfWeek => (0, 7),
        }
    }
}

/// A single parsed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Any,
    Step { every: u32, min: u32 },
    Exact(u32),
}

impl Field {
    fn parse(raw: &str, kind: FieldKind) -> Result<Self, CronError> {
        let (min, max) = kind.bounds();

        if raw == "*" {
            return Ok(Field::Any);
        }

        if let Some(step) = raw.strip_prefix("*/") {
            return match step.parse::<u32>() {
                Ok(every) if every > 0 => Ok(Field::Step { every, min }),
                _ => Err(CronError::InvalidStep {
                    field: kind.name(),
                    value: raw.to_string(),
                }),
            };
        }

        let value: u32 = raw.parse().map_err(|_| CronError::InvalidField {
            field: kind.name(),
            value: raw.to_string(),
        })?;

        if value < min || value > max {
            return Err(CronError::OutOfRange {
                field: kind.name(),
                value,
                min,
                max,
            });
        }

        if kind == FieldKind::DayOfWeek && value == 7 {
            return Ok(Field::Exact(0));
        }
        Ok(Field::Exact(value))
    }

    fn matches(&self, value: u32) -> bool {
        match *self {
            Field::Any => true,
            Field::Step { every, min } => value.wrapping_sub(min) % every == 0,
            Field::Exact(v) => v == value,
        }
    }
}

/// A validated cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    minute: Field,
    hour: Field,
    day_of_month: Field,
    month: Field,
    day_of_week: Field,
}

impl CronSchedule {
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let raw: Vec<&str> = expr.split_whitespace().collect();
        if raw.len() != FieldKind::ALL.len() {
            return Err(CronError::FieldCount(raw.len()));
        }

        let mut fields = [Field::Any; 5];
        for ((slot, text), kind) in fields.iter_mut().zip(&raw).zip(FieldKind::ALL) {
            *slot = Field::parse(text, kind)?;
        }
        let [minute, hour, day_of_month, month, day_of_week] = fields;

        Ok(Self {
            minute,
            hour,
            day_of_month,
            month,
            day_of_week,
        })
    }

    pub fn matches(&self, t: &DateTime<Utc>) -> bool {
        self.minute.matches(t.minute())
            && self.hour.matches(t.hour())
            && self.month.matches(t.month())
            && (self.day_of_month.matches(t.day())
                || self.day_of_week.matches(t.weekday().num_days_from_sunday()))
    }

    /// First matching minute strictly after `from`.
    ///
    /// Scanning starts at the minute boundary following `from`, so the
    /// result is always later than `from` and has zero seconds.
    pub fn next_after(&self, from: DateTime<Utc>) -> Result<DateTime<Utc>, CronError> {
        let start_secs = (from.timestamp().div_euclid(60) + 1) * 60;
        let mut t =
            DateTime::<Utc>::from_timestamp(start_secs, 0).ok_or(CronError::Unsatisfiable(from))?;

        for _ in 0..MAX_SCAN_MINUTES {
            if self.matches(&t) {
                return Ok(t);
            }
            t += Duration::minutes(1);
        }
        Err(CronError::Unsatisfiable(from))
    }
}

/// Parses `expr` and returns its next firing time after `from`.
pub fn next_fire_time(expr: &str, from: DateTime<Utc>) -> Result<DateTime<Utc>, CronError> {
    CronSchedule::parse(expr)?.next_after(from)
}
