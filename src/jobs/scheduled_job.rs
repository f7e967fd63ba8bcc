use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid cron expression '{expression}' for '{name}': {reason}")]
    InvalidCron {
        name: String,
        expression: String,
        reason: String,
    },
}

/// A job enqueued on a cron schedule
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub name: String,
    pub job_name: &'static str,
    pub arguments: serde_json::Value,
    pub cron_expression: String,
}

impl ScheduledJob {
    pub fn new(job_name: &'static str, cron_expression: impl Into<String>) -> Self {
        Self {
            name: job_name.to_string(),
            job_name,
            arguments: serde_json::json!({}),
            cron_expression: cron_expression.into(),
        }
    }

    /// Arguments for the run of one tick. Jobs evaluate "now" as the tick
    /// time, so a delayed or retried run covers the same period.
    pub fn arguments_at(&self, tick: DateTime<Utc>) -> serde_json::Value {
        let mut arguments = match &self.arguments {
            serde_json::Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        arguments.insert(
            "as_of".to_string(),
            serde_json::Value::String(tick.to_rfc3339()),
        );
        serde_json::Value::Object(arguments)
    }

    pub fn schedule(&self) -> Result<cron::Schedule, ScheduleError> {
        let expression = normalize_cron_expression(&self.cron_expression);
        cron::Schedule::from_str(&expression).map_err(|e| ScheduleError::InvalidCron {
            name: self.name.clone(),
            expression: self.cron_expression.clone(),
            reason: e.to_string(),
        })
    }
}

/// The `cron` crate wants a leading seconds field; classic five-field
/// expressions fire at second zero.
pub fn normalize_cron_expression(expression: &str) -> String {
    let expression = expression.trim();
    if expression.split_whitespace().count() == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Timelike, Utc};

    use super::*;

    #[test]
    fn test_five_field_expression_gains_seconds() {
        assert_eq!(normalize_cron_expression("*/15 * * * *"), "0 */15 * * * *");
        assert_eq!(normalize_cron_expression(" 0 9 * * * "), "0 0 9 * * *");
    }

    #[test]
    fn test_tick_arguments_carry_the_tick_time() {
        let job = ScheduledJob::new("consultation_reminders", "*/15 * * * *");
        let tick = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();

        let arguments = job.arguments_at(tick);

        assert_eq!(arguments["as_of"], "2026-03-02T10:00:00+00:00");
        let parsed: DateTime<Utc> =
            serde_json::from_value(arguments["as_of"].clone()).unwrap();
        assert_eq!(parsed, tick);
    }

    #[test]
    fn test_six_field_expression_is_kept() {
        assert_eq!(normalize_cron_expression("30 0 9 * * *"), "30 0 9 * * *");
    }

    #[test]
    fn test_daily_spotlight_schedule_fires_at_ten_past_midnight() {
        let job = ScheduledJob::new("spotlight_rotation", "10 0 * * *");
        let schedule = job.schedule().expect("schedule should parse");

        let after = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let next = schedule.after(&after).next().unwrap();

        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 2, 0, 10, 0).unwrap());
    }

    #[test]
    fn test_quarter_hour_schedule() {
        let job = ScheduledJob::new("consultation_reminders", "*/15 * * * *");
        let schedule = job.schedule().expect("schedule should parse");

        let after = Utc.with_ymd_and_hms(2026, 3, 1, 12, 7, 30).unwrap();
        let upcoming: Vec<_> = schedule.after(&after).take(3).map(|t| t.minute()).collect();

        assert_eq!(upcoming, vec![15, 30, 45]);
    }

    #[test]
    fn test_invalid_expression_is_rejected() {
        let job = ScheduledJob::new("document_expiry", "every day at nine");
        assert!(matches!(
            job.schedule(),
            Err(ScheduleError::InvalidCron { .. })
        ));
    }
}
