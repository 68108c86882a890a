// src/scheduler/cron.rs
//! Daily recurrence in five-field cron form, restricted to
//! `minute hour * * *`. Minute and hour accept `*`, a number or a comma list.
//! Everything is evaluated in UTC.

use std::fmt;

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Timelike, Utc};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSpec {
    raw: String,
    minutes: Vec<u32>,
    hours: Vec<u32>,
}

fn parse_field(field: &str, max: u32, what: &str, raw: &str) -> Result<Vec<u32>> {
    if field == "*" {
        return Ok((0..=max).collect());
    }
    let mut out = Vec::new();
    for part in field.split(',') {
        let v: u32 = part.trim().parse().map_err(|_| {
            PipelineError::Configuration(format!("cron '{raw}': invalid {what} '{part}'"))
        })?;
        if v > max {
            return Err(PipelineError::Configuration(format!(
                "cron '{raw}': {what} {v} out of range 0-{max}"
            )));
        }
        out.push(v);
    }
    out.sort_unstable();
    out.dedup();
    Ok(out)
}

impl CronSpec {
    pub fn parse(raw: &str) -> Result<Self> {
        let fields: Vec<&str> = raw.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(PipelineError::Configuration(format!(
                "cron '{raw}': expected 5 fields, got {}",
                fields.len()
            )));
        }
        if fields[2..].iter().any(|f| *f != "*") {
            return Err(PipelineError::Configuration(format!(
                "cron '{raw}': only daily schedules (minute hour * * *) are supported"
            )));
        }
        let minutes = parse_field(fields[0], 59, "minute", raw)?;
        let hours = parse_field(fields[1], 23, "hour", raw)?;
        Ok(Self {
            raw: fields.join(" "),
            minutes,
            hours,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// First occurrence `>= t`. Sub-minute precision rounds up to the next minute.
    pub fn next_at_or_after(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        let floored = t
            .with_second(0)
            .and_then(|x| x.with_nanosecond(0))
            .unwrap_or(t);
        let start = if floored < t {
            floored + Duration::minutes(1)
        } else {
            floored
        };

        // Every day matches, so the answer is today or tomorrow.
        for day in 0..=1 {
            let date = start.date_naive() + Duration::days(day);
            for &h in &self.hours {
                for &m in &self.minutes {
                    let Some(time) = NaiveTime::from_hms_opt(h, m, 0) else {
                        continue;
                    };
                    let candidate = Utc.from_utc_datetime(&date.and_time(time));
                    if candidate >= start {
                        return candidate;
                    }
                }
            }
        }
        // Unreachable with non-empty fields; keep the loop moving regardless.
        start + Duration::days(1)
    }

    /// First occurrence strictly after `t`.
    pub fn next_after(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        let floored = t
            .with_second(0)
            .and_then(|x| x.with_nanosecond(0))
            .unwrap_or(t);
        self.next_at_or_after(floored + Duration::minutes(1))
    }
}

impl fmt::Display for CronSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, h, m, s).unwrap()
    }

    #[test]
    fn twice_daily_schedule() {
        let c = CronSpec::parse("0 8,20 * * *").unwrap();
        assert_eq!(c.next_at_or_after(at(8, 0, 0)), at(8, 0, 0));
        assert_eq!(c.next_at_or_after(at(8, 0, 1)), at(20, 0, 0));
        assert_eq!(c.next_after(at(8, 0, 0)), at(20, 0, 0));
        assert_eq!(c.next_at_or_after(at(7, 59, 59)), at(8, 0, 0));
        assert_eq!(
            c.next_after(at(20, 0, 0)),
            Utc.with_ymd_and_hms(2025, 3, 2, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn wildcard_minutes() {
        let c = CronSpec::parse("* 9 * * *").unwrap();
        assert_eq!(c.next_after(at(9, 10, 30)), at(9, 11, 0));
        assert_eq!(
            c.next_after(at(9, 59, 0)),
            Utc.with_ymd_and_hms(2025, 3, 2, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn rejects_unsupported_or_malformed() {
        for bad in ["0 8 * *", "0 25 * * *", "x 8 * * *", "0 8 1 * *", "0 8 * * 1-5"] {
            let err = CronSpec::parse(bad).unwrap_err();
            assert_eq!(err.kind(), "configuration", "{bad}");
        }
    }
}
