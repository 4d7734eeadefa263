//! Report clock and date windows.
//!
//! A run takes one snapshot of "now" in a fixed UTC offset and derives every
//! window from it; jobs receive the windows, never the wall clock.

use anyhow::{Context, Result};
use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, Timelike, Utc,
};
use std::fmt;

/// Inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub from: NaiveDate,
    pub till: NaiveDate,
}

impl DateWindow {
    pub fn new(from: NaiveDate, till: NaiveDate) -> Result<Self> {
        if till < from {
            anyhow::bail!("Window end {} is before start {}", till, from);
        }
        Ok(Self { from, till })
    }

    pub fn single(day: NaiveDate) -> Self {
        Self { from: day, till: day }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.from <= day && day <= self.till
    }

    pub fn days(&self) -> Vec<NaiveDate> {
        self.from.iter_days().take_while(|d| *d <= self.till).collect()
    }

    pub fn len(&self) -> usize {
        ((self.till - self.from).num_days() + 1) as usize
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.from, self.till)
    }
}

/// What to report on (`target`) and which check-in dates to page through to find it (`lookback`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub target: DateWindow,
    pub lookback: DateWindow,
}

/// Fixed snapshot of the current time for one run.
#[derive(Debug, Clone, Copy)]
pub struct ReportClock {
    now: DateTime<FixedOffset>,
    cutover_hour: u32,
}

impl ReportClock {
    pub fn new(now: DateTime<FixedOffset>, cutover_hour: u32) -> Self {
        Self { now, cutover_hour }
    }

    /// Snapshot the wall clock in the given offset.
    pub fn now_in(offset_minutes: i32, cutover_hour: u32) -> Result<Self> {
        let offset = offset(offset_minutes)?;
        Ok(Self::new(Utc::now().with_timezone(&offset), cutover_hour))
    }

    /// Clock pinned to noon of a chosen date, for reruns.
    pub fn pinned(day: NaiveDate, offset_minutes: i32, cutover_hour: u32) -> Result<Self> {
        let offset = offset(offset_minutes)?;
        let noon = day
            .and_hms_opt(12, 0, 0)
            .and_then(|dt| dt.and_local_timezone(offset).single())
            .with_context(|| format!("Cannot pin clock to {}", day))?;
        Ok(Self::new(noon, cutover_hour))
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        self.now
    }

    pub fn offset(&self) -> FixedOffset {
        *self.now.offset()
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    pub fn yesterday(&self) -> NaiveDate {
        self.today() - Duration::days(1)
    }

    /// Before the cutover hour the business day is still yesterday.
    pub fn business_date(&self) -> NaiveDate {
        if self.now.hour() < self.cutover_hour {
            self.yesterday()
        } else {
            self.today()
        }
    }

    /// Yesterday only, looking back `lookback_days` of check-ins.
    pub fn yesterday_window(&self, lookback_days: i64) -> ReportWindow {
        let day = self.yesterday();
        ReportWindow {
            target: DateWindow::single(day),
            lookback: DateWindow { from: day - Duration::days(lookback_days), till: day },
        }
    }

    /// Today only; the lookback reaches today so same-day check-ins are included.
    pub fn today_window(&self, lookback_days: i64) -> ReportWindow {
        let day = self.today();
        ReportWindow {
            target: DateWindow::single(day),
            lookback: DateWindow { from: day - Duration::days(lookback_days), till: day },
        }
    }

    /// The business date only; the lookback reaches the calendar date.
    pub fn business_window(&self, lookback_days: i64) -> ReportWindow {
        let day = self.business_date();
        ReportWindow {
            target: DateWindow::single(day),
            lookback: DateWindow {
                from: day - Duration::days(lookback_days),
                till: self.today().max(day),
            },
        }
    }

    /// First of yesterday's month through yesterday.
    pub fn month_to_date(&self, lookback_days: i64) -> ReportWindow {
        let till = self.yesterday();
        let from = first_of_month(till);
        ReportWindow {
            target: DateWindow { from, till },
            lookback: DateWindow { from: till - Duration::days(lookback_days), till },
        }
    }

    /// The full calendar month before the business date's month.
    pub fn last_month(&self, lookback_days: i64) -> ReportWindow {
        let business = self.business_date();
        let till = first_of_month(business) - Duration::days(1);
        let from = first_of_month(till);
        ReportWindow {
            target: DateWindow { from, till },
            lookback: DateWindow { from: business - Duration::days(lookback_days), till: business },
        }
    }

    /// Explicit target range; the lookback starts `lookback_days` before it.
    pub fn explicit(&self, target: DateWindow, lookback_days: i64) -> ReportWindow {
        ReportWindow {
            target,
            lookback: DateWindow {
                from: target.from - Duration::days(lookback_days),
                till: target.till,
            },
        }
    }

    /// Parse a vendor timestamp into local time.
    ///
    /// RFC 3339 strings keep their offset; naive timestamps (with or without a
    /// trailing `Z`) are read as UTC.
    pub fn localize(&self, raw: &str) -> Option<DateTime<FixedOffset>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&self.offset()));
        }
        let naive = raw.trim_end_matches('Z');
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
            .map(|dt| dt.and_utc().with_timezone(&self.offset()))
    }
}

fn offset(minutes: i32) -> Result<FixedOffset> {
    FixedOffset::east_opt(minutes * 60)
        .with_context(|| format!("Invalid UTC offset: {} minutes", minutes))
}

pub fn first_of_month(day: NaiveDate) -> NaiveDate {
    day - Duration::days(day.day0() as i64)
}

/// "May 2024"
pub fn month_label(day: NaiveDate) -> String {
    day.format("%B %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const IST: i32 = 330;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn clock_at(rfc3339: &str) -> ReportClock {
        ReportClock::new(DateTime::parse_from_rfc3339(rfc3339).unwrap(), 12)
    }

    #[test]
    fn test_business_date_cutover() {
        assert_eq!(clock_at("2024-05-10T11:59:00+05:30").business_date(), d(2024, 5, 9));
        assert_eq!(clock_at("2024-05-10T12:00:00+05:30").business_date(), d(2024, 5, 10));
    }

    #[test]
    fn test_yesterday_window() {
        let w = clock_at("2024-05-10T06:00:00+05:30").yesterday_window(120);
        assert_eq!(w.target, DateWindow::single(d(2024, 5, 9)));
        assert_eq!(w.lookback.from, d(2024, 1, 10));
        assert_eq!(w.lookback.till, d(2024, 5, 9));
    }

    #[test]
    fn test_month_to_date_on_the_first() {
        let w = clock_at("2024-06-01T06:00:00+05:30").month_to_date(120);
        assert_eq!(w.target.from, d(2024, 5, 1));
        assert_eq!(w.target.till, d(2024, 5, 31));
        assert_eq!(w.target.len(), 31);
    }

    #[test]
    fn test_last_month_uses_business_date() {
        // 1 March before noon is still 29 Feb, so "last month" is January
        let w = clock_at("2024-03-01T09:00:00+05:30").last_month(120);
        assert_eq!(w.target.from, d(2024, 1, 1));
        assert_eq!(w.target.till, d(2024, 1, 31));

        let w = clock_at("2024-03-01T13:00:00+05:30").last_month(120);
        assert_eq!(w.target.from, d(2024, 2, 1));
        assert_eq!(w.target.till, d(2024, 2, 29));
    }

    #[test]
    fn test_window_days_and_contains() {
        let w = DateWindow::new(d(2024, 5, 30), d(2024, 6, 2)).unwrap();
        assert_eq!(w.days().len(), 4);
        assert!(w.contains(d(2024, 6, 1)));
        assert!(!w.contains(d(2024, 6, 3)));
        assert!(DateWindow::new(d(2024, 6, 2), d(2024, 5, 30)).is_err());
    }

    #[test]
    fn test_localize_converts_to_offset() {
        let clock = ReportClock::pinned(d(2024, 5, 1), IST, 12).unwrap();

        let t = clock.localize("2024-05-01T20:00:00Z").unwrap();
        assert_eq!(t.date_naive(), d(2024, 5, 2));
        assert_eq!(t.hour(), 1);
        assert_eq!(t.minute(), 30);

        let t = clock.localize("2024-05-01T10:15:00.123").unwrap();
        assert_eq!(t.hour(), 15);
        assert_eq!(t.minute(), 45);

        let t = clock.localize("2024-05-01T10:15:00+05:30").unwrap();
        assert_eq!(t.hour(), 10);

        assert!(clock.localize("").is_none());
        assert!(clock.localize("yesterday").is_none());
    }
}
