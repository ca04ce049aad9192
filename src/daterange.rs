//! Date range resolution for report periods.
//!
//! Ranges are inclusive `(start, end)` pairs formatted `YYYY/MM/DD` to match
//! the partition key layout of the access log table. Frequency-based ranges
//! always resolve to the *previous* complete period, never the current
//! partial one.

use anyhow::Context;
use chrono::{Datelike, Duration, Local, NaiveDate};
use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
}

/// An inclusive report period with both endpoints in partition-key form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Parse an explicit `YYYY-MM-DD` pair. The caller is responsible for
    /// supplying `start <= end`; no reordering is performed here.
    pub fn from_explicit(start: &str, end: &str) -> anyhow::Result<Self> {
        let start = NaiveDate::parse_from_str(start, "%Y-%m-%d")
            .with_context(|| format!("invalid start date '{start}', expected YYYY-MM-DD"))?;
        let end = NaiveDate::parse_from_str(end, "%Y-%m-%d")
            .with_context(|| format!("invalid end date '{end}', expected YYYY-MM-DD"))?;
        Ok(Self { start, end })
    }

    /// Resolve a frequency against the current local date.
    pub fn from_frequency(frequency: Frequency) -> Self {
        Self::from_frequency_at(frequency, Local::now().date_naive())
    }

    /// Resolve a frequency against an arbitrary "today". Split out so the
    /// period arithmetic is testable without faking the clock.
    pub fn from_frequency_at(frequency: Frequency, today: NaiveDate) -> Self {
        match frequency {
            Frequency::Daily => {
                let yesterday = today - Duration::days(1);
                Self {
                    start: yesterday,
                    end: yesterday,
                }
            }
            Frequency::Weekly => {
                // Monday of the current week, then step back one full week.
                let week_start =
                    today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
                Self {
                    start: week_start - Duration::days(7),
                    end: week_start - Duration::days(1),
                }
            }
            Frequency::Monthly => {
                let first_of_this_month = first_of_month(today.year(), today.month());
                let last_of_previous = first_of_this_month - Duration::days(1);
                Self {
                    start: first_of_month(last_of_previous.year(), last_of_previous.month()),
                    end: last_of_previous,
                }
            }
            Frequency::Quarterly => {
                // Quarters are fixed 3-month blocks starting January.
                let quarter = (today.month() - 1) / 3 + 1;
                let first_month_of_quarter = (quarter - 1) * 3 + 1;
                let first_of_this_quarter = first_of_month(today.year(), first_month_of_quarter);
                let last_of_previous = first_of_this_quarter - Duration::days(1);
                let prev_quarter_start_month = (last_of_previous.month() - 1) / 3 * 3 + 1;
                Self {
                    start: first_of_month(last_of_previous.year(), prev_quarter_start_month),
                    end: last_of_previous,
                }
            }
        }
    }

    /// Start of the period in `YYYY/MM/DD` form.
    pub fn start(&self) -> String {
        self.start.format("%Y/%m/%d").to_string()
    }

    /// End of the period in `YYYY/MM/DD` form.
    pub fn end(&self) -> String {
        self.end.format("%Y/%m/%d").to_string()
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end
    }

    /// Artifact file stem: `YYYY_MM_DD-YYYY_MM_DD`.
    pub fn file_stem(&self) -> String {
        format!(
            "{}-{}",
            self.start.format("%Y_%m_%d"),
            self.end.format("%Y_%m_%d")
        )
    }

    /// File stems of the `n` calendar months preceding this range's start,
    /// most recent first. Used to locate historical metric snapshots for
    /// trend charts.
    pub fn previous_month_stems(&self, n: usize) -> Vec<String> {
        let mut stems = Vec::with_capacity(n);
        let mut cursor = self.start;
        for _ in 0..n {
            let month_end = first_of_month(cursor.year(), cursor.month()) - Duration::days(1);
            let month_start = first_of_month(month_end.year(), month_end.month());
            stems.push(format!(
                "{}-{}",
                month_start.format("%Y_%m_%d"),
                month_end.format("%Y_%m_%d")
            ));
            cursor = month_start;
        }
        stems
    }
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    // Day 1 exists for every month, so this cannot fail.
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_default()
}
