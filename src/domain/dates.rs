use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Local, NaiveDate};
use thiserror::Error;

pub const TODAY_LITERAL: &str = "today";
pub const MAX_SLEEP_RANGE_DAYS: i64 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DateError {
    #[error("invalid date `{0}`: expected YYYY-MM-DD or \"today\"")]
    InvalidDate(String),
    #[error("end date {end} is before start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
    #[error("date range {start}..{end} spans {days} days; at most {max} are allowed")]
    RangeTooLong {
        start: NaiveDate,
        end: NaiveDate,
        days: i64,
        max: i64,
    },
    #[error("invalid detail level `{0}`: expected one of 1sec, 1min, 5min, 15min")]
    InvalidDetailLevel(String),
    #[error("invalid month {year}-{month}")]
    InvalidMonth { year: i32, month: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ApiDate(NaiveDate);

impl ApiDate {
    pub fn parse(input: &str) -> Result<Self, DateError> {
        Self::parse_with_today(input, Local::now().date_naive())
    }

    pub fn parse_with_today(input: &str, today: NaiveDate) -> Result<Self, DateError> {
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case(TODAY_LITERAL) {
            return Ok(Self(today));
        }

        // chrono accepts single-digit fields for %m/%d, the API does not
        if trimmed.len() != 10 {
            return Err(DateError::InvalidDate(input.to_string()));
        }

        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .map(Self)
            .map_err(|_| DateError::InvalidDate(input.to_string()))
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for ApiDate {
    fn from(value: NaiveDate) -> Self {
        Self(value)
    }
}

impl fmt::Display for ApiDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: ApiDate,
    pub end: ApiDate,
}

impl DateRange {
    pub fn new(start: ApiDate, end: ApiDate) -> Result<Self, DateError> {
        if end < start {
            return Err(DateError::EndBeforeStart {
                start: start.date(),
                end: end.date(),
            });
        }

        Ok(Self { start, end })
    }

    pub fn with_max_days(self, max: i64) -> Result<Self, DateError> {
        let days = self.days();
        if days > max {
            return Err(DateError::RangeTooLong {
                start: self.start.date(),
                end: self.end.date(),
                days,
                max,
            });
        }

        Ok(self)
    }

    pub fn days(&self) -> i64 {
        (self.end.date() - self.start.date()).num_days() + 1
    }

    pub fn iter_days(&self) -> impl Iterator<Item = ApiDate> + use<> {
        let end = self.end.date();
        self.start
            .date()
            .iter_days()
            .take_while(move |day| *day <= end)
            .map(ApiDate)
    }

    pub fn month(year: i32, month: u32) -> Result<Self, DateError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or(DateError::InvalidMonth { year, month })?;
        let next_first = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or(DateError::InvalidMonth { year, month })?;
        let last = next_first
            .pred_opt()
            .filter(|last| last.month() == month)
            .ok_or(DateError::InvalidMonth { year, month })?;

        Ok(Self {
            start: ApiDate(first),
            end: ApiDate(last),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetailLevel {
    OneSecond,
    #[default]
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
}

impl DetailLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneSecond => "1sec",
            Self::OneMinute => "1min",
            Self::FiveMinutes => "5min",
            Self::FifteenMinutes => "15min",
        }
    }
}

impl FromStr for DetailLevel {
    type Err = DateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "1sec" => Ok(Self::OneSecond),
            "1min" => Ok(Self::OneMinute),
            "5min" => Ok(Self::FiveMinutes),
            "15min" => Ok(Self::FifteenMinutes),
            other => Err(DateError::InvalidDetailLevel(other.to_string())),
        }
    }
}

impl fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{ApiDate, DateError, DateRange, DetailLevel, MAX_SLEEP_RANGE_DAYS};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
    }

    #[test]
    fn resolves_today_literal_to_given_local_date() {
        let today = date(2025, 10, 19);
        let parsed = ApiDate::parse_with_today("today", today).expect("today should parse");
        assert_eq!(parsed.date(), today);
        assert_eq!(
            ApiDate::parse_with_today("TODAY", today).expect("case-insensitive"),
            parsed
        );
    }

    #[test]
    fn resolves_today_against_system_clock() {
        let parsed = ApiDate::parse("today").expect("today should parse");
        assert_eq!(parsed.date(), chrono::Local::now().date_naive());
    }

    #[test]
    fn parses_iso_date_exactly() {
        let parsed = ApiDate::parse("2025-10-01").expect("iso date should parse");
        assert_eq!(parsed.date(), date(2025, 10, 1));
        assert_eq!(parsed.to_string(), "2025-10-01");
    }

    #[test]
    fn rejects_month_thirteen() {
        let result = ApiDate::parse("2025-13-01");
        assert_eq!(
            result,
            Err(DateError::InvalidDate("2025-13-01".to_string()))
        );
    }

    #[test]
    fn rejects_non_padded_and_garbage_dates() {
        assert!(ApiDate::parse("2025-1-01").is_err());
        assert!(ApiDate::parse("2025-02-30").is_err());
        assert!(ApiDate::parse("yesterday").is_err());
        assert!(ApiDate::parse("").is_err());
    }

    #[test]
    fn range_rejects_end_before_start() {
        let start = ApiDate::from(date(2025, 10, 2));
        let end = ApiDate::from(date(2025, 10, 1));
        assert!(matches!(
            DateRange::new(start, end),
            Err(DateError::EndBeforeStart { .. })
        ));
    }

    #[test]
    fn range_enforces_maximum_span() {
        let start = ApiDate::from(date(2025, 1, 1));
        let end = ApiDate::from(date(2025, 6, 1));
        let range = DateRange::new(start, end).expect("ordered range");
        assert!(matches!(
            range.with_max_days(MAX_SLEEP_RANGE_DAYS),
            Err(DateError::RangeTooLong { max: 100, .. })
        ));
    }

    #[test]
    fn month_range_covers_every_day() {
        let february = DateRange::month(2024, 2).expect("valid month");
        assert_eq!(february.days(), 29);
        let days: Vec<String> = february.iter_days().map(|d| d.to_string()).collect();
        assert_eq!(days.first().map(String::as_str), Some("2024-02-01"));
        assert_eq!(days.last().map(String::as_str), Some("2024-02-29"));

        let december = DateRange::month(2025, 12).expect("valid month");
        assert_eq!(december.end.to_string(), "2025-12-31");

        assert!(DateRange::month(2025, 13).is_err());
    }

    #[test]
    fn parses_detail_levels() {
        assert_eq!("1sec".parse::<DetailLevel>(), Ok(DetailLevel::OneSecond));
        assert_eq!("15min".parse::<DetailLevel>(), Ok(DetailLevel::FifteenMinutes));
        assert_eq!(DetailLevel::default().as_str(), "1min");
        assert!("2min".parse::<DetailLevel>().is_err());
    }
}
