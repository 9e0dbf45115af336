/// Calendar helpers for recurring, year-less dates.
use std::fmt;

use chrono::{Datelike, Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// A month/day pair with no year. Always valid for some year, so Feb 29 is
/// accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "MonthDayRepr", into = "MonthDayRepr")]
pub struct MonthDay {
    month: u32,
    day: u32,
}

#[derive(Serialize, Deserialize)]
struct MonthDayRepr {
    month: u32,
    day: u32,
}

impl MonthDay {
    pub fn new(month: u32, day: u32) -> anyhow::Result<Self> {
        let max_day = match month {
            1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
            4 | 6 | 9 | 11 => 30,
            2 => 29,
            _ => return Err(anyhow::anyhow!("invalid month {month}")),
        };
        if day == 0 || day > max_day {
            return Err(anyhow::anyhow!("invalid day {day} for month {month}"));
        }
        Ok(Self { month, day })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            day: date.day(),
        }
    }

    /// Parses an ISO `YYYY-MM-DD` date and drops the year.
    pub fn parse_iso(value: &str) -> anyhow::Result<Self> {
        let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .map_err(|e| anyhow::anyhow!("invalid date '{}': {}", value, e))?;
        Ok(Self::from_date(date))
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn day(self) -> u32 {
        self.day
    }

    pub fn matches(self, date: NaiveDate) -> bool {
        self.month == date.month() && self.day == date.day()
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

impl TryFrom<MonthDayRepr> for MonthDay {
    type Error = String;

    fn try_from(repr: MonthDayRepr) -> Result<Self, Self::Error> {
        MonthDay::new(repr.month, repr.day).map_err(|e| e.to_string())
    }
}

impl From<MonthDay> for MonthDayRepr {
    fn from(value: MonthDay) -> Self {
        Self {
            month: value.month,
            day: value.day,
        }
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Parses `today`, `tomorrow`, `yesterday` or an ISO date into a reference day.
pub fn parse_as_of(input: &str) -> anyhow::Result<NaiveDate> {
    parse_as_of_from(input, today())
}

pub fn parse_as_of_from(input: &str, base: NaiveDate) -> anyhow::Result<NaiveDate> {
    let input = input.trim().to_lowercase();
    match input.as_str() {
        "" | "today" | "now" => Ok(base),
        "tomorrow" => Ok(base + Duration::days(1)),
        "yesterday" => Ok(base - Duration::days(1)),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d").map_err(|_| {
            anyhow::anyhow!(
                "invalid date '{}'. Use YYYY-MM-DD, today, tomorrow or yesterday",
                other
            )
        }),
    }
}

/// Long form used in console output, e.g. "March 15, 2024".
pub fn display_long(date: NaiveDate) -> String {
    date.format("%B %d, %Y").to_string()
}
