//! Recurrence period keys
//!
//! A period key names the bucket a requirement or an uploaded document belongs to:
//! a month, a quarter, a year, or a single date for one-time obligations. Keys are
//! compared as plain strings, so both the upload side and the completion check must
//! derive them through [`compute_period_key`] with the same [`YearConvention`].
//!
//! | Recurrence | Format        | Example      |
//! |------------|---------------|--------------|
//! | monthly    | `YYYY-MM`     | `2025-04`    |
//! | quarterly  | `Q{n}-YYYY`   | `Q1-2025`    |
//! | annual     | `FY-{start}`  | `FY-2025`    |
//! | one-time   | `YYYY-MM-DD`  | `2025-04-15` |

use super::error::ComplianceError;
use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecurrenceKind {
    #[n(0)]
    OneTime,
    #[n(1)]
    Monthly,
    #[n(2)]
    Quarterly,
    #[n(3)]
    Annual,
}

/// Which month opens a company's year.
#[derive(
    minicbor::Encode,
    minicbor::Decode,
    serde::Deserialize,
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
)]
pub enum YearConvention {
    /// April to March.
    #[default]
    #[n(0)]
    #[serde(rename = "FY", alias = "fy")]
    Financial,
    /// January to December.
    #[n(1)]
    #[serde(rename = "CY", alias = "cy")]
    Calendar,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeriodKey(String);

impl RecurrenceKind {
    pub const ALL: [RecurrenceKind; 4] = [
        RecurrenceKind::OneTime,
        RecurrenceKind::Monthly,
        RecurrenceKind::Quarterly,
        RecurrenceKind::Annual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrenceKind::OneTime => "one-time",
            RecurrenceKind::Monthly => "monthly",
            RecurrenceKind::Quarterly => "quarterly",
            RecurrenceKind::Annual => "annual",
        }
    }
}

impl YearConvention {
    pub fn as_str(&self) -> &'static str {
        match self {
            YearConvention::Financial => "FY",
            YearConvention::Calendar => "CY",
        }
    }

    /// Quarter number (1-4) a 1-indexed month falls into.
    pub fn quarter_of(&self, month: u32) -> u32 {
        match self {
            YearConvention::Financial => match month {
                4..=6 => 1,
                7..=9 => 2,
                10..=12 => 3,
                _ => 4,
            },
            YearConvention::Calendar => (month.clamp(1, 12) - 1) / 3 + 1,
        }
    }

    /// Calendar year in which the year containing `date` starts.
    pub fn start_year_of(&self, date: NaiveDate) -> i32 {
        match self {
            YearConvention::Financial if date.month() < 4 => date.year() - 1,
            _ => date.year(),
        }
    }
}

impl PeriodKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Derive the canonical period key for `date`.
///
/// Quarter labels carry the calendar year of the date itself, so under the
/// financial convention January 2025 is `Q4-2025` while April 2024 of the same
/// fiscal year is `Q1-2024`. Stored document keys depend on that labelling.
///
/// Annual keys are prefixed `FY-` under both conventions.
pub fn compute_period_key(
    kind: RecurrenceKind,
    date: NaiveDate,
    convention: YearConvention,
) -> PeriodKey {
    let key = match kind {
        RecurrenceKind::Monthly => format!("{:04}-{:02}", date.year(), date.month()),
        RecurrenceKind::Quarterly => {
            format!("Q{}-{:04}", convention.quarter_of(date.month()), date.year())
        }
        RecurrenceKind::Annual => format!("FY-{:04}", convention.start_year_of(date)),
        RecurrenceKind::OneTime => date.format("%Y-%m-%d").to_string(),
    };

    PeriodKey(key)
}

/// The requirement's own convention wins, then the company's, then `fallback`.
pub fn resolve_year_convention(
    requirement: Option<YearConvention>,
    company: Option<YearConvention>,
    fallback: YearConvention,
) -> YearConvention {
    requirement.or(company).unwrap_or(fallback)
}

impl fmt::Display for RecurrenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for YearConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for PeriodKey {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for PeriodKey {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl FromStr for RecurrenceKind {
    type Err = ComplianceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "one-time" | "one_time" | "onetime" => Ok(RecurrenceKind::OneTime),
            "monthly" => Ok(RecurrenceKind::Monthly),
            "quarterly" => Ok(RecurrenceKind::Quarterly),
            "annual" | "annually" | "yearly" => Ok(RecurrenceKind::Annual),
            _ => Err(ComplianceError::UnknownRecurrence(s.to_string())),
        }
    }
}

impl FromStr for YearConvention {
    type Err = ComplianceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "FY" => Ok(YearConvention::Financial),
            "CY" => Ok(YearConvention::Calendar),
            _ => Err(ComplianceError::UnknownYearConvention(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn monthly_ignores_convention() {
        for convention in [YearConvention::Financial, YearConvention::Calendar] {
            let key = compute_period_key(RecurrenceKind::Monthly, date(2025, 4, 15), convention);
            assert_eq!(key, "2025-04");
        }
    }

    #[test]
    fn financial_quarter_boundaries() {
        let fy = YearConvention::Financial;
        assert_eq!(
            compute_period_key(RecurrenceKind::Quarterly, date(2025, 3, 31), fy),
            "Q4-2025"
        );
        assert_eq!(
            compute_period_key(RecurrenceKind::Quarterly, date(2025, 4, 1), fy),
            "Q1-2025"
        );
        assert_eq!(
            compute_period_key(RecurrenceKind::Quarterly, date(2024, 9, 30), fy),
            "Q2-2024"
        );
        assert_eq!(
            compute_period_key(RecurrenceKind::Quarterly, date(2024, 10, 1), fy),
            "Q3-2024"
        );
    }

    #[test]
    fn calendar_quarter_boundaries() {
        let cy = YearConvention::Calendar;
        assert_eq!(
            compute_period_key(RecurrenceKind::Quarterly, date(2025, 1, 1), cy),
            "Q1-2025"
        );
        assert_eq!(
            compute_period_key(RecurrenceKind::Quarterly, date(2025, 12, 31), cy),
            "Q4-2025"
        );
        assert_eq!(
            compute_period_key(RecurrenceKind::Quarterly, date(2025, 4, 1), cy),
            "Q2-2025"
        );
    }

    #[test]
    fn annual_financial_year_crossing() {
        let fy = YearConvention::Financial;
        assert_eq!(
            compute_period_key(RecurrenceKind::Annual, date(2025, 2, 1), fy),
            "FY-2024"
        );
        assert_eq!(
            compute_period_key(RecurrenceKind::Annual, date(2025, 4, 1), fy),
            "FY-2025"
        );
    }

    #[test]
    fn annual_calendar_keeps_fy_prefix() {
        let key = compute_period_key(
            RecurrenceKind::Annual,
            date(2025, 2, 1),
            YearConvention::Calendar,
        );
        assert_eq!(key, "FY-2025");
    }

    #[test]
    fn one_time_is_the_date_itself() {
        let key = compute_period_key(
            RecurrenceKind::OneTime,
            date(2025, 4, 5),
            YearConvention::Financial,
        );
        assert_eq!(key.as_str(), "2025-04-05");
    }

    #[test]
    fn financial_q1_and_q4_of_one_fiscal_year_use_their_own_calendar_years() {
        let fy = YearConvention::Financial;
        let q1 = compute_period_key(RecurrenceKind::Quarterly, date(2024, 5, 1), fy);
        let q4 = compute_period_key(RecurrenceKind::Quarterly, date(2025, 2, 1), fy);
        assert_eq!(q1, "Q1-2024");
        assert_eq!(q4, "Q4-2025");
    }

    #[test]
    fn convention_resolution_order() {
        let fy = YearConvention::Financial;
        let cy = YearConvention::Calendar;
        assert_eq!(resolve_year_convention(Some(cy), Some(fy), fy), cy);
        assert_eq!(resolve_year_convention(None, Some(cy), fy), cy);
        assert_eq!(resolve_year_convention(None, None, fy), fy);
    }

    #[test]
    fn parses_labels() {
        assert_eq!("Quarterly".parse::<RecurrenceKind>().unwrap(), RecurrenceKind::Quarterly);
        assert_eq!("one_time".parse::<RecurrenceKind>().unwrap(), RecurrenceKind::OneTime);
        assert_eq!("cy".parse::<YearConvention>().unwrap(), YearConvention::Calendar);
        assert!("weekly".parse::<RecurrenceKind>().is_err());
        assert!("AY".parse::<YearConvention>().is_err());
    }
}
