//! Compliance requirements and their lifecycle status
use super::error::ComplianceError;
use super::gate::normalize_document_label;
use super::period::{RecurrenceKind, YearConvention};
use super::utils;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequirementStatus {
    #[n(0)]
    NotStarted,
    #[n(1)]
    Upcoming,
    #[n(2)]
    Pending,
    #[n(3)]
    Overdue,
    #[n(4)]
    Completed,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct Penalty {
    #[n(0)]
    pub description: String,
    #[n(1)]
    pub late_fee_per_day: Option<u64>, // minor currency units
    #[n(2)]
    pub max_amount: Option<u64>,
}

/// One obligation instance owned by a company.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct ComplianceRequirement {
    #[n(0)]
    pub id: String, // bech32 "req_"
    #[n(1)]
    pub company_id: String,
    #[n(2)]
    pub template_id: Option<String>,
    #[n(3)]
    pub category: String,
    #[n(4)]
    pub requirement_name: String,
    #[n(5)]
    pub description: Option<String>,
    #[n(6)]
    pub recurrence: RecurrenceKind,
    #[n(7)]
    pub year_convention: Option<YearConvention>, // falls back to the company's
    #[n(8)]
    pub due_date: CalendarDate,
    #[n(9)]
    pub status: RequirementStatus,
    #[n(10)]
    pub status_reason: Option<String>,
    #[n(11)]
    pub required_documents: Vec<String>,
    #[n(12)]
    pub is_critical: bool,
    #[n(13)]
    pub penalty: Option<Penalty>,
    #[n(14)]
    pub filed_on: Option<TimeStamp<Utc>>,
    #[n(15)]
    pub filed_by: Option<String>,
}

/// Used for constructing requirements before they are given an id.
#[derive(Debug, Default, Clone)]
pub struct RequirementDraft {
    company_id: Option<String>,
    template_id: Option<String>,
    category: String,
    requirement_name: Option<String>,
    description: Option<String>,
    recurrence: Option<RecurrenceKind>,
    year_convention: Option<YearConvention>,
    due_date: Option<NaiveDate>,
    required_documents: Vec<String>,
    is_critical: bool,
    penalty: Option<Penalty>,
}

/// Fields written by a status update. Applied to a single row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub status: RequirementStatus,
    pub status_reason: Option<String>,
    pub filed_on: Option<TimeStamp<Utc>>,
    pub filed_by: Option<String>,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

/// A plain calendar date, no timezone attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDate(NaiveDate);

impl RequirementStatus {
    pub const ALL: [RequirementStatus; 5] = [
        RequirementStatus::NotStarted,
        RequirementStatus::Upcoming,
        RequirementStatus::Pending,
        RequirementStatus::Overdue,
        RequirementStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementStatus::NotStarted => "not_started",
            RequirementStatus::Upcoming => "upcoming",
            RequirementStatus::Pending => "pending",
            RequirementStatus::Overdue => "overdue",
            RequirementStatus::Completed => "completed",
        }
    }
}

impl ComplianceRequirement {
    pub fn due_date(&self) -> NaiveDate {
        self.due_date.to_naive_date()
    }

    pub fn is_completed(&self) -> bool {
        self.status == RequirementStatus::Completed
    }
}

impl RequirementDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_company(mut self, company_id: &str) -> Self {
        self.company_id = Some(company_id.to_string());
        self
    }
    pub fn set_template(mut self, template_id: &str) -> Self {
        self.template_id = Some(template_id.to_string());
        self
    }
    pub fn set_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }
    pub fn set_name(mut self, name: &str) -> Self {
        self.requirement_name = Some(name.to_string());
        self
    }
    pub fn set_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
    pub fn set_recurrence(mut self, kind: RecurrenceKind) -> Self {
        self.recurrence = Some(kind);
        self
    }
    pub fn set_year_convention(mut self, convention: YearConvention) -> Self {
        self.year_convention = Some(convention);
        self
    }
    pub fn set_due_date(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }
    pub fn require_document(mut self, document_type: &str) -> Self {
        self.required_documents.push(document_type.to_string());
        self
    }
    pub fn set_required_documents<I, D>(mut self, documents: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<String>,
    {
        self.required_documents = documents.into_iter().map(Into::into).collect();
        self
    }
    pub fn set_critical(mut self, critical: bool) -> Self {
        self.is_critical = critical;
        self
    }
    pub fn set_penalty(mut self, penalty: Penalty) -> Self {
        self.penalty = Some(penalty);
        self
    }

    /// Checks the draft and mints an id. New requirements always start `not_started`.
    pub fn finalise(self) -> Result<ComplianceRequirement, ComplianceError> {
        let company_id = match self.company_id {
            Some(id) if !id.trim().is_empty() => id,
            _ => return Err(ComplianceError::InvalidRequirement("company is not set".into())),
        };
        let requirement_name = match self.requirement_name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => return Err(ComplianceError::InvalidRequirement("name is blank".into())),
        };
        let Some(due_date) = self.due_date else {
            return Err(ComplianceError::InvalidRequirement(
                "due date is not set".into(),
            ));
        };
        if let Some(name) = self
            .required_documents
            .iter()
            .find(|d| normalize_document_label(d).is_empty())
        {
            return Err(ComplianceError::InvalidRequirement(format!(
                "required document name {name:?} has no letters or digits"
            )));
        }

        let id = utils::new_bech32_id(utils::REQUIREMENT_HRP).map_err(ComplianceError::Identifier)?;

        Ok(ComplianceRequirement {
            id,
            company_id,
            template_id: self.template_id,
            category: self.category,
            requirement_name,
            description: self.description,
            recurrence: self.recurrence.unwrap_or(RecurrenceKind::OneTime),
            year_convention: self.year_convention,
            due_date: due_date.into(),
            status: RequirementStatus::NotStarted,
            status_reason: None,
            required_documents: self
                .required_documents
                .into_iter()
                .map(|d| d.trim().to_string())
                .collect(),
            is_critical: self.is_critical,
            penalty: self.penalty,
            filed_on: None,
            filed_by: None,
        })
    }
}

impl StatusChange {
    /// Completion stamps the filer and clears any reason.
    pub fn completed(at: TimeStamp<Utc>, by: &str) -> Self {
        Self {
            status: RequirementStatus::Completed,
            status_reason: None,
            filed_on: Some(at),
            filed_by: Some(by.to_string()),
        }
    }

    pub fn to(status: RequirementStatus, reason: Option<String>) -> Self {
        Self {
            status,
            status_reason: reason,
            filed_on: None,
            filed_by: None,
        }
    }

    pub fn apply_to(&self, requirement: &mut ComplianceRequirement) {
        requirement.status = self.status;
        requirement.status_reason = self.status_reason.clone();
        requirement.filed_on = self.filed_on.clone();
        requirement.filed_by = self.filed_by.clone();
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        min: u32,
        sec: u32,
    ) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(Self)
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl CalendarDate {
    pub fn to_naive_date(&self) -> NaiveDate {
        self.0
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl From<NaiveDate> for CalendarDate {
    fn from(value: NaiveDate) -> Self {
        CalendarDate(value)
    }
}

impl fmt::Display for RequirementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequirementStatus {
    type Err = ComplianceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "not_started" => Ok(RequirementStatus::NotStarted),
            "upcoming" => Ok(RequirementStatus::Upcoming),
            "pending" => Ok(RequirementStatus::Pending),
            "overdue" => Ok(RequirementStatus::Overdue),
            "completed" => Ok(RequirementStatus::Completed),
            other => Err(ComplianceError::UnknownStatus(other.to_string())),
        }
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

// dates travel as days since 0001-01-01
impl<C> minicbor::Encode<C> for CalendarDate {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        use chrono::Datelike;

        e.i32(self.0.num_days_from_ce())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for CalendarDate {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let days = d.i32()?;

        NaiveDate::from_num_days_from_ce_opt(days)
            .map(CalendarDate)
            .ok_or(minicbor::decode::Error::message(
                "failed to convert day count to a calendar date",
            ))
    }
}
